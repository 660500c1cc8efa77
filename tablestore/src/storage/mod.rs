//! Table storage engine.
//!
//! Each table is a single file of 512-byte pages organized as a B+Tree keyed
//! by row id.
//!
//! # File Format
//!
//! - Page 0: the root, a leaf until the first split and an interior page
//!   afterwards
//! - Remaining pages: interior pages (separators and child pointers) and
//!   leaf pages (rows), in allocation order
//!
//! # Usage
//!
//! ```ignore
//! use tablestore::storage::{DataType, TableTree, Value};
//!
//! let columns = [DataType::Int, DataType::Text];
//! let mut table = TableTree::open_or_create(path, &columns)?;
//!
//! let row_id = table.insert(columns.to_vec(), vec![Value::Int(1), Value::Text("hi".into())])?;
//! let record = table.get(row_id)?;
//!
//! let mut cursor = table.cursor()?;
//! while let Some((row_id, record)) = cursor.next_row()? {
//!     println!("{row_id}: {:?}", record.to_strings());
//! }
//! ```

mod cell;
mod data_type;
mod file;
mod page;
mod record;
mod table_config;
mod tree;

pub use cell::{
    CellError, CellKind, DataCell, INTERIOR_CELL_SIZE, LEAF_CELL_HEADER_SIZE, TableInteriorCell,
    TableLeafCell,
};
pub use data_type::{DataType, MAX_TEXT_LENGTH, TEXT_BASE};
pub use file::{FileError, TableFile};
pub use page::{
    CELL_OFFSET_SIZE, ChildSlot, PAGE_HEADER_SIZE, PAGE_SIZE, Page, PageBody, PageError,
    PageHeader, PageKind, PageNumber, PageType, ROOT_PAGE, RowId, TableInteriorPage,
    TableLeafPage,
};
pub use record::{DataRecord, MAX_COLUMNS, RecordError, Value};
pub use table_config::{LayoutError, TableConfig};
pub use tree::{ErrorKind, TableCursor, TableTree, TreeError};
