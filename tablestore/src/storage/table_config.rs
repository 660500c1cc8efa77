//! Per-table page layout constants derived from the column types.
//!
//! Capacities are computed from the worst case, the largest record the
//! schema allows, so a page that is not full always has room for one more
//! cell.

use crate::storage::cell::{INTERIOR_CELL_SIZE, LEAF_CELL_HEADER_SIZE};
use crate::storage::data_type::DataType;
use crate::storage::page::{CELL_OFFSET_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE};
use crate::storage::record::MAX_COLUMNS;

/// Bytes available for cell offsets and cell bodies in every page.
const CELL_SPACE: usize = PAGE_SIZE - PAGE_HEADER_SIZE;

/// Layout of a table's pages.
///
/// # Invariants
/// - `tree_order >= 2` and `leaf_degree >= 2`
/// - `leaf_degree - 1` records of `max_record_size` fit in one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    columns: Vec<DataType>,
    max_record_size: usize,
    record_size_no_text: usize,
    tree_order: usize,
    leaf_degree: usize,
    has_text_columns: bool,
}

impl TableConfig {
    /// Compute the layout for a table with the given column types.
    pub fn new(columns: &[DataType]) -> Result<Self, LayoutError> {
        if columns.is_empty() {
            return Err(LayoutError::EmptySchema);
        }
        if columns.len() > MAX_COLUMNS {
            return Err(LayoutError::TooManyColumns(columns.len()));
        }
        if let Some(column) = columns.iter().position(|c| c.is_null()) {
            return Err(LayoutError::PlaceholderColumn {
                column,
                data_type: columns[column],
            });
        }

        let header_size = 1 + columns.len();
        let record_size_no_text = header_size
            + columns
                .iter()
                .filter(|c| !c.is_text())
                .map(|c| c.fixed_size())
                .sum::<usize>();
        let max_record_size = header_size + columns.iter().map(|c| c.max_size()).sum::<usize>();
        let has_text_columns = columns.iter().any(|c| c.is_text());

        let tree_order = 1 + CELL_SPACE / (CELL_OFFSET_SIZE + INTERIOR_CELL_SIZE);
        let leaf_degree =
            1 + CELL_SPACE / (CELL_OFFSET_SIZE + LEAF_CELL_HEADER_SIZE + max_record_size);

        if tree_order < 2 || leaf_degree < 2 {
            return Err(LayoutError::DegenerateTree {
                tree_order,
                leaf_degree,
            });
        }

        Ok(Self {
            columns: columns.to_vec(),
            max_record_size,
            record_size_no_text,
            tree_order,
            leaf_degree,
            has_text_columns,
        })
    }

    /// The declared column types.
    #[must_use]
    pub fn columns(&self) -> &[DataType] {
        &self.columns
    }

    /// Size of the largest record the schema allows.
    #[must_use]
    pub const fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    /// Size of a record with every text column empty. This is also the
    /// smallest record the schema allows.
    #[must_use]
    pub const fn record_size_no_text(&self) -> usize {
        self.record_size_no_text
    }

    /// Maximum number of children of an interior page.
    #[must_use]
    pub const fn tree_order(&self) -> usize {
        self.tree_order
    }

    #[must_use]
    pub const fn leaf_degree(&self) -> usize {
        self.leaf_degree
    }

    #[must_use]
    pub const fn has_text_columns(&self) -> bool {
        self.has_text_columns
    }

    /// Most cells an interior page holds.
    #[must_use]
    pub const fn max_interior_cells(&self) -> usize {
        self.tree_order - 1
    }

    /// Most records a leaf page holds.
    #[must_use]
    pub const fn max_leaf_cells(&self) -> usize {
        self.leaf_degree - 1
    }

    /// Fewest cells a non-root interior page holds once split.
    #[must_use]
    pub const fn min_interior_cells(&self) -> usize {
        (self.tree_order - 1) / 2
    }

    #[must_use]
    pub const fn min_leaf_cells(&self) -> usize {
        (self.leaf_degree - 1) / 2
    }
}

/// Errors in a table's column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// A table needs at least one column.
    EmptySchema,
    /// More columns than a record can hold.
    TooManyColumns(usize),
    /// Null placeholders describe values, not columns.
    PlaceholderColumn { column: usize, data_type: DataType },
    /// Records too large for a usable tree.
    DegenerateTree {
        tree_order: usize,
        leaf_degree: usize,
    },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySchema => write!(f, "table has no columns"),
            Self::TooManyColumns(n) => write!(f, "{n} columns (max {MAX_COLUMNS})"),
            Self::PlaceholderColumn { column, data_type } => {
                write!(f, "column {column} declared with placeholder type {data_type}")
            }
            Self::DegenerateTree {
                tree_order,
                leaf_degree,
            } => write!(
                f,
                "degenerate tree: order {tree_order}, leaf degree {leaf_degree} (need at least 2)"
            ),
        }
    }
}

impl std::error::Error for LayoutError {}
