//! B+Tree of table rows keyed by row id.
//!
//! Rows live in leaf pages chained left to right; interior pages hold
//! separators. Page 0 is always the root. It starts as an empty leaf and
//! becomes an interior page the first time it splits.
//!
//! Inserts descend once from the root. Any full page on the way down is
//! split before it is entered, so the parent always has room for the new
//! separator and no second pass back up the tree is needed.

use std::path::Path;

use crate::storage::cell::{DataCell, TableInteriorCell, TableLeafCell};
use crate::storage::data_type::DataType;
use crate::storage::file::{FileError, TableFile};
use crate::storage::page::{
    ChildSlot, Page, PageBody, PageError, PageKind, PageNumber, ROOT_PAGE, RowId,
};
use crate::storage::record::{DataRecord, RecordError, Value};
use crate::storage::table_config::{LayoutError, TableConfig};

/// A table stored in one file.
#[derive(Debug)]
pub struct TableTree {
    file: TableFile,
    root: Page,
    config: TableConfig,
    row_id_counter: RowId,
}

impl TableTree {
    /// Create a new table file holding an empty root leaf.
    pub fn create(path: &Path, columns: &[DataType]) -> Result<Self, TreeError> {
        let config = TableConfig::new(columns)?;
        let mut file = TableFile::create(path, 1)?;

        let root = Page::new_leaf(ROOT_PAGE);
        let bytes = root.encode()?;
        file.write_page(ROOT_PAGE, &bytes)?;
        file.sync()?;

        tracing::info!(
            "Created table {} ({} columns, {} rows per leaf)",
            path.display(),
            config.columns().len(),
            config.max_leaf_cells()
        );

        Ok(Self {
            file,
            root,
            config,
            row_id_counter: 0,
        })
    }

    /// Open an existing table file.
    ///
    /// The row id counter resumes one past the largest stored row id.
    pub fn open(path: &Path, columns: &[DataType]) -> Result<Self, TreeError> {
        let config = TableConfig::new(columns)?;
        let mut file = TableFile::open(path)?;
        let bytes = file.read_page(ROOT_PAGE)?;
        let root = Page::decode(ROOT_PAGE, &bytes).map_err(|source| TreeError::Corrupt {
            page: ROOT_PAGE,
            source,
        })?;

        let mut tree = Self {
            file,
            root,
            config,
            row_id_counter: 0,
        };
        if let Some(max) = tree.max_row_id()? {
            tree.row_id_counter = max.checked_add(1).ok_or(TreeError::RowIdExhausted)?;
        }

        tracing::info!(
            "Opened table {} ({} pages, next row id {})",
            path.display(),
            tree.file.page_count(),
            tree.row_id_counter
        );
        Ok(tree)
    }

    pub fn open_or_create(path: &Path, columns: &[DataType]) -> Result<Self, TreeError> {
        if TableFile::exists(path) {
            Self::open(path, columns)
        } else {
            Self::create(path, columns)
        }
    }

    #[must_use]
    pub const fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Row id the next [`insert`](Self::insert) will use.
    #[must_use]
    pub const fn row_id_counter(&self) -> RowId {
        self.row_id_counter
    }

    #[must_use]
    pub const fn page_count(&self) -> PageNumber {
        self.file.page_count()
    }

    #[must_use]
    pub const fn root(&self) -> &Page {
        &self.root
    }

    /// Insert a row under the next row id and return that id.
    pub fn insert(&mut self, types: Vec<DataType>, values: Vec<Value>) -> Result<RowId, TreeError> {
        let row_id = self.row_id_counter;
        self.insert_with_row_id(row_id, types, values)?;
        Ok(row_id)
    }

    /// Insert an already built record under the next row id.
    pub fn insert_record(&mut self, record: DataRecord) -> Result<RowId, TreeError> {
        let row_id = self.row_id_counter;
        self.check_schema(record.types())?;
        self.insert_cell(TableLeafCell::new(row_id, record))?;
        Ok(row_id)
    }

    /// Insert a row under a caller-chosen row id.
    ///
    /// The counter moves past `row_id` if it is not already beyond it. Rows
    /// with an id already in the table are rejected.
    pub fn insert_with_row_id(
        &mut self,
        row_id: RowId,
        types: Vec<DataType>,
        values: Vec<Value>,
    ) -> Result<(), TreeError> {
        self.check_schema(&types)?;
        let record = DataRecord::new(types, values).inspect_err(|e| {
            tracing::warn!("Rejected row {row_id}: {e}");
        })?;
        self.insert_cell(TableLeafCell::new(row_id, record))
    }

    /// Look up a row.
    pub fn get(&mut self, row_id: RowId) -> Result<Option<DataRecord>, TreeError> {
        let mut walk = Walk::default();
        let mut page = self.root.clone();
        loop {
            match page.into_body() {
                PageBody::Leaf(leaf) => {
                    return Ok(leaf.find(row_id).map(|cell| cell.record().clone()));
                }
                PageBody::Interior(interior) => {
                    let (_, child) = interior.route(row_id);
                    walk.step(child, self.file.page_count())?;
                    page = self.read_page(child)?;
                }
            }
        }
    }

    /// Iterate over all rows in row-id order.
    pub fn cursor(&mut self) -> Result<TableCursor<'_>, TreeError> {
        let first_leaf = self.leftmost_leaf()?;
        Ok(TableCursor {
            tree: self,
            cells: Vec::new().into_iter(),
            next_leaf: Some(first_leaf),
            walk: Walk::default(),
        })
    }

    /// Number of rows in the table.
    pub fn count(&mut self) -> Result<usize, TreeError> {
        let mut cursor = self.cursor()?;
        let mut count = 0;
        while cursor.next_row()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Number of edges from the root to a leaf. A lone root leaf has height 0.
    pub fn height(&mut self) -> Result<usize, TreeError> {
        let mut walk = Walk::default();
        let mut height = 0;
        let mut page = self.root.clone();
        while let PageBody::Interior(interior) = page.body() {
            let (_, child) = interior.route(RowId::MIN);
            walk.step(child, self.file.page_count())?;
            page = self.read_page(child)?;
            height += 1;
        }
        Ok(height)
    }

    /// Sync the table file to disk.
    pub fn sync(&mut self) -> Result<(), TreeError> {
        Ok(self.file.sync()?)
    }

    fn check_schema(&self, types: &[DataType]) -> Result<(), TreeError> {
        let columns = self.config.columns();
        let error = if types.len() == columns.len() {
            columns
                .iter()
                .zip(types)
                .position(|(declared, actual)| !actual.fits_column(*declared))
                .map(|column| TreeError::ColumnType {
                    column,
                    expected: columns[column],
                    actual: types[column],
                })
        } else {
            Some(TreeError::ColumnCount {
                expected: columns.len(),
                actual: types.len(),
            })
        };

        match error {
            Some(e) => {
                tracing::warn!("Rejected row: {e}");
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn insert_cell(&mut self, cell: TableLeafCell) -> Result<(), TreeError> {
        let row_id = cell.row_id();
        if row_id < 0 {
            tracing::warn!("Rejected negative row id {row_id}");
            return Err(TreeError::InvalidRowId(row_id));
        }
        let next_counter = row_id.checked_add(1).ok_or(TreeError::RowIdExhausted)?;

        if self.root.is_full(&self.config) {
            if leaf_contains(&self.root, row_id) {
                return Err(Self::duplicate(row_id));
            }
            self.split_root(row_id)?;
        }

        // Whether `page` is on the right edge, reached from the root through
        // right-most children only.
        let mut far_right = true;
        let mut walk = Walk::default();
        let mut page = self.root.clone();
        loop {
            let (slot, child_number) = match page.body() {
                PageBody::Leaf(_) => break,
                PageBody::Interior(interior) => interior.route(row_id),
            };
            far_right &= slot == ChildSlot::Right;

            walk.step(child_number, self.file.page_count())?;
            let child = self.read_page(child_number)?;
            page = if child.is_full(&self.config) {
                if leaf_contains(&child, row_id) {
                    return Err(Self::duplicate(row_id));
                }
                let half = self.split_child(&mut page, slot, child, row_id, far_right)?;
                // The lower half now has a separator; only the sibling keeps
                // the right-most slot.
                far_right &= half.number() != child_number;
                half
            } else {
                child
            };
        }

        page.insert_cell(DataCell::Leaf(cell), &self.config)
            .map_err(|e| match e {
                PageError::DuplicateRowId(row_id) => Self::duplicate(row_id),
                e => TreeError::Page(e),
            })?;
        self.write_page(&page)?;

        self.row_id_counter = self.row_id_counter.max(next_counter);
        Ok(())
    }

    /// Move the full root's contents to a new page, make page 0 an interior
    /// page whose only child is that page, then split it like any other full
    /// child.
    fn split_root(&mut self, row_id: RowId) -> Result<(), TreeError> {
        let left_number = self.file.allocate_page()?;
        let left = self.root.clone().renumbered(left_number);
        self.write_page(&left)?;

        let mut root = Page::new_interior(ROOT_PAGE, left_number);
        self.write_page(&root)?;
        tracing::debug!(
            "Promoted root: moved {:?} contents to page {left_number}",
            left.kind()
        );

        self.split_child(&mut root, ChildSlot::Right, left, row_id, true)?;
        Ok(())
    }

    /// Split the full `child`, reached from `parent` through `slot`, and
    /// return the half that `row_id` belongs in. `far_right` is set when the
    /// child is on the right edge of the tree.
    ///
    /// The lower half keeps the child's page number and gets a separator in
    /// the parent; the slot that pointed at the child now points at the new
    /// sibling holding the upper half.
    fn split_child(
        &mut self,
        parent: &mut Page,
        slot: ChildSlot,
        mut child: Page,
        row_id: RowId,
        far_right: bool,
    ) -> Result<Page, TreeError> {
        let sibling_number = self.file.allocate_page()?;
        let (separator, sibling) = child.split(row_id, sibling_number, far_right)?;
        self.write_page(&sibling)?;
        self.write_page(&child)?;

        parent.repoint(slot, sibling_number)?;
        parent.insert_cell(
            DataCell::Interior(TableInteriorCell::new(separator, child.number())),
            &self.config,
        )?;
        self.write_page(parent)?;

        tracing::debug!(
            "Split {:?} page {} at row {separator}: {} + {} cells, sibling {sibling_number}",
            child.kind(),
            child.number(),
            child.num_cells(),
            sibling.num_cells()
        );

        Ok(if row_id <= separator { child } else { sibling })
    }

    fn duplicate(row_id: RowId) -> TreeError {
        tracing::warn!("Rejected duplicate row id {row_id}");
        TreeError::DuplicateRowId(row_id)
    }

    fn read_page(&mut self, page_number: PageNumber) -> Result<Page, TreeError> {
        let bytes = self.file.read_page(page_number)?;
        Page::decode(page_number, &bytes).map_err(|source| TreeError::Corrupt {
            page: page_number,
            source,
        })
    }

    /// Write a page, keeping the cached root in step with page 0.
    fn write_page(&mut self, page: &Page) -> Result<(), TreeError> {
        let bytes = page.encode()?;
        self.file.write_page(page.number(), &bytes)?;
        if page.is_root() {
            self.root = page.clone();
        }
        Ok(())
    }

    fn leftmost_leaf(&mut self) -> Result<PageNumber, TreeError> {
        let mut walk = Walk::default();
        let mut number = ROOT_PAGE;
        let mut page = self.root.clone();
        while let PageBody::Interior(interior) = page.body() {
            (_, number) = interior.route(RowId::MIN);
            walk.step(number, self.file.page_count())?;
            page = self.read_page(number)?;
        }
        Ok(number)
    }

    /// Largest stored row id, found along the right edge of the tree. Falls
    /// back to a full scan if the right-most leaf is empty.
    fn max_row_id(&mut self) -> Result<Option<RowId>, TreeError> {
        let mut walk = Walk::default();
        let mut page = self.root.clone();
        loop {
            match page.into_body() {
                PageBody::Leaf(leaf) => {
                    if let Some(max) = leaf.max_row_id() {
                        return Ok(Some(max));
                    }
                    break;
                }
                PageBody::Interior(interior) => {
                    let child = interior.right_child();
                    walk.step(child, self.file.page_count())?;
                    page = self.read_page(child)?;
                }
            }
        }

        let mut max = None;
        let mut cursor = self.cursor()?;
        while let Some((row_id, _)) = cursor.next_row()? {
            max = Some(row_id);
        }
        Ok(max)
    }
}

/// Pages visited by one walk down the tree or along the leaf chain. A walk
/// longer than the file has pages is going round in a cycle.
#[derive(Debug, Default)]
struct Walk {
    visited: u64,
}

impl Walk {
    fn step(&mut self, page: PageNumber, page_count: PageNumber) -> Result<(), TreeError> {
        self.visited += 1;
        if self.visited > u64::from(page_count) {
            return Err(TreeError::Cycle { page });
        }
        Ok(())
    }
}

/// Whether `page` is a leaf already holding `row_id`.
fn leaf_contains(page: &Page, row_id: RowId) -> bool {
    matches!(page.body(), PageBody::Leaf(leaf) if leaf.find(row_id).is_some())
}

/// Walks the leaf chain of a [`TableTree`] in row-id order.
pub struct TableCursor<'a> {
    tree: &'a mut TableTree,
    cells: std::vec::IntoIter<TableLeafCell>,
    next_leaf: Option<PageNumber>,
    walk: Walk,
}

impl TableCursor<'_> {
    /// Get the next row.
    pub fn next_row(&mut self) -> Result<Option<(RowId, DataRecord)>, TreeError> {
        loop {
            if let Some(cell) = self.cells.next() {
                return Ok(Some((cell.row_id(), cell.into_record())));
            }

            let Some(page_number) = self.next_leaf else {
                return Ok(None);
            };
            self.walk.step(page_number, self.tree.file.page_count())?;
            let page = if page_number == ROOT_PAGE {
                self.tree.root.clone()
            } else {
                self.tree.read_page(page_number)?
            };
            let PageBody::Leaf(leaf) = page.into_body() else {
                return Err(TreeError::UnexpectedPageKind {
                    page: page_number,
                    expected: PageKind::Leaf,
                });
            };

            self.next_leaf = leaf.next_sibling();
            self.cells = leaf.into_cells().into_iter();
        }
    }
}

/// Broad classes of [`TreeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The row does not match the table's columns, or the columns cannot
    /// form a table. Nothing was written.
    Schema,
    /// The row id is unusable or already taken.
    Key,
    /// The file holds something that is not a valid table.
    Corruption,
    /// Reading or writing the file failed.
    Io,
}

/// Errors that can occur during table operations.
#[derive(Debug)]
pub enum TreeError {
    /// Row has the wrong number of columns.
    ColumnCount { expected: usize, actual: usize },
    /// Row value type does not fit the declared column type.
    ColumnType {
        column: usize,
        expected: DataType,
        actual: DataType,
    },
    /// Row values do not form a valid record.
    Record(RecordError),
    /// Columns cannot form a table.
    Layout(LayoutError),
    /// Row id already in the table.
    DuplicateRowId(RowId),
    /// Row ids are never negative.
    InvalidRowId(RowId),
    /// No row ids left.
    RowIdExhausted,
    /// A page that failed to decode.
    Corrupt { page: PageNumber, source: PageError },
    /// Following child or sibling pointers came back to a page already seen.
    Cycle { page: PageNumber },
    /// A pointer led to the wrong kind of page.
    UnexpectedPageKind { page: PageNumber, expected: PageKind },
    /// Page error.
    Page(PageError),
    /// File error.
    File(FileError),
}

impl TreeError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ColumnCount { .. }
            | Self::ColumnType { .. }
            | Self::Record(_)
            | Self::Layout(_) => ErrorKind::Schema,
            Self::DuplicateRowId(_) | Self::InvalidRowId(_) | Self::RowIdExhausted => {
                ErrorKind::Key
            }
            Self::Corrupt { .. }
            | Self::Cycle { .. }
            | Self::UnexpectedPageKind { .. }
            | Self::Page(_)
            | Self::File(FileError::Misaligned { .. } | FileError::PageOutOfBounds { .. }) => {
                ErrorKind::Corruption
            }
            Self::File(_) => ErrorKind::Io,
        }
    }
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnCount { expected, actual } => {
                write!(f, "expected {expected} columns, got {actual}")
            }
            Self::ColumnType {
                column,
                expected,
                actual,
            } => write!(f, "column {column} is {expected}, got {actual}"),
            Self::Record(e) => write!(f, "invalid row: {e}"),
            Self::Layout(e) => write!(f, "invalid table layout: {e}"),
            Self::DuplicateRowId(row_id) => write!(f, "row id {row_id} already exists"),
            Self::InvalidRowId(row_id) => write!(f, "invalid row id {row_id}"),
            Self::RowIdExhausted => write!(f, "no row ids left"),
            Self::Corrupt { page, source } => write!(f, "corrupt page {page}: {source}"),
            Self::Cycle { page } => write!(f, "page {page} is part of a pointer cycle"),
            Self::UnexpectedPageKind { page, expected } => {
                write!(f, "page {page} is not a {expected:?} page")
            }
            Self::Page(e) => write!(f, "page error: {e}"),
            Self::File(e) => write!(f, "file error: {e}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Record(e) => Some(e),
            Self::Layout(e) => Some(e),
            Self::Corrupt { source, .. } => Some(source),
            Self::Page(e) => Some(e),
            Self::File(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RecordError> for TreeError {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

impl From<LayoutError> for TreeError {
    fn from(e: LayoutError) -> Self {
        Self::Layout(e)
    }
}

impl From<PageError> for TreeError {
    fn from(e: PageError) -> Self {
        Self::Page(e)
    }
}

impl From<FileError> for TreeError {
    fn from(e: FileError) -> Self {
        Self::File(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PAGE_SIZE;
    use crate::testing::TestTable;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    const BIGINTS: [DataType; 8] = [DataType::BigInt; 8];

    fn bigint_row(row_id: RowId) -> Vec<Value> {
        (0..8).map(|i| Value::BigInt(i64::from(row_id) * 100 + i)).collect()
    }

    fn text_row(row_id: RowId) -> (Vec<DataType>, Vec<Value>) {
        (
            vec![DataType::Int, DataType::Text],
            vec![Value::Int(row_id), Value::Text(format!("row number {row_id}"))],
        )
    }

    /// Summary of a subtree: smallest and largest row id and row count.
    struct Subtree {
        min: Option<RowId>,
        max: Option<RowId>,
        rows: usize,
        depth: usize,
    }

    /// Walk the subtree at `page_number`, checking ordering, capacity and
    /// separator invariants along the way.
    fn check_subtree(tree: &mut TableTree, page_number: PageNumber) -> Subtree {
        let page = if page_number == ROOT_PAGE {
            tree.root().clone()
        } else {
            tree.read_page(page_number).expect("read page")
        };
        let config = tree.config().clone();

        match page.into_body() {
            PageBody::Leaf(leaf) => {
                assert!(leaf.len() <= config.max_leaf_cells());
                let row_ids: Vec<RowId> = leaf.cells().iter().map(TableLeafCell::row_id).collect();
                assert!(row_ids.windows(2).all(|w| w[0] < w[1]));
                Subtree {
                    min: row_ids.first().copied(),
                    max: row_ids.last().copied(),
                    rows: row_ids.len(),
                    depth: 0,
                }
            }
            PageBody::Interior(interior) => {
                assert!(interior.len() <= config.max_interior_cells());
                let mut summary = Subtree {
                    min: None,
                    max: None,
                    rows: 0,
                    depth: 0,
                };
                let mut depths = Vec::new();
                let mut previous: Option<RowId> = None;

                for cell in interior.cells() {
                    let left = check_subtree(tree, cell.left_child());
                    assert_eq!(left.max, Some(cell.row_id()), "separator is left max");
                    if let (Some(previous), Some(min)) = (previous, left.min) {
                        assert!(min > previous);
                    }
                    summary.min = summary.min.or(left.min);
                    summary.rows += left.rows;
                    depths.push(left.depth);
                    previous = Some(cell.row_id());
                }

                let right = check_subtree(tree, interior.right_child());
                if let (Some(previous), Some(min)) = (previous, right.min) {
                    assert!(min > previous, "right subtree above every separator");
                }
                summary.min = summary.min.or(right.min);
                summary.max = right.max.or(previous);
                summary.rows += right.rows;
                depths.push(right.depth);

                assert!(depths.windows(2).all(|w| w[0] == w[1]), "balanced");
                summary.depth = depths[0] + 1;
                summary
            }
        }
    }

    /// Check that every page off the right edge of the tree is at least
    /// half full, and return how many pages were checked.
    fn check_occupancy(tree: &mut TableTree, page_number: PageNumber, far_right: bool) -> usize {
        let page = if page_number == ROOT_PAGE {
            tree.root().clone()
        } else {
            tree.read_page(page_number).expect("read page")
        };
        let config = tree.config().clone();

        match page.into_body() {
            PageBody::Leaf(leaf) => {
                if far_right {
                    return 0;
                }
                assert!(
                    leaf.len() >= config.min_leaf_cells(),
                    "leaf {page_number} holds {} rows",
                    leaf.len()
                );
                1
            }
            PageBody::Interior(interior) => {
                let mut checked = 0;
                if !far_right {
                    // Promoting the median leaves one half a cell short.
                    assert!(
                        interior.len() + 1 >= config.min_interior_cells(),
                        "interior page {page_number} holds {} cells",
                        interior.len()
                    );
                    checked += 1;
                }
                for cell in interior.cells() {
                    checked += check_occupancy(tree, cell.left_child(), false);
                }
                checked + check_occupancy(tree, interior.right_child(), far_right)
            }
        }
    }

    /// Point the leaf at `page_number` at a different next sibling.
    fn relink_leaf(path: &std::path::Path, page_number: PageNumber, next: PageNumber) {
        let mut bytes = std::fs::read(path).expect("read file");
        let start = usize::try_from(page_number).expect("small page number") * PAGE_SIZE + 4;
        bytes[start..start + 4].copy_from_slice(&next.to_be_bytes());
        std::fs::write(path, bytes).expect("write file");
    }

    fn collect_rows(tree: &mut TableTree) -> Vec<(RowId, DataRecord)> {
        let mut cursor = tree.cursor().expect("cursor");
        let mut rows = Vec::new();
        while let Some(row) = cursor.next_row().expect("next row") {
            rows.push(row);
        }
        rows
    }

    #[test]
    fn test_new_table_is_empty_leaf() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;

        assert_eq!(tree.row_id_counter(), 0);
        assert_eq!(tree.height().expect("height"), 0);
        assert_eq!(tree.count().expect("count"), 0);
        assert_eq!(tree.page_count(), 1);
        assert!(tree.get(0).expect("get").is_none());
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;

        for expected in 0..20 {
            let row_id = tree
                .insert(BIGINTS.to_vec(), bigint_row(expected))
                .expect("insert");
            assert_eq!(row_id, expected);
        }

        for row_id in 0..20 {
            let record = tree.get(row_id).expect("get").expect("row exists");
            assert_eq!(record.values(), bigint_row(row_id).as_slice());
        }
        assert!(tree.get(20).expect("get").is_none());
        assert!(tree.get(-1).expect("get").is_none());
    }

    #[test]
    fn test_five_thousand_bigint_rows() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;

        for row_id in 0..5000 {
            tree.insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }
        assert_eq!(tree.row_id_counter(), 5000);

        // Smallest h with leaf_degree * tree_order^h >= rows.
        let mut capacity = tree.config().leaf_degree();
        let mut expected_height = 0;
        while capacity < 5000 {
            capacity *= tree.config().tree_order();
            expected_height += 1;
        }
        assert_eq!(expected_height, 2);
        assert_eq!(tree.height().expect("height"), expected_height);

        let summary = check_subtree(tree, ROOT_PAGE);
        assert_eq!(summary.rows, 5000);
        assert_eq!(summary.min, Some(0));
        assert_eq!(summary.max, Some(4999));

        let rows = collect_rows(tree);
        assert_eq!(rows.len(), 5000);
        for (expected, (row_id, record)) in (0..).zip(&rows) {
            assert_eq!(*row_id, expected);
            assert_eq!(record.values(), bigint_row(expected).as_slice());
        }
    }

    #[test]
    fn test_root_split_layout() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;
        let per_leaf = RowId::try_from(tree.config().max_leaf_cells()).expect("small leaf");

        for row_id in 0..=per_leaf {
            tree.insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }

        // The old root's rows moved to page 1; the new row went to page 2.
        let PageBody::Interior(root) = tree.root().body() else {
            panic!("root should be interior");
        };
        assert_eq!(root.len(), 1);
        assert_eq!(root.cells()[0].left_child(), 1);
        assert_eq!(root.cells()[0].row_id(), per_leaf - 1);
        assert_eq!(root.right_child(), 2);
        assert_eq!(tree.height().expect("height"), 1);
        assert_eq!(tree.page_count(), 3);
    }

    #[test]
    fn test_duplicate_row_id_is_rejected() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;

        for row_id in 0..100 {
            tree.insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }
        let pages = tree.page_count();

        for row_id in [0, 5, 6, 50, 99] {
            let err = tree
                .insert_with_row_id(row_id, BIGINTS.to_vec(), bigint_row(row_id))
                .expect_err("duplicate");
            assert!(matches!(err, TreeError::DuplicateRowId(id) if id == row_id));
            assert_eq!(err.kind(), ErrorKind::Key);
            assert_eq!(tree.row_id_counter(), 100);
        }

        assert_eq!(tree.page_count(), pages);
        assert_eq!(tree.count().expect("count"), 100);
    }

    #[test]
    fn test_full_root_leaf_rejects_duplicate_without_split() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;
        for row_id in 0..6 {
            tree.insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }

        let err = tree
            .insert_with_row_id(3, BIGINTS.to_vec(), bigint_row(3))
            .expect_err("duplicate");
        assert!(matches!(err, TreeError::DuplicateRowId(3)));
        assert_eq!(tree.height().expect("height"), 0);
        assert_eq!(tree.page_count(), 1);
    }

    #[test]
    fn test_schema_mismatch_leaves_file_untouched() {
        let mut table = TestTable::new(&BIGINTS);
        for row_id in 0..10 {
            table
                .tree
                .insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }
        let before = std::fs::read(table.path()).expect("read file");

        let err = table
            .tree
            .insert(vec![DataType::BigInt; 7], bigint_row(0)[..7].to_vec())
            .expect_err("wrong arity");
        assert!(matches!(
            err,
            TreeError::ColumnCount {
                expected: 8,
                actual: 7
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Schema);

        let mut types = BIGINTS.to_vec();
        types[2] = DataType::Int;
        let mut values = bigint_row(0);
        values[2] = Value::Int(1);
        let err = table.tree.insert(types, values).expect_err("wrong type");
        assert!(matches!(err, TreeError::ColumnType { column: 2, .. }));

        let err = table
            .tree
            .insert(BIGINTS.to_vec(), vec![Value::Int(1); 8])
            .expect_err("values do not match types");
        assert!(matches!(err, TreeError::Record(_)));
        assert_eq!(err.kind(), ErrorKind::Schema);

        assert_eq!(table.tree.row_id_counter(), 10);
        assert_eq!(std::fs::read(table.path()).expect("read file"), before);
    }

    #[test]
    fn test_null_placeholders_accepted() {
        let columns = [DataType::TinyInt, DataType::Double, DataType::Text];
        let mut table = TestTable::new(&columns);

        let record = DataRecord::for_schema(
            &columns,
            vec![Value::Null, Value::Double(2.5), Value::Text(String::new())],
        )
        .expect("valid record");
        let row_id = table.tree.insert_record(record.clone()).expect("insert");

        let stored = table.tree.get(row_id).expect("get").expect("row exists");
        assert_eq!(stored.types()[0], DataType::Null1);
        assert_eq!(stored, record);
    }

    #[test]
    fn test_invalid_row_ids() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;

        let err = tree
            .insert_with_row_id(-1, BIGINTS.to_vec(), bigint_row(0))
            .expect_err("negative");
        assert!(matches!(err, TreeError::InvalidRowId(-1)));

        tree.insert_with_row_id(RowId::MAX - 1, BIGINTS.to_vec(), bigint_row(0))
            .expect("insert");
        assert_eq!(tree.row_id_counter(), RowId::MAX);

        let err = tree
            .insert(BIGINTS.to_vec(), bigint_row(0))
            .expect_err("exhausted");
        assert!(matches!(err, TreeError::RowIdExhausted));
        assert_eq!(tree.count().expect("count"), 1);
    }

    #[test]
    fn test_explicit_row_ids_move_counter_forward() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;

        tree.insert_with_row_id(10, BIGINTS.to_vec(), bigint_row(10))
            .expect("insert");
        assert_eq!(tree.row_id_counter(), 11);

        tree.insert_with_row_id(3, BIGINTS.to_vec(), bigint_row(3))
            .expect("insert");
        assert_eq!(tree.row_id_counter(), 11);

        assert_eq!(tree.insert(BIGINTS.to_vec(), bigint_row(11)).expect("insert"), 11);
        let row_ids: Vec<RowId> = collect_rows(tree).into_iter().map(|(id, _)| id).collect();
        assert_eq!(row_ids, vec![3, 10, 11]);
    }

    #[test]
    fn test_shuffled_inserts_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut row_ids: Vec<RowId> = (0..3000).collect();
        row_ids.shuffle(&mut rng);

        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;
        for &row_id in &row_ids {
            tree.insert_with_row_id(row_id, BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }
        assert_eq!(tree.row_id_counter(), 3000);

        let summary = check_subtree(tree, ROOT_PAGE);
        assert_eq!(summary.rows, 3000);
        assert_eq!(summary.depth, tree.height().expect("height"));

        for _ in 0..200 {
            let row_id = rng.random_range(0..3000);
            let record = tree.get(row_id).expect("get").expect("row exists");
            assert_eq!(record.values(), bigint_row(row_id).as_slice());
        }

        let ids: Vec<RowId> = collect_rows(tree).into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, (0..3000).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffled_inserts_fill_pages_off_the_right_edge() {
        let mut rng = StdRng::seed_from_u64(20);
        let mut row_ids: Vec<RowId> = (0..20_000).collect();
        row_ids.shuffle(&mut rng);

        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;
        for &row_id in &row_ids {
            tree.insert_with_row_id(row_id, BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }

        assert_eq!(tree.height().expect("height"), 3);
        let checked = check_occupancy(tree, ROOT_PAGE, true);
        assert!(checked > 3000, "checked {checked} pages");
        assert_eq!(check_subtree(tree, ROOT_PAGE).rows, 20_000);
    }

    #[test]
    fn test_ascending_inserts_fill_pages_off_the_right_edge() {
        let mut table = TestTable::new(&BIGINTS);
        let tree = &mut table.tree;
        for row_id in 0..5000 {
            tree.insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }

        // Every leaf left behind by an ascending load is full.
        let max = tree.config().max_leaf_cells();
        let first = tree.leftmost_leaf().expect("leftmost leaf");
        let mut next = Some(first);
        let mut sizes = Vec::new();
        while let Some(number) = next {
            let PageBody::Leaf(leaf) = tree.read_page(number).expect("read").into_body() else {
                panic!("expected leaf");
            };
            sizes.push(leaf.len());
            next = leaf.next_sibling();
        }
        let (last, rest) = sizes.split_last().expect("at least one leaf");
        assert!(rest.iter().all(|&len| len == max));
        assert!(*last >= 1);
        check_occupancy(tree, ROOT_PAGE, true);
    }

    #[test]
    fn test_leaf_linked_to_itself_is_corrupt() {
        let mut table = TestTable::new(&BIGINTS);
        for row_id in 0..20 {
            table
                .tree
                .insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }
        let first = table.tree.leftmost_leaf().expect("leftmost leaf");
        relink_leaf(table.path(), first, first);

        let err = table.tree.count().expect_err("self link");
        assert!(matches!(
            err,
            TreeError::Corrupt {
                source: PageError::LinksToItself,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }

    #[test]
    fn test_leaf_chain_cycle_is_corrupt() {
        let mut table = TestTable::new(&BIGINTS);
        for row_id in 0..20 {
            table
                .tree
                .insert(BIGINTS.to_vec(), bigint_row(row_id))
                .expect("insert");
        }
        let first = table.tree.leftmost_leaf().expect("leftmost leaf");
        let PageBody::Leaf(leaf) = table.tree.read_page(first).expect("read").into_body() else {
            panic!("expected leaf");
        };
        let second = leaf.next_sibling().expect("second leaf");
        relink_leaf(table.path(), second, first);

        let err = table.tree.count().expect_err("cycle");
        assert!(matches!(err, TreeError::Cycle { .. }));
        assert_eq!(err.kind(), ErrorKind::Corruption);

        // Lookups do not follow sibling links and still work.
        assert!(table.tree.get(3).expect("get").is_some());
    }

    #[test]
    fn test_text_table_one_row_per_leaf() {
        let (types, _) = text_row(0);
        let mut table = TestTable::new(&types);
        assert_eq!(table.tree.config().max_leaf_cells(), 1);

        let mut rng = StdRng::seed_from_u64(11);
        let mut row_ids: Vec<RowId> = (0..400).collect();
        row_ids.shuffle(&mut rng);
        for &row_id in &row_ids {
            let (types, values) = text_row(row_id);
            table
                .tree
                .insert_with_row_id(row_id, types, values)
                .expect("insert");
        }

        let summary = check_subtree(&mut table.tree, ROOT_PAGE);
        assert_eq!(summary.rows, 400);

        // Capacity assumes the longest text, so short rows still get a
        // leaf each.
        let mut next = Some(table.tree.leftmost_leaf().expect("leftmost leaf"));
        let mut leaves = 0;
        while let Some(number) = next {
            let page = table.tree.read_page(number).expect("read");
            let PageBody::Leaf(leaf) = page.into_body() else {
                panic!("expected leaf");
            };
            assert_eq!(leaf.len(), 1);
            leaves += 1;
            next = leaf.next_sibling();
        }
        assert_eq!(leaves, 400);

        let rows = collect_rows(&mut table.tree);
        for (expected, (row_id, record)) in (0..).zip(&rows) {
            assert_eq!(*row_id, expected);
            assert_eq!(record.values(), text_row(expected).1.as_slice());
        }

        let (types, values) = text_row(123);
        let err = table
            .tree
            .insert_with_row_id(123, types, values)
            .expect_err("duplicate");
        assert!(matches!(err, TreeError::DuplicateRowId(123)));
    }

    #[test]
    fn test_reopen_restores_rows_and_counter() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("user_data").join("t.tbl");

        {
            let mut tree = TableTree::create(&path, &BIGINTS).expect("create");
            for row_id in 0..700 {
                tree.insert(BIGINTS.to_vec(), bigint_row(row_id))
                    .expect("insert");
            }
            tree.sync().expect("sync");
        }

        let mut tree = TableTree::open_or_create(&path, &BIGINTS).expect("open");
        assert_eq!(tree.row_id_counter(), 700);
        assert_eq!(tree.count().expect("count"), 700);
        assert_eq!(
            tree.get(456).expect("get").expect("row exists").values(),
            bigint_row(456).as_slice()
        );

        assert_eq!(tree.insert(BIGINTS.to_vec(), bigint_row(700)).expect("insert"), 700);
        check_subtree(&mut tree, ROOT_PAGE);
    }

    #[test]
    fn test_create_rejects_degenerate_layout() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("t.tbl");

        let err = TableTree::create(&path, &[DataType::Text; 3]).expect_err("degenerate");
        assert!(matches!(err, TreeError::Layout(LayoutError::DegenerateTree { .. })));
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(!path.exists());
    }

    #[test]
    fn test_open_rejects_corrupt_root() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("t.tbl");
        std::fs::write(&path, vec![0u8; 512]).expect("write file");

        let err = TableTree::open(&path, &BIGINTS).expect_err("corrupt");
        assert!(matches!(
            err,
            TreeError::Corrupt {
                page: 0,
                source: PageError::InvalidPageType(0)
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Corruption);

        std::fs::write(&path, vec![0u8; 100]).expect("write file");
        let err = TableTree::open(&path, &BIGINTS).expect_err("misaligned");
        assert_eq!(err.kind(), ErrorKind::Corruption);
    }
}
