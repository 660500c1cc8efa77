//! Table pages: the fixed-size blocks a table file is made of.
//!
//! Page layout:
//! - header: 8 bytes (see [`PageHeader`])
//! - cell offsets: 2 bytes per cell, in row-id order
//! - free space: zero-filled
//! - cell bodies: packed from the end of the page toward the front
//!
//! The cell area is stored reversed. Reading the last `start_of_cell_pointers`
//! bytes of the page backwards yields a buffer in which each cell's ordinary
//! encoding begins at its offset. Offsets are therefore distances from the end
//! of the page.

#![allow(clippy::cast_possible_truncation)]

use crate::storage::cell::{CellError, CellKind, DataCell, TableInteriorCell, TableLeafCell};
use crate::storage::table_config::TableConfig;

/// Page size in bytes.
pub const PAGE_SIZE: usize = 512;

/// Page size as u64 for file offset calculations.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// Size of the page header in bytes.
pub const PAGE_HEADER_SIZE: usize = 8;

/// Size of one entry in the cell offset array.
pub const CELL_OFFSET_SIZE: usize = 2;

/// Page number of the tree root. It is never a child or a sibling, so a
/// pointer holding this value means "no page".
pub const ROOT_PAGE: PageNumber = 0;

/// A page's position in its file (0-indexed).
pub type PageNumber = u32;

/// Key of a table row.
pub type RowId = i32;

/// Page type byte stored in the header. Root pages use the same codes as
/// other pages of their kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageKind {
    Interior = 0x05,
    Leaf = 0x0D,
}

impl TryFrom<u8> for PageKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x05 => Ok(Self::Interior),
            0x0D => Ok(Self::Leaf),
            _ => Err(value),
        }
    }
}

impl From<PageKind> for CellKind {
    fn from(kind: PageKind) -> Self {
        match kind {
            PageKind::Interior => Self::Interior,
            PageKind::Leaf => Self::Leaf,
        }
    }
}

/// Role of a page in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    LeafRoot,
    Leaf,
    InteriorRoot,
    Interior,
}

impl PageType {
    #[must_use]
    pub const fn kind(self) -> PageKind {
        match self {
            Self::LeafRoot | Self::Leaf => PageKind::Leaf,
            Self::InteriorRoot | Self::Interior => PageKind::Interior,
        }
    }

    #[must_use]
    pub const fn is_root(self) -> bool {
        matches!(self, Self::LeafRoot | Self::InteriorRoot)
    }
}

/// Header at the start of every page.
///
/// Layout (big-endian):
/// - `kind`: 1 byte
/// - `num_cells`: 1 byte
/// - `start_of_cell_pointers`: 2 bytes, length of the cell area at the tail
/// - `next_page_pointer`: 4 bytes, right sibling of a leaf (0 if none) or
///   right-most child of an interior page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub kind: PageKind,
    pub num_cells: u8,
    pub start_of_cell_pointers: u16,
    pub next_page_pointer: PageNumber,
}

impl PageHeader {
    pub const SIZE: usize = PAGE_HEADER_SIZE;

    #[must_use]
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.kind as u8;
        buf[1] = self.num_cells;
        buf[2..4].copy_from_slice(&self.start_of_cell_pointers.to_be_bytes());
        buf[4..8].copy_from_slice(&self.next_page_pointer.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Result<Self, PageError> {
        let kind = PageKind::try_from(bytes[0]).map_err(PageError::InvalidPageType)?;
        Ok(Self {
            kind,
            num_cells: bytes[1],
            start_of_cell_pointers: u16::from_be_bytes([bytes[2], bytes[3]]),
            next_page_pointer: PageNumber::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }
}

/// Which pointer of an interior page leads to a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSlot {
    /// The left child of the cell at this index.
    Cell(usize),
    /// The page's right-most child.
    Right,
}

/// A leaf page: rows in row-id order plus the link to the next leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableLeafPage {
    cells: Vec<TableLeafCell>,
    next_sibling: PageNumber,
}

impl TableLeafPage {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cells: Vec::new(),
            next_sibling: ROOT_PAGE,
        }
    }

    #[must_use]
    pub fn cells(&self) -> &[TableLeafCell] {
        &self.cells
    }

    #[must_use]
    pub fn into_cells(self) -> Vec<TableLeafCell> {
        self.cells
    }

    #[must_use]
    pub const fn next_sibling(&self) -> Option<PageNumber> {
        if self.next_sibling == ROOT_PAGE {
            None
        } else {
            Some(self.next_sibling)
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn is_full(&self, config: &TableConfig) -> bool {
        self.cells.len() >= config.max_leaf_cells()
    }

    #[must_use]
    pub fn find(&self, row_id: RowId) -> Option<&TableLeafCell> {
        self.cells
            .binary_search_by_key(&row_id, TableLeafCell::row_id)
            .ok()
            .map(|index| &self.cells[index])
    }

    #[must_use]
    pub fn max_row_id(&self) -> Option<RowId> {
        self.cells.last().map(TableLeafCell::row_id)
    }

    /// Insert a row in row-id order.
    ///
    /// A duplicate row id is reported before the capacity check, so a full
    /// page still tells the caller the row already exists.
    pub fn insert(
        &mut self,
        mut cell: TableLeafCell,
        config: &TableConfig,
    ) -> Result<(), PageError> {
        let index = match self
            .cells
            .binary_search_by_key(&cell.row_id(), TableLeafCell::row_id)
        {
            Ok(_) => return Err(PageError::DuplicateRowId(cell.row_id())),
            Err(index) => index,
        };
        if self.is_full(config) {
            return Err(PageError::PageFull {
                cells: self.cells.len(),
            });
        }
        place(&mut self.cells, &mut cell, config.has_text_columns())?;
        self.cells.insert(index, cell);
        Ok(())
    }

    /// Move the upper cells into a new right sibling and return the separator
    /// for the parent along with the sibling.
    ///
    /// On the far-right leaf, an `incoming` row id above every row here is
    /// an ascending load: all cells stay put and the sibling starts empty.
    /// Anywhere else the cells are split in half, except that a lone cell
    /// stays on the side `incoming` does not go to. The separator is the
    /// largest row id left behind, or `incoming` when nothing is.
    fn split(
        &mut self,
        incoming: RowId,
        sibling_number: PageNumber,
        far_right: bool,
    ) -> (RowId, Self) {
        let after_all = self.max_row_id().is_none_or(|max| incoming > max);
        let mid = if after_all && (far_right || self.cells.len() < 2) {
            self.cells.len()
        } else {
            self.cells.len() / 2
        };

        let mut moved = self.cells.split_off(mid);
        compact(&mut moved);
        let separator = self.max_row_id().unwrap_or(incoming);

        let sibling = Self {
            cells: moved,
            next_sibling: self.next_sibling,
        };
        self.next_sibling = sibling_number;
        (separator, sibling)
    }
}

/// An interior page: separators with their left children, plus the child
/// holding every row id above the last separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInteriorPage {
    cells: Vec<TableInteriorCell>,
    right_child: PageNumber,
}

impl TableInteriorPage {
    #[must_use]
    pub const fn new(right_child: PageNumber) -> Self {
        Self {
            cells: Vec::new(),
            right_child,
        }
    }

    #[must_use]
    pub fn cells(&self) -> &[TableInteriorCell] {
        &self.cells
    }

    #[must_use]
    pub const fn right_child(&self) -> PageNumber {
        self.right_child
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[must_use]
    pub fn is_full(&self, config: &TableConfig) -> bool {
        self.cells.len() >= config.max_interior_cells()
    }

    #[must_use]
    pub fn max_row_id(&self) -> Option<RowId> {
        self.cells.last().map(TableInteriorCell::row_id)
    }

    /// Child that holds (or would hold) `row_id`: the left child of the first
    /// separator at or above it, else the right-most child.
    #[must_use]
    pub fn route(&self, row_id: RowId) -> (ChildSlot, PageNumber) {
        let index = self.cells.partition_point(|cell| cell.row_id() < row_id);
        match self.cells.get(index) {
            Some(cell) => (ChildSlot::Cell(index), cell.left_child()),
            None => (ChildSlot::Right, self.right_child),
        }
    }

    /// Point `slot` at a different child.
    pub fn repoint(&mut self, slot: ChildSlot, child: PageNumber) -> Result<(), PageError> {
        match slot {
            ChildSlot::Right => self.right_child = child,
            ChildSlot::Cell(index) => {
                let cells = self.cells.len();
                self.cells
                    .get_mut(index)
                    .ok_or(PageError::NoSuchSlot { index, cells })?
                    .set_left_child(child);
            }
        }
        Ok(())
    }

    pub fn insert(
        &mut self,
        mut cell: TableInteriorCell,
        config: &TableConfig,
    ) -> Result<(), PageError> {
        let index = match self
            .cells
            .binary_search_by_key(&cell.row_id(), TableInteriorCell::row_id)
        {
            Ok(_) => return Err(PageError::DuplicateRowId(cell.row_id())),
            Err(index) => index,
        };
        if self.is_full(config) {
            return Err(PageError::PageFull {
                cells: self.cells.len(),
            });
        }
        place(&mut self.cells, &mut cell, false)?;
        self.cells.insert(index, cell);
        Ok(())
    }

    /// Remove a median cell, keep the cells below it and move the cells above
    /// it into a new sibling. The median's key is returned as the separator
    /// and its left child becomes this page's right-most child.
    ///
    /// On the far-right page, an `incoming` row id above every separator
    /// makes the last cell the median, leaving the sibling with only the old
    /// right-most child.
    fn split(&mut self, incoming: RowId, far_right: bool) -> Result<(RowId, Self), PageError> {
        let appending = far_right && self.max_row_id().is_none_or(|max| incoming > max);
        let mid = if appending {
            self.cells.len().saturating_sub(1)
        } else {
            self.cells.len() / 2
        };

        let mut moved = self.cells.split_off(mid);
        if moved.is_empty() {
            return Err(PageError::SplitEmptyPage);
        }
        let median = moved.remove(0);
        compact(&mut moved);

        let sibling = Self {
            cells: moved,
            right_child: self.right_child,
        };
        self.right_child = median.left_child();
        Ok((median.row_id(), sibling))
    }
}

/// Contents of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageBody {
    Leaf(TableLeafPage),
    Interior(TableInteriorPage),
}

/// A decoded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    number: PageNumber,
    body: PageBody,
}

impl Page {
    #[must_use]
    pub const fn new_leaf(number: PageNumber) -> Self {
        Self {
            number,
            body: PageBody::Leaf(TableLeafPage::new()),
        }
    }

    #[must_use]
    pub const fn new_interior(number: PageNumber, right_child: PageNumber) -> Self {
        Self {
            number,
            body: PageBody::Interior(TableInteriorPage::new(right_child)),
        }
    }

    #[must_use]
    pub const fn number(&self) -> PageNumber {
        self.number
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.number == ROOT_PAGE
    }

    /// The same contents stored under a different page number.
    #[must_use]
    pub fn renumbered(self, number: PageNumber) -> Self {
        Self {
            number,
            body: self.body,
        }
    }

    #[must_use]
    pub const fn body(&self) -> &PageBody {
        &self.body
    }

    pub const fn body_mut(&mut self) -> &mut PageBody {
        &mut self.body
    }

    #[must_use]
    pub fn into_body(self) -> PageBody {
        self.body
    }

    #[must_use]
    pub const fn kind(&self) -> PageKind {
        match self.body {
            PageBody::Leaf(_) => PageKind::Leaf,
            PageBody::Interior(_) => PageKind::Interior,
        }
    }

    #[must_use]
    pub const fn page_type(&self) -> PageType {
        match (&self.body, self.is_root()) {
            (PageBody::Leaf(_), true) => PageType::LeafRoot,
            (PageBody::Leaf(_), false) => PageType::Leaf,
            (PageBody::Interior(_), true) => PageType::InteriorRoot,
            (PageBody::Interior(_), false) => PageType::Interior,
        }
    }

    #[must_use]
    pub fn num_cells(&self) -> usize {
        match &self.body {
            PageBody::Leaf(leaf) => leaf.len(),
            PageBody::Interior(interior) => interior.len(),
        }
    }

    #[must_use]
    pub fn is_full(&self, config: &TableConfig) -> bool {
        match &self.body {
            PageBody::Leaf(leaf) => leaf.is_full(config),
            PageBody::Interior(interior) => interior.is_full(config),
        }
    }

    /// Offset a new cell of `size` bytes would be placed at, ignoring
    /// whether the page has room for it.
    ///
    /// Gaps left between cells are reused: the first gap large enough for
    /// fixed-size cells, the tightest one for leaves with text columns.
    /// Without a usable gap the cell goes after the last cell.
    #[must_use]
    pub fn free_cell_location(&self, size: usize, config: &TableConfig) -> usize {
        match &self.body {
            PageBody::Leaf(leaf) => {
                free_cell_location(&leaf.cells, size, config.has_text_columns())
            }
            PageBody::Interior(interior) => free_cell_location(&interior.cells, size, false),
        }
    }

    /// Insert a cell of the page's own kind.
    pub fn insert_cell(&mut self, cell: DataCell, config: &TableConfig) -> Result<(), PageError> {
        let page = self.kind();
        match (&mut self.body, cell) {
            (PageBody::Leaf(leaf), DataCell::Leaf(cell)) => leaf.insert(cell, config),
            (PageBody::Interior(interior), DataCell::Interior(cell)) => {
                interior.insert(cell, config)
            }
            (_, cell) => Err(PageError::WrongCellKind {
                page,
                cell: cell.kind(),
            }),
        }
    }

    /// Point a child slot of an interior page at a different child.
    pub fn repoint(&mut self, slot: ChildSlot, child: PageNumber) -> Result<(), PageError> {
        match &mut self.body {
            PageBody::Interior(interior) => interior.repoint(slot, child),
            PageBody::Leaf(_) => Err(PageError::NotInterior),
        }
    }

    /// Split this page around `incoming`, the row id being inserted, and
    /// return the separator and a sibling numbered `sibling_number` holding
    /// the upper cells. Leaves are relinked so this page points at the
    /// sibling.
    ///
    /// `far_right` says the page sits on the right edge of the tree, where
    /// ascending loads leave full pages behind instead of halving them.
    pub fn split(
        &mut self,
        incoming: RowId,
        sibling_number: PageNumber,
        far_right: bool,
    ) -> Result<(RowId, Self), PageError> {
        let (separator, body) = match &mut self.body {
            PageBody::Leaf(leaf) => {
                let (separator, sibling) = leaf.split(incoming, sibling_number, far_right);
                (separator, PageBody::Leaf(sibling))
            }
            PageBody::Interior(interior) => {
                let (separator, sibling) = interior.split(incoming, far_right)?;
                (separator, PageBody::Interior(sibling))
            }
        };
        Ok((
            separator,
            Self {
                number: sibling_number,
                body,
            },
        ))
    }

    /// Serialize to exactly `PAGE_SIZE` bytes.
    pub fn encode(&self) -> Result<Box<[u8; PAGE_SIZE]>, PageError> {
        let mut buf = Box::new([0u8; PAGE_SIZE]);
        let (kind, num_cells, extent, next_page_pointer) = match &self.body {
            PageBody::Leaf(leaf) => (
                PageKind::Leaf,
                leaf.cells.len(),
                encode_cells(&leaf.cells, &mut buf)?,
                leaf.next_sibling,
            ),
            PageBody::Interior(interior) => (
                PageKind::Interior,
                interior.cells.len(),
                encode_cells(&interior.cells, &mut buf)?,
                interior.right_child,
            ),
        };

        let header = PageHeader {
            kind,
            num_cells: u8::try_from(num_cells).map_err(|_| PageError::Overflow {
                needed: PAGE_HEADER_SIZE + CELL_OFFSET_SIZE * num_cells + extent,
            })?,
            start_of_cell_pointers: extent as u16,
            next_page_pointer,
        };
        buf[..PAGE_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        Ok(buf)
    }

    /// Parse the page stored at slot `number`.
    pub fn decode(number: PageNumber, bytes: &[u8; PAGE_SIZE]) -> Result<Self, PageError> {
        let mut header_bytes = [0u8; PAGE_HEADER_SIZE];
        header_bytes.copy_from_slice(&bytes[..PAGE_HEADER_SIZE]);
        let header = PageHeader::from_bytes(header_bytes)?;

        let body = match header.kind {
            PageKind::Leaf => {
                // Page 0 as a sibling means "none".
                if number != ROOT_PAGE && header.next_page_pointer == number {
                    return Err(PageError::LinksToItself);
                }
                PageBody::Leaf(TableLeafPage {
                    cells: decode_cells(bytes, &header)?,
                    next_sibling: header.next_page_pointer,
                })
            }
            PageKind::Interior => {
                let cells: Vec<TableInteriorCell> = decode_cells(bytes, &header)?;
                let children: Vec<PageNumber> = cells
                    .iter()
                    .map(TableInteriorCell::left_child)
                    .chain([header.next_page_pointer])
                    .collect();
                if children.contains(&ROOT_PAGE) {
                    return Err(PageError::ChildIsRoot);
                }
                if children.contains(&number) {
                    return Err(PageError::LinksToItself);
                }
                PageBody::Interior(TableInteriorPage {
                    cells,
                    right_child: header.next_page_pointer,
                })
            }
        };
        Ok(Self { number, body })
    }
}

/// What page placement needs to know about a cell.
trait Placed: Sized {
    fn key(&self) -> RowId;
    fn placed_at(&self) -> Option<u16>;
    fn place_at(&mut self, offset: Option<u16>);
    fn byte_len(&self) -> usize;
    fn write(&self, buf: &mut Vec<u8>);
    fn read(bytes: &[u8]) -> Result<Self, CellError>;
}

impl Placed for TableLeafCell {
    fn key(&self) -> RowId {
        self.row_id()
    }
    fn placed_at(&self) -> Option<u16> {
        self.offset()
    }
    fn place_at(&mut self, offset: Option<u16>) {
        self.set_offset(offset);
    }
    fn byte_len(&self) -> usize {
        self.size()
    }
    fn write(&self, buf: &mut Vec<u8>) {
        self.encode_into(buf);
    }
    fn read(bytes: &[u8]) -> Result<Self, CellError> {
        Self::decode(bytes)
    }
}

impl Placed for TableInteriorCell {
    fn key(&self) -> RowId {
        self.row_id()
    }
    fn placed_at(&self) -> Option<u16> {
        self.offset()
    }
    fn place_at(&mut self, offset: Option<u16>) {
        self.set_offset(offset);
    }
    fn byte_len(&self) -> usize {
        self.size()
    }
    fn write(&self, buf: &mut Vec<u8>) {
        self.encode_into(buf);
    }
    fn read(bytes: &[u8]) -> Result<Self, CellError> {
        Self::decode(bytes)
    }
}

/// Whether `num_cells` offsets and a cell area of `extent` bytes fit in a page.
const fn fits(num_cells: usize, extent: usize) -> bool {
    PAGE_HEADER_SIZE + CELL_OFFSET_SIZE * num_cells + extent <= PAGE_SIZE
}

/// Distance from the end of the page to the far end of the furthest cell.
fn cell_extent<C: Placed>(cells: &[C]) -> usize {
    cells
        .iter()
        .filter_map(|cell| {
            cell.placed_at()
                .map(|offset| usize::from(offset) + cell.byte_len())
        })
        .max()
        .unwrap_or(0)
}

fn free_cell_location<C: Placed>(cells: &[C], size: usize, best_fit: bool) -> usize {
    let mut taken: Vec<(usize, usize)> = cells
        .iter()
        .filter_map(|cell| {
            cell.placed_at()
                .map(|offset| (usize::from(offset), cell.byte_len()))
        })
        .collect();
    taken.sort_unstable();

    let mut cursor = 0;
    // (leftover, offset) of the tightest gap seen so far
    let mut best: Option<(usize, usize)> = None;
    for (offset, len) in taken {
        if offset >= cursor + size {
            if !best_fit {
                return cursor;
            }
            let leftover = offset - cursor - size;
            if best.is_none_or(|(best_leftover, _)| leftover < best_leftover) {
                best = Some((leftover, cursor));
            }
        }
        cursor = cursor.max(offset + len);
    }
    best.map_or(cursor, |(_, offset)| offset)
}

/// Repack cells back to back in row-id order, starting at the end of the page.
fn compact<C: Placed>(cells: &mut [C]) {
    let mut offset = 0;
    for cell in cells {
        cell.place_at(Some(offset as u16));
        offset += cell.byte_len();
    }
}

/// Choose an offset for `cell`, which is about to join `cells`. If reusing a
/// gap or appending would run into the offset array, the existing cells are
/// compacted first.
fn place<C: Placed>(cells: &mut [C], cell: &mut C, best_fit: bool) -> Result<(), PageError> {
    let size = cell.byte_len();
    let num_cells = cells.len() + 1;

    let mut offset = free_cell_location(cells, size, best_fit);
    if !fits(num_cells, cell_extent(cells).max(offset + size)) {
        compact(cells);
        offset = cell_extent(cells);
        if !fits(num_cells, offset + size) {
            return Err(PageError::Overflow {
                needed: PAGE_HEADER_SIZE + CELL_OFFSET_SIZE * num_cells + offset + size,
            });
        }
    }
    cell.place_at(Some(offset as u16));
    Ok(())
}

/// Write the offset array and the reversed cell area into `page`, returning
/// the length of the cell area.
fn encode_cells<C: Placed>(cells: &[C], page: &mut [u8; PAGE_SIZE]) -> Result<usize, PageError> {
    let extent = cell_extent(cells);
    if !fits(cells.len(), extent) {
        return Err(PageError::Overflow {
            needed: PAGE_HEADER_SIZE + CELL_OFFSET_SIZE * cells.len() + extent,
        });
    }

    let mut tail = vec![0u8; extent];
    let mut scratch = Vec::new();
    for (index, cell) in cells.iter().enumerate() {
        let offset = cell
            .placed_at()
            .ok_or(PageError::UnplacedCell { index })?;
        let start = usize::from(offset);

        scratch.clear();
        cell.write(&mut scratch);
        tail[start..start + scratch.len()].copy_from_slice(&scratch);

        let at = PAGE_HEADER_SIZE + CELL_OFFSET_SIZE * index;
        page[at..at + CELL_OFFSET_SIZE].copy_from_slice(&offset.to_be_bytes());
    }

    tail.reverse();
    page[PAGE_SIZE - extent..].copy_from_slice(&tail);
    Ok(extent)
}

fn decode_cells<C: Placed>(
    page: &[u8; PAGE_SIZE],
    header: &PageHeader,
) -> Result<Vec<C>, PageError> {
    let num_cells = usize::from(header.num_cells);
    let extent = usize::from(header.start_of_cell_pointers);
    if !fits(num_cells, extent) {
        return Err(PageError::Overflow {
            needed: PAGE_HEADER_SIZE + CELL_OFFSET_SIZE * num_cells + extent,
        });
    }

    let mut tail = page[PAGE_SIZE - extent..].to_vec();
    tail.reverse();

    let mut cells: Vec<C> = Vec::with_capacity(num_cells);
    let mut end = 0;
    for index in 0..num_cells {
        let at = PAGE_HEADER_SIZE + CELL_OFFSET_SIZE * index;
        let offset = u16::from_be_bytes([page[at], page[at + 1]]);
        let start = usize::from(offset);
        if start >= extent {
            return Err(PageError::CellOutOfBounds { index, offset });
        }

        let mut cell = C::read(&tail[start..]).map_err(|source| PageError::Cell { index, source })?;
        if cells.last().is_some_and(|prev| prev.key() >= cell.key()) {
            return Err(PageError::CellsOutOfOrder { index });
        }
        cell.place_at(Some(offset));
        end = end.max(start + cell.byte_len());
        cells.push(cell);
    }

    if end != extent {
        return Err(PageError::LengthMismatch {
            expected: extent,
            actual: end,
        });
    }
    Ok(cells)
}

/// Errors related to page operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// Invalid page type byte. A zero byte marks an unused page slot.
    InvalidPageType(u8),
    /// A cell offset points past the cell area.
    CellOutOfBounds { index: usize, offset: u16 },
    /// The cells do not end where the header says the cell area ends.
    LengthMismatch { expected: usize, actual: usize },
    /// Cells are not in strictly ascending row-id order.
    CellsOutOfOrder { index: usize },
    /// A cell could not be decoded.
    Cell { index: usize, source: CellError },
    /// An interior page points back at the root.
    ChildIsRoot,
    /// A page names itself as its sibling or child.
    LinksToItself,
    /// Header, offsets and cells need more than a page.
    Overflow { needed: usize },
    /// A cell without an assigned offset.
    UnplacedCell { index: usize },
    /// The page already holds its maximum number of cells.
    PageFull { cells: usize },
    /// The row id is already present.
    DuplicateRowId(RowId),
    /// A cell inserted into a page of the other kind.
    WrongCellKind { page: PageKind, cell: CellKind },
    /// A child slot past the end of an interior page.
    NoSuchSlot { index: usize, cells: usize },
    /// Child pointers only exist on interior pages.
    NotInterior,
    /// Splitting an interior page with no cells.
    SplitEmptyPage,
}

impl std::fmt::Display for PageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPageType(v) => write!(f, "invalid page type: 0x{v:02x}"),
            Self::CellOutOfBounds { index, offset } => {
                write!(f, "cell {index} offset {offset} is outside the cell area")
            }
            Self::LengthMismatch { expected, actual } => write!(
                f,
                "cell area is {expected} bytes but cells end at {actual}"
            ),
            Self::CellsOutOfOrder { index } => write!(f, "cell {index} is out of order"),
            Self::Cell { index, source } => write!(f, "cell {index}: {source}"),
            Self::ChildIsRoot => write!(f, "interior page points at the root page"),
            Self::LinksToItself => write!(f, "page links to itself"),
            Self::Overflow { needed } => {
                write!(f, "page needs {needed} bytes (max {PAGE_SIZE})")
            }
            Self::UnplacedCell { index } => write!(f, "cell {index} has no offset"),
            Self::PageFull { cells } => write!(f, "page is full ({cells} cells)"),
            Self::DuplicateRowId(row_id) => write!(f, "duplicate row id {row_id}"),
            Self::WrongCellKind { page, cell } => {
                write!(f, "cannot insert {cell:?} cell into {page:?} page")
            }
            Self::NoSuchSlot { index, cells } => {
                write!(f, "child slot {index} out of range ({cells} cells)")
            }
            Self::NotInterior => write!(f, "leaf pages have no child pointers"),
            Self::SplitEmptyPage => write!(f, "cannot split an empty interior page"),
        }
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cell { source, .. } => Some(source),
            _ => None,
        }
    }
}
