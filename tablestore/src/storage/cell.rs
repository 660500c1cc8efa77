//! Cells: the units stored inside a table page.
//!
//! Leaf cell layout:
//! - `payload_len`: 2 bytes
//! - `row_id`: 4 bytes
//! - payload: an encoded [`DataRecord`]
//!
//! Interior cell layout:
//! - `left_child`: 4 bytes (page number)
//! - `row_id`: 4 bytes (separator key)
//!
//! All fields are big-endian.

#![allow(clippy::cast_possible_truncation)]

use std::cmp::Ordering;

use crate::storage::page::{PageNumber, RowId};
use crate::storage::record::{DataRecord, RecordError};

/// Bytes in front of a leaf cell's payload.
pub const LEAF_CELL_HEADER_SIZE: usize = 6;

/// Size of an interior cell.
pub const INTERIOR_CELL_SIZE: usize = 8;

/// A row stored in a leaf page.
#[derive(Debug, Clone)]
pub struct TableLeafCell {
    row_id: RowId,
    record: DataRecord,
    /// Position of the cell in the page's cell area, counted from the end of
    /// the page. `None` until the cell is placed in a page.
    offset: Option<u16>,
}

impl TableLeafCell {
    #[must_use]
    pub const fn new(row_id: RowId, record: DataRecord) -> Self {
        Self {
            row_id,
            record,
            offset: None,
        }
    }

    #[must_use]
    pub const fn row_id(&self) -> RowId {
        self.row_id
    }

    #[must_use]
    pub const fn record(&self) -> &DataRecord {
        &self.record
    }

    #[must_use]
    pub fn into_record(self) -> DataRecord {
        self.record
    }

    #[must_use]
    pub const fn offset(&self) -> Option<u16> {
        self.offset
    }

    pub(crate) const fn set_offset(&mut self, offset: Option<u16>) {
        self.offset = offset;
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        LEAF_CELL_HEADER_SIZE + self.record.size()
    }

    /// Order by row id.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.row_id.cmp(&other.row_id)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.record.size() as u16).to_be_bytes());
        buf.extend_from_slice(&self.row_id.to_be_bytes());
        self.record.encode_into(buf);
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode a leaf cell from the start of `bytes`.
    ///
    /// The cell describes its own length; bytes past it are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, CellError> {
        if bytes.len() < LEAF_CELL_HEADER_SIZE {
            return Err(CellError::Truncated {
                needed: LEAF_CELL_HEADER_SIZE,
                available: bytes.len(),
            });
        }
        let payload_len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
        let row_id = RowId::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);

        let end = LEAF_CELL_HEADER_SIZE + payload_len;
        if bytes.len() < end {
            return Err(CellError::Truncated {
                needed: end,
                available: bytes.len(),
            });
        }
        let record = DataRecord::decode(&bytes[LEAF_CELL_HEADER_SIZE..end])?;

        Ok(Self::new(row_id, record))
    }
}

impl PartialEq for TableLeafCell {
    fn eq(&self, other: &Self) -> bool {
        self.row_id == other.row_id && self.record == other.record
    }
}

impl Eq for TableLeafCell {}

/// A separator in an interior page.
///
/// Every row id reachable through `left_child` is at most `row_id`.
#[derive(Debug, Clone, Copy)]
pub struct TableInteriorCell {
    row_id: RowId,
    left_child: PageNumber,
    offset: Option<u16>,
}

impl TableInteriorCell {
    #[must_use]
    pub const fn new(row_id: RowId, left_child: PageNumber) -> Self {
        Self {
            row_id,
            left_child,
            offset: None,
        }
    }

    #[must_use]
    pub const fn row_id(&self) -> RowId {
        self.row_id
    }

    #[must_use]
    pub const fn left_child(&self) -> PageNumber {
        self.left_child
    }

    pub(crate) const fn set_left_child(&mut self, left_child: PageNumber) {
        self.left_child = left_child;
    }

    #[must_use]
    pub const fn offset(&self) -> Option<u16> {
        self.offset
    }

    pub(crate) const fn set_offset(&mut self, offset: Option<u16>) {
        self.offset = offset;
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        INTERIOR_CELL_SIZE
    }

    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.row_id.cmp(&other.row_id)
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.left_child.to_be_bytes());
        buf.extend_from_slice(&self.row_id.to_be_bytes());
    }

    #[must_use]
    pub fn encode(&self) -> [u8; INTERIOR_CELL_SIZE] {
        let mut buf = [0u8; INTERIOR_CELL_SIZE];
        buf[..4].copy_from_slice(&self.left_child.to_be_bytes());
        buf[4..].copy_from_slice(&self.row_id.to_be_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CellError> {
        if bytes.len() < INTERIOR_CELL_SIZE {
            return Err(CellError::Truncated {
                needed: INTERIOR_CELL_SIZE,
                available: bytes.len(),
            });
        }
        let left_child = PageNumber::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let row_id = RowId::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Ok(Self::new(row_id, left_child))
    }
}

impl PartialEq for TableInteriorCell {
    fn eq(&self, other: &Self) -> bool {
        self.row_id == other.row_id && self.left_child == other.left_child
    }
}

impl Eq for TableInteriorCell {}

/// Which family a cell belongs to, matching the page that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Leaf,
    Interior,
}

/// Either kind of cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataCell {
    Leaf(TableLeafCell),
    Interior(TableInteriorCell),
}

impl DataCell {
    /// Decode a cell of the given kind from the start of `bytes`.
    pub fn decode(kind: CellKind, bytes: &[u8]) -> Result<Self, CellError> {
        match kind {
            CellKind::Leaf => TableLeafCell::decode(bytes).map(Self::Leaf),
            CellKind::Interior => TableInteriorCell::decode(bytes).map(Self::Interior),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CellKind {
        match self {
            Self::Leaf(_) => CellKind::Leaf,
            Self::Interior(_) => CellKind::Interior,
        }
    }

    #[must_use]
    pub const fn row_id(&self) -> RowId {
        match self {
            Self::Leaf(cell) => cell.row_id(),
            Self::Interior(cell) => cell.row_id(),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> Option<u16> {
        match self {
            Self::Leaf(cell) => cell.offset(),
            Self::Interior(cell) => cell.offset(),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Leaf(cell) => cell.size(),
            Self::Interior(cell) => cell.size(),
        }
    }

    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        self.row_id().cmp(&other.row_id())
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Leaf(cell) => cell.encode_into(buf),
            Self::Interior(cell) => cell.encode_into(buf),
        }
    }
}

/// Errors produced while decoding a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellError {
    /// Fewer bytes than the cell claims to occupy.
    Truncated { needed: usize, available: usize },
    /// The payload is not a valid record.
    Record(RecordError),
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Truncated { needed, available } => {
                write!(f, "cell truncated: need {needed} bytes, have {available}")
            }
            Self::Record(e) => write!(f, "invalid cell payload: {e}"),
        }
    }
}

impl std::error::Error for CellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Record(e) => Some(e),
            Self::Truncated { .. } => None,
        }
    }
}

impl From<RecordError> for CellError {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}
