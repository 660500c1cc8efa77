// Storage for relational tables:
// 1. A row comes in as column types + values
// 2. It is encoded as a record and wrapped in a leaf cell keyed by row id
// 3. The table tree descends from the root page, splitting full pages on
//    the way down, and writes the cell into its leaf
//
// System components:
//  - Records and cells (byte encodings)
//  - Pages (fixed-size blocks of cells)
//  - Table tree (B+Tree over one file)

pub mod config;
pub mod storage;

#[cfg(test)]
mod testing;
