use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::storage::{DataType, TableFile, TableTree};

/// A table in its own temporary data directory.
///
/// The directory, and the table file in it, are removed when the helper is
/// dropped.
pub struct TestTable {
    pub tree: TableTree,
    path: PathBuf,
    _dir: TempDir,
}

impl TestTable {
    /// Create an empty user table with the given columns.
    #[allow(clippy::expect_used)]
    pub fn new(columns: &[DataType]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = TableFile::resolve_path(dir.path(), "test", false);
        let tree = TableTree::create(&path, columns).expect("create table");
        Self {
            tree,
            path,
            _dir: dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
