//! Table file I/O.
//!
//! A table file is a plain array of pages: page `k` occupies bytes
//! `[k * PAGE_SIZE, (k + 1) * PAGE_SIZE)`. A page slot whose type byte is
//! zero is unused and may be handed out again.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::storage::page::{PAGE_SIZE, PAGE_SIZE_U64, PageNumber, ROOT_PAGE};

/// Directory holding system tables, under the data directory.
pub const CATALOG_DIRECTORY: &str = "catalog";

/// Directory holding user tables, under the data directory.
pub const USER_DATA_DIRECTORY: &str = "user_data";

/// File extension of table files.
pub const TABLE_EXTENSION: &str = "tbl";

/// A table file handle with page-granular I/O.
#[derive(Debug)]
pub struct TableFile {
    file: File,
    path: PathBuf,
    page_count: PageNumber,
    /// Lowest slot that may still be unused. Pages are never released while
    /// the file is open, so slots below it stay in use.
    scan_from: PageNumber,
}

impl TableFile {
    /// Location of a table's file inside the data directory.
    #[must_use]
    pub fn resolve_path(data_directory: &Path, table_name: &str, is_catalog: bool) -> PathBuf {
        let directory = if is_catalog {
            CATALOG_DIRECTORY
        } else {
            USER_DATA_DIRECTORY
        };
        data_directory
            .join(directory)
            .join(format!("{table_name}.{TABLE_EXTENSION}"))
    }

    #[must_use]
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Create a new file of `initial_pages` zeroed pages, creating missing
    /// parent directories.
    ///
    /// Returns an error if the file already exists.
    pub fn create(path: &Path, initial_pages: PageNumber) -> Result<Self, FileError> {
        if path.exists() {
            return Err(FileError::AlreadyExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(FileError::Io)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(FileError::Io)?;
        file.set_len(u64::from(initial_pages) * PAGE_SIZE_U64)
            .map_err(FileError::Io)?;

        tracing::debug!("Created {} with {initial_pages} pages", path.display());

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_count: initial_pages,
            scan_from: ROOT_PAGE + 1,
        })
    }

    /// Open an existing file for reading and writing.
    pub fn open(path: &Path) -> Result<Self, FileError> {
        if !path.exists() {
            return Err(FileError::NotFound(path.to_path_buf()));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(FileError::Io)?;

        let len = file.metadata().map_err(FileError::Io)?.len();
        if len % PAGE_SIZE_U64 != 0 {
            return Err(FileError::Misaligned { len });
        }
        let page_count =
            PageNumber::try_from(len / PAGE_SIZE_U64).map_err(|_| FileError::Misaligned { len })?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            page_count,
            scan_from: ROOT_PAGE + 1,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of page slots in the file.
    #[must_use]
    pub const fn page_count(&self) -> PageNumber {
        self.page_count
    }

    /// Read a page from the file.
    pub fn read_page(
        &mut self,
        page_number: PageNumber,
    ) -> Result<Box<[u8; PAGE_SIZE]>, FileError> {
        self.check_bounds(page_number)?;

        let mut buf = Box::new([0u8; PAGE_SIZE]);
        self.file
            .seek(SeekFrom::Start(Self::page_offset(page_number)))
            .map_err(FileError::Io)?;
        self.file
            .read_exact(buf.as_mut_slice())
            .map_err(FileError::Io)?;

        Ok(buf)
    }

    /// Read only the type byte of a page.
    pub fn read_page_type(&mut self, page_number: PageNumber) -> Result<u8, FileError> {
        self.check_bounds(page_number)?;

        let mut byte = [0u8; 1];
        self.file
            .seek(SeekFrom::Start(Self::page_offset(page_number)))
            .map_err(FileError::Io)?;
        self.file.read_exact(&mut byte).map_err(FileError::Io)?;

        Ok(byte[0])
    }

    /// Write a page to the file, growing the file if the page lies past its
    /// end.
    pub fn write_page(
        &mut self,
        page_number: PageNumber,
        page: &[u8; PAGE_SIZE],
    ) -> Result<(), FileError> {
        self.file
            .seek(SeekFrom::Start(Self::page_offset(page_number)))
            .map_err(FileError::Io)?;
        self.file.write_all(page).map_err(FileError::Io)?;

        if page_number >= self.page_count {
            self.page_count = page_number + 1;
        }
        Ok(())
    }

    /// Pick a slot for a new page: the first unused slot after the root, or
    /// a zeroed page appended to the file.
    ///
    /// The slot stays unused until written, so callers write each allocated
    /// page before allocating the next.
    pub fn allocate_page(&mut self) -> Result<PageNumber, FileError> {
        let mut page_number = self.scan_from;
        while page_number < self.page_count {
            if self.read_page_type(page_number)? == 0 {
                self.scan_from = page_number;
                tracing::debug!("Reusing page {page_number}");
                return Ok(page_number);
            }
            page_number += 1;
        }

        let new_count = self
            .page_count
            .checked_add(1)
            .ok_or(FileError::TooManyPages)?;
        self.file
            .set_len(u64::from(new_count) * PAGE_SIZE_U64)
            .map_err(FileError::Io)?;
        self.page_count = new_count;
        self.scan_from = page_number;

        tracing::debug!("Appended page {page_number}");
        Ok(page_number)
    }

    /// Sync all data to disk.
    pub fn sync(&mut self) -> Result<(), FileError> {
        self.file.sync_all().map_err(FileError::Io)
    }

    fn check_bounds(&self, page_number: PageNumber) -> Result<(), FileError> {
        if page_number >= self.page_count {
            return Err(FileError::PageOutOfBounds {
                page_number,
                page_count: self.page_count,
            });
        }
        Ok(())
    }

    fn page_offset(page_number: PageNumber) -> u64 {
        u64::from(page_number) * PAGE_SIZE_U64
    }
}

/// Errors that can occur during file operations.
#[derive(Debug)]
pub enum FileError {
    /// I/O error.
    Io(std::io::Error),
    /// File already exists.
    AlreadyExists(PathBuf),
    /// File does not exist.
    NotFound(PathBuf),
    /// File length is not a whole number of pages.
    Misaligned { len: u64 },
    /// Page number is beyond the end of the file.
    PageOutOfBounds {
        page_number: PageNumber,
        page_count: PageNumber,
    },
    /// No page numbers left.
    TooManyPages,
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::AlreadyExists(path) => write!(f, "file already exists: {}", path.display()),
            Self::NotFound(path) => write!(f, "file not found: {}", path.display()),
            Self::Misaligned { len } => {
                write!(f, "file length {len} is not a multiple of {PAGE_SIZE}")
            }
            Self::PageOutOfBounds {
                page_number,
                page_count,
            } => write!(f, "page {page_number} out of bounds ({page_count} pages)"),
            Self::TooManyPages => write!(f, "file has no page numbers left"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
