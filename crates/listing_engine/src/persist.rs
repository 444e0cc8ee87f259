use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use listing_core::{ChangeSet, ListingBook, ListingId, ListingRecord};
use listing_logging::{listing_info, listing_warn};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const RECORDS_FILENAME: &str = "data.json";
pub const EXCLUSIONS_FILENAME: &str = "excludedLinks.txt";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed listing data: {0}")]
    Json(#[from] serde_json::Error),
}

/// The two durable documents: the record map and the exclusion list.
///
/// Both are replaced whole on every write, through a temp file in the same
/// directory and a rename, so a crash never leaves a truncated document.
#[derive(Debug, Clone)]
pub struct ListingFiles {
    dir: PathBuf,
}

impl ListingFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILENAME)
    }

    pub fn exclusions_path(&self) -> PathBuf {
        self.dir.join(EXCLUSIONS_FILENAME)
    }

    /// Loads both documents for reading. A missing file is an empty collection.
    pub fn load(&self) -> Result<ListingBook, PersistError> {
        self.load_reconciled().map(|(book, _)| book)
    }

    /// Loads both documents for a session that will write them back.
    ///
    /// The change set is non-empty when stored records had to be dropped
    /// because their id is also excluded; the caller's flusher must observe
    /// it so the record document is rewritten. A record file that exists but
    /// cannot be parsed is an error: starting empty would overwrite it.
    pub fn load_reconciled(&self) -> Result<(ListingBook, ChangeSet), PersistError> {
        let excluded: Vec<ListingId> = match read_optional(&self.exclusions_path())? {
            Some(text) => text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToOwned::to_owned)
                .collect(),
            None => {
                listing_info!("Excluded links not found at {:?}", self.exclusions_path());
                Vec::new()
            }
        };

        let records: BTreeMap<ListingId, ListingRecord> =
            match read_optional(&self.records_path())? {
                Some(text) if text.trim().is_empty() => BTreeMap::new(),
                Some(text) => serde_json::from_str(&text)?,
                None => {
                    listing_info!("Listing data not found at {:?}", self.records_path());
                    BTreeMap::new()
                }
            };

        let stored = records.len();
        let (book, change) = ListingBook::from_parts(records, excluded);
        if change.records {
            listing_warn!(
                "Dropped {} stored listings that are also excluded",
                stored - book.store().len()
            );
        }
        listing_info!(
            "Loaded {} listings and {} exclusions from {:?}",
            book.store().len(),
            book.exclusions().len(),
            self.dir
        );
        Ok((book, change))
    }

    /// Pretty-printed record map, keyed by listing id.
    pub fn records_document(book: &ListingBook) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(book.store().as_map())?)
    }

    /// Newline-delimited exclusion list.
    pub fn exclusions_document(book: &ListingBook) -> String {
        book.exclusions()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn write_records(&self, document: &str) -> Result<PathBuf, PersistError> {
        self.replace(RECORDS_FILENAME, document)
    }

    pub fn write_exclusions(&self, document: &str) -> Result<PathBuf, PersistError> {
        self.replace(EXCLUSIONS_FILENAME, document)
    }

    fn replace(&self, filename: &str, document: &str) -> Result<PathBuf, PersistError> {
        match fs::metadata(&self.dir) {
            Ok(meta) if !meta.is_dir() => {
                return Err(PersistError::OutputDir(format!(
                    "{} is not a directory",
                    self.dir.display()
                )))
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => fs::create_dir_all(&self.dir)
                .map_err(|err| PersistError::OutputDir(err.to_string()))?,
            Err(err) => return Err(PersistError::OutputDir(err.to_string())),
        }

        let target = self.dir.join(filename);
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(document.as_bytes())?;
        staged.as_file_mut().sync_all()?;
        staged
            .persist(&target)
            .map_err(|err| PersistError::Io(err.error))?;
        Ok(target)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, PersistError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
