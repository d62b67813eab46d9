//! File catalog: ordered records of name, creation date, and chain head
//!
//! The catalog owns no blocks, only the index of each file's first block.
//! Insertion order is the display order; removal shifts later records up
//! so that order survives deletion.

use crate::arena::BlockIndex;
use crate::error::{DiskError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One live file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    name: String,
    created: NaiveDate,
    head: Option<BlockIndex>,
}

impl FileRecord {
    pub(crate) fn new(name: &str, created: NaiveDate) -> Self {
        FileRecord {
            name: name.to_string(),
            created,
            head: None,
        }
    }

    /// External key: unique among live files at any given time
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created(&self) -> NaiveDate {
        self.created
    }

    /// First block of the file's chain
    ///
    /// `None` only while the record is under construction; a registered
    /// file always has at least one block.
    pub fn head(&self) -> Option<BlockIndex> {
        self.head
    }

    pub(crate) fn set_head(&mut self, head: Option<BlockIndex>) {
        self.head = head;
    }
}

/// Ordered sequence of file records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCatalog {
    records: Vec<FileRecord>,
}

impl FileCatalog {
    pub fn new() -> Self {
        FileCatalog::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&FileRecord> {
        self.records.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter()
    }

    /// Linear scan by name
    pub fn find_by_name(&self, name: &str) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|r| r.name == name)
    }

    /// Append a fully built record, returning its position
    pub(crate) fn push(&mut self, record: FileRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// Remove the record at `position`, shifting later records up
    ///
    /// Order-preserving by design; the positions shown to a user stay
    /// stable for every file before the removed one.
    pub(crate) fn remove_at(&mut self, position: usize) -> Result<FileRecord> {
        if position >= self.records.len() {
            return Err(DiskError::InvalidSelection {
                index: position,
                file_count: self.records.len(),
            });
        }
        Ok(self.records.remove(position))
    }

    /// Redirect every head that pointed at `i` to `j` and vice versa
    ///
    /// The catalog half of a global block swap.
    pub(crate) fn rewrite_heads(&mut self, i: BlockIndex, j: BlockIndex) {
        for record in &mut self.records {
            match record.head {
                Some(h) if h == i => record.head = Some(j),
                Some(h) if h == j => record.head = Some(i),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn record(name: &str, head: usize) -> FileRecord {
        let mut r = FileRecord::new(name, date());
        r.set_head(Some(BlockIndex::new(head)));
        r
    }

    #[test]
    fn test_push_preserves_insertion_order() {
        let mut catalog = FileCatalog::new();
        catalog.push(record("a", 0));
        catalog.push(record("b", 1));
        catalog.push(record("c", 2));

        let names: Vec<&str> = catalog.iter().map(FileRecord::name).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_remove_at_shifts_later_records() {
        let mut catalog = FileCatalog::new();
        catalog.push(record("a", 0));
        catalog.push(record("b", 1));
        catalog.push(record("c", 2));

        let removed = catalog.remove_at(1).unwrap();
        assert_eq!(removed.name(), "b");

        let names: Vec<&str> = catalog.iter().map(FileRecord::name).collect();
        assert_eq!(names, ["a", "c"]);
    }

    #[test]
    fn test_remove_at_out_of_bounds() {
        let mut catalog = FileCatalog::new();
        catalog.push(record("a", 0));

        let err = catalog.remove_at(3).unwrap_err();
        assert!(matches!(
            err,
            DiskError::InvalidSelection {
                index: 3,
                file_count: 1
            }
        ));
    }

    #[test]
    fn test_find_by_name() {
        let mut catalog = FileCatalog::new();
        catalog.push(record("notes.md", 4));

        assert_eq!(
            catalog.find_by_name("notes.md").map(FileRecord::head),
            Some(Some(BlockIndex::new(4)))
        );
        assert!(catalog.find_by_name("missing").is_none());
        assert_eq!(catalog.position_of("notes.md"), Some(0));
    }

    #[test]
    fn test_rewrite_heads_swaps_both_directions() {
        let mut catalog = FileCatalog::new();
        catalog.push(record("a", 2));
        catalog.push(record("b", 7));
        catalog.push(record("c", 9));

        catalog.rewrite_heads(BlockIndex::new(2), BlockIndex::new(7));

        let heads: Vec<usize> = catalog
            .iter()
            .filter_map(|r| r.head().map(BlockIndex::get))
            .collect();
        assert_eq!(heads, [7, 2, 9]);
    }
}
