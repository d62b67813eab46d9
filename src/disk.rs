//! The disk aggregate: one arena plus one catalog
//!
//! All state-mutating entry points live here. Files are laid out as linked
//! chains of blocks: the catalog holds the head index, each block links to
//! the next fragment of the same file. A [`Disk`] is a plain value; tests
//! and hosts can hold as many as they like.

use crate::arena::{BlockArena, BlockIndex};
use crate::catalog::{FileCatalog, FileRecord};
use crate::error::{DiskError, Result};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Demo arena size (a 5x10 grid when rendered)
pub const DEFAULT_CAPACITY: usize = 50;

/// Occupancy summary for display
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiskStats {
    pub capacity: usize,
    pub free_blocks: usize,
    pub occupied_blocks: usize,
    pub file_count: usize,
    /// Share of chain links that jump to a non-adjacent block
    pub fragmentation: f64,
}

/// Simulated block storage: fixed arena, flat file catalog
///
/// Single-threaded by design. Every operation takes `&mut self` and runs
/// to completion; a multi-threaded host must serialize all calls (one
/// mutex around the whole disk), since the pointer-rewrite pass of a block
/// swap is not atomic against concurrent creation or deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    arena: BlockArena,
    catalog: FileCatalog,
}

impl Disk {
    /// Create a disk with every block free
    pub fn new(capacity: usize) -> Self {
        Disk {
            arena: BlockArena::new(capacity),
            catalog: FileCatalog::new(),
        }
    }

    pub fn arena(&self) -> &BlockArena {
        &self.arena
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    pub fn stats(&self) -> DiskStats {
        DiskStats {
            capacity: self.arena.capacity(),
            free_blocks: self.arena.free_blocks(),
            occupied_blocks: self.arena.occupied_blocks(),
            file_count: self.catalog.len(),
            fragmentation: self.arena.fragmentation_score(),
        }
    }

    /// JSON snapshot of the full disk state
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Create a file spanning `block_count` first-fit blocks
    ///
    /// Claims free blocks in linear order, linking each to the one claimed
    /// before it; the first claimed block becomes the record's head.
    ///
    /// Fails with [`DiskError::DiskFull`] when the arena runs out before
    /// `block_count` blocks are claimed. Blocks already claimed by the
    /// failed call are **not** released: the record is never registered,
    /// so they stay occupied and unreachable until the disk is rebuilt.
    /// The exhaustion test pins this down.
    pub fn create_file(
        &mut self,
        name: &str,
        created: NaiveDate,
        block_count: usize,
    ) -> Result<FileRecord> {
        if block_count == 0 {
            return Err(DiskError::EmptyFile);
        }

        let mut record = FileRecord::new(name, created);
        let mut prev: Option<BlockIndex> = None;

        for _ in 0..block_count {
            let target = self.arena.find_first_free().ok_or(DiskError::DiskFull)?;
            self.arena.claim(target, name);

            match prev {
                Some(p) => self.arena.link(p, target),
                None => record.set_head(Some(target)),
            }
            prev = Some(target);
        }

        self.catalog.push(record.clone());
        tracing::debug!(name, blocks = block_count, head = ?record.head(), "created file");
        Ok(record)
    }

    /// Delete the file at catalog position `selection`
    ///
    /// Walks the chain from its head releasing every block, then removes
    /// the record order-preservingly. Fails with
    /// [`DiskError::InvalidSelection`] when the position is out of bounds;
    /// the arena is untouched in that case.
    pub fn delete_file(&mut self, selection: usize) -> Result<FileRecord> {
        let chain = self.chain(selection)?;
        for index in &chain {
            self.arena.release(*index);
        }

        let record = self.catalog.remove_at(selection)?;
        tracing::debug!(name = record.name(), blocks = chain.len(), "deleted file");
        Ok(record)
    }

    /// Delete a file by name
    ///
    /// Fails with [`DiskError::NotFound`] when no live file has that name.
    pub fn delete_file_by_name(&mut self, name: &str) -> Result<FileRecord> {
        let position = self
            .catalog
            .position_of(name)
            .ok_or_else(|| DiskError::NotFound(name.to_string()))?;
        self.delete_file(position)
    }

    /// Seed the disk with randomly placed files
    ///
    /// Each file gets a generated name (`file1`, `file2`, ...), a random
    /// creation date between 2000 and 2024, and a chain length drawn from
    /// `size_range`. Blocks are placed by uniform sampling among free
    /// slots, producing the scattered layout a defragmentation demo wants.
    pub fn populate_random(
        &mut self,
        file_count: usize,
        size_range: RangeInclusive<usize>,
        rng: &mut impl Rng,
    ) -> Result<()> {
        for n in 1..=file_count {
            let name = format!("file{n}");
            let created = NaiveDate::from_ymd_opt(
                rng.gen_range(2000..=2024),
                rng.gen_range(1..=12),
                rng.gen_range(1..=28),
            )
            .unwrap_or_default();
            let block_count = rng.gen_range(size_range.clone()).max(1);

            let mut record = FileRecord::new(&name, created);
            let mut prev: Option<BlockIndex> = None;

            for _ in 0..block_count {
                let target = self.arena.find_random_free(rng).ok_or(DiskError::DiskFull)?;
                self.arena.claim(target, &name);

                match prev {
                    Some(p) => self.arena.link(p, target),
                    None => record.set_head(Some(target)),
                }
                prev = Some(target);
            }

            self.catalog.push(record);
        }

        tracing::info!(
            files = file_count,
            free = self.arena.free_blocks(),
            "populated disk"
        );
        Ok(())
    }

    /// Exchange two blocks and repair every reference to either
    ///
    /// Swaps the slot contents, then rewrites each block link and each
    /// catalog head that pointed at `i` or `j` so it points at the other
    /// index. The one operation that maintains referential integrity
    /// across non-local state; O(capacity + file count).
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range: a swap target outside the
    /// arena means an invariant was already broken upstream.
    pub fn swap_blocks(&mut self, i: BlockIndex, j: BlockIndex) {
        let capacity = self.arena.capacity();
        assert!(
            i.get() < capacity && j.get() < capacity,
            "swap target out of range: {i}, {j} (capacity {capacity})"
        );
        if i == j {
            return;
        }

        self.arena.swap_contents(i, j);
        self.arena.rewrite_links(i, j);
        self.catalog.rewrite_heads(i, j);
    }

    /// Ordered block indices of the file at catalog position `position`
    ///
    /// The walk is bounded by arena capacity; exceeding it means the chain
    /// has a cycle and yields [`DiskError::CorruptChain`] instead of
    /// looping forever.
    pub fn chain(&self, position: usize) -> Result<Vec<BlockIndex>> {
        let record = self
            .catalog
            .get(position)
            .ok_or(DiskError::InvalidSelection {
                index: position,
                file_count: self.catalog.len(),
            })?;

        let mut indices = Vec::new();
        let mut cursor = record.head();

        while let Some(index) = cursor {
            if indices.len() >= self.arena.capacity() {
                return Err(DiskError::CorruptChain {
                    file: record.name().to_string(),
                    visited: indices.len(),
                });
            }
            indices.push(index);
            cursor = self.arena.block(index).next();
        }

        Ok(indices)
    }

    /// Verify the structural invariants of the whole disk
    ///
    /// Checked: no block is referenced by more than one head or link; every
    /// chain terminates and visits only blocks tagged with its file's name;
    /// the chained block count equals the occupied block count (no orphans);
    /// the cached free counter matches reality; free blocks carry no tag
    /// and no link.
    pub fn check_consistency(&self) -> Result<()> {
        let capacity = self.arena.capacity();
        let mut referenced = vec![false; capacity];

        for (index, block) in self.arena.blocks() {
            if let Some(next) = block.next() {
                if block.is_free() {
                    return Err(DiskError::Inconsistency(format!(
                        "free block {index} carries a link"
                    )));
                }
                if next.get() >= capacity {
                    return Err(DiskError::Inconsistency(format!(
                        "block {index} links out of range to {next}"
                    )));
                }
                if referenced[next.get()] {
                    return Err(DiskError::Inconsistency(format!(
                        "block {next} is referenced twice"
                    )));
                }
                referenced[next.get()] = true;
            }
            if block.is_free() && !block.owner_tag().is_empty() {
                return Err(DiskError::Inconsistency(format!(
                    "free block {index} carries owner tag '{}'",
                    block.owner_tag()
                )));
            }
        }

        for record in self.catalog.iter() {
            let head = record.head().ok_or_else(|| {
                DiskError::Inconsistency(format!("file '{}' has no head block", record.name()))
            })?;
            if head.get() >= capacity {
                return Err(DiskError::Inconsistency(format!(
                    "file '{}' head {head} out of range",
                    record.name()
                )));
            }
            if referenced[head.get()] {
                return Err(DiskError::Inconsistency(format!(
                    "block {head} is referenced twice"
                )));
            }
            referenced[head.get()] = true;
        }

        let mut chained = 0usize;
        for (position, record) in self.catalog.iter().enumerate() {
            for index in self.chain(position)? {
                let block = self.arena.block(index);
                if block.is_free() {
                    return Err(DiskError::Inconsistency(format!(
                        "chain of '{}' visits free block {index}",
                        record.name()
                    )));
                }
                if block.owner_tag() != record.name() {
                    return Err(DiskError::Inconsistency(format!(
                        "block {index} tagged '{}' inside chain of '{}'",
                        block.owner_tag(),
                        record.name()
                    )));
                }
                chained += 1;
            }
        }

        let occupied = self.arena.occupied_blocks();
        if chained != occupied {
            return Err(DiskError::Inconsistency(format!(
                "{chained} blocks reachable through chains, {occupied} occupied"
            )));
        }

        let actual_free = self.arena.blocks().filter(|(_, b)| b.is_free()).count();
        if actual_free != self.arena.free_blocks() {
            return Err(DiskError::Inconsistency(format!(
                "free counter {} disagrees with actual {actual_free}",
                self.arena.free_blocks()
            )));
        }

        Ok(())
    }
}
