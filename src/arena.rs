//! Fixed-capacity block arena with index-based chain links
//!
//! The arena is the unit of storage: a flat vector of blocks, each either
//! free or holding one fragment of one file plus an optional link to the
//! next block of the same file. Links are plain indices into the arena,
//! wrapped in [`BlockIndex`] so they cannot be confused with counts or
//! byte offsets.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a block inside a [`BlockArena`]
///
/// A distinct type rather than a bare `usize`: arithmetic on block indices
/// is almost always a bug, so none is provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockIndex(usize);

impl BlockIndex {
    pub fn new(raw: usize) -> Self {
        BlockIndex(raw)
    }

    /// Raw position in the arena
    pub fn get(self) -> usize {
        self.0
    }

    /// Row when the arena is rendered as a grid with `columns` columns
    pub fn row(self, columns: usize) -> usize {
        self.0 / columns
    }

    /// Column when the arena is rendered as a grid with `columns` columns
    pub fn col(self, columns: usize) -> usize {
        self.0 % columns
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One arena slot
///
/// A free block carries no tag and no link; both are cleared on release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    occupied: bool,
    owner_tag: String,
    next: Option<BlockIndex>,
}

impl Block {
    pub fn is_free(&self) -> bool {
        !self.occupied
    }

    /// Name of the file this block belongs to (empty when free)
    ///
    /// Display/debug aid only; chain membership is defined by the links,
    /// not by the tag.
    pub fn owner_tag(&self) -> &str {
        &self.owner_tag
    }

    /// Link to the next block of the same file, `None` at chain end
    pub fn next(&self) -> Option<BlockIndex> {
        self.next
    }
}

/// Fixed-capacity collection of storage blocks
///
/// Initialized once with every block free and never resized. Tracks a
/// cached free-block counter so occupancy queries are O(1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockArena {
    blocks: Vec<Block>,
    free_blocks: usize,
}

impl BlockArena {
    /// Create an arena with `capacity` free blocks
    pub fn new(capacity: usize) -> Self {
        BlockArena {
            blocks: vec![Block::default(); capacity],
            free_blocks: capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }

    pub fn free_blocks(&self) -> usize {
        self.free_blocks
    }

    pub fn occupied_blocks(&self) -> usize {
        self.blocks.len() - self.free_blocks
    }

    pub fn is_full(&self) -> bool {
        self.free_blocks == 0
    }

    pub fn is_free(&self, index: BlockIndex) -> bool {
        self.blocks[index.get()].is_free()
    }

    /// Read access to a single block
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn block(&self, index: BlockIndex) -> &Block {
        &self.blocks[index.get()]
    }

    /// Iterate over all blocks in arena order
    pub fn blocks(&self) -> impl Iterator<Item = (BlockIndex, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockIndex::new(i), b))
    }

    /// Lowest free index in linear order, `None` when the arena is full
    pub fn find_first_free(&self) -> Option<BlockIndex> {
        self.blocks
            .iter()
            .position(Block::is_free)
            .map(BlockIndex::new)
    }

    /// Uniformly sample a free block, `None` when the arena is full
    ///
    /// Samples only among verified-free indices, so this terminates in one
    /// pass even on a nearly full arena.
    pub fn find_random_free(&self, rng: &mut impl Rng) -> Option<BlockIndex> {
        let free: Vec<BlockIndex> = self
            .blocks()
            .filter(|(_, b)| b.is_free())
            .map(|(i, _)| i)
            .collect();
        free.choose(rng).copied()
    }

    /// Share of chain links that jump to a non-adjacent block
    ///
    /// 0.0 means every link points at the next higher index (fully
    /// compacted); 1.0 means no link does.
    pub fn fragmentation_score(&self) -> f64 {
        let mut links = 0usize;
        let mut broken = 0usize;

        for (index, block) in self.blocks() {
            if let Some(next) = block.next() {
                links += 1;
                if next.get() != index.get() + 1 {
                    broken += 1;
                }
            }
        }

        if links == 0 {
            return 0.0;
        }
        broken as f64 / links as f64
    }

    /// Mark a free block occupied, tagging it with its owner's name
    ///
    /// # Panics
    ///
    /// Panics if the block is already occupied. Claiming an occupied block
    /// is a caller bug, not a runtime condition.
    pub(crate) fn claim(&mut self, index: BlockIndex, owner_tag: &str) {
        let block = &mut self.blocks[index.get()];
        assert!(block.is_free(), "claim on occupied block {index}");

        block.occupied = true;
        block.owner_tag = owner_tag.to_string();
        block.next = None;
        self.free_blocks -= 1;
    }

    /// Point `from`'s link at `to`
    ///
    /// No cycle check: callers only ever link a freshly claimed block.
    pub(crate) fn link(&mut self, from: BlockIndex, to: BlockIndex) {
        self.blocks[from.get()].next = Some(to);
    }

    /// Clear occupancy, tag, and link
    pub(crate) fn release(&mut self, index: BlockIndex) {
        let block = &mut self.blocks[index.get()];
        if block.is_free() {
            return;
        }
        *block = Block::default();
        self.free_blocks += 1;
    }

    /// Exchange the full contents of two slots (occupancy, tag, link)
    pub(crate) fn swap_contents(&mut self, i: BlockIndex, j: BlockIndex) {
        self.blocks.swap(i.get(), j.get());
    }

    /// Redirect every link that pointed at `i` to `j` and vice versa
    ///
    /// The arena half of a global block swap; heads live in the catalog
    /// and are rewritten by its counterpart.
    pub(crate) fn rewrite_links(&mut self, i: BlockIndex, j: BlockIndex) {
        for block in &mut self.blocks {
            match block.next {
                Some(n) if n == i => block.next = Some(j),
                Some(n) if n == j => block.next = Some(i),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_new_arena_all_free() {
        let arena = BlockArena::new(50);
        assert_eq!(arena.capacity(), 50);
        assert_eq!(arena.free_blocks(), 50);
        assert_eq!(arena.occupied_blocks(), 0);
        assert!(!arena.is_full());
        assert!(arena.blocks().all(|(_, b)| b.is_free()));
    }

    #[test]
    fn test_find_first_free_is_lowest() {
        let mut arena = BlockArena::new(10);
        assert_eq!(arena.find_first_free(), Some(BlockIndex::new(0)));

        arena.claim(BlockIndex::new(0), "a");
        arena.claim(BlockIndex::new(1), "a");
        assert_eq!(arena.find_first_free(), Some(BlockIndex::new(2)));

        arena.release(BlockIndex::new(0));
        assert_eq!(arena.find_first_free(), Some(BlockIndex::new(0)));
    }

    #[test]
    fn test_find_first_free_full_arena() {
        let mut arena = BlockArena::new(3);
        for i in 0..3 {
            arena.claim(BlockIndex::new(i), "x");
        }
        assert!(arena.is_full());
        assert_eq!(arena.find_first_free(), None);
    }

    #[test]
    fn test_claim_and_release_counters() {
        let mut arena = BlockArena::new(5);
        arena.claim(BlockIndex::new(3), "file1");
        assert_eq!(arena.free_blocks(), 4);
        assert!(!arena.is_free(BlockIndex::new(3)));
        assert_eq!(arena.block(BlockIndex::new(3)).owner_tag(), "file1");

        arena.release(BlockIndex::new(3));
        assert_eq!(arena.free_blocks(), 5);
        assert!(arena.is_free(BlockIndex::new(3)));
        assert_eq!(arena.block(BlockIndex::new(3)).owner_tag(), "");
        assert_eq!(arena.block(BlockIndex::new(3)).next(), None);
    }

    #[test]
    #[should_panic(expected = "claim on occupied block")]
    fn test_double_claim_panics() {
        let mut arena = BlockArena::new(5);
        arena.claim(BlockIndex::new(0), "a");
        arena.claim(BlockIndex::new(0), "b");
    }

    #[test]
    fn test_find_random_free_only_samples_free() {
        let mut arena = BlockArena::new(10);
        for i in 0..9 {
            arena.claim(BlockIndex::new(i), "x");
        }

        let mut rng = StdRng::seed_from_u64(7);
        // Only index 9 is free; sampling must return it every time.
        for _ in 0..20 {
            assert_eq!(arena.find_random_free(&mut rng), Some(BlockIndex::new(9)));
        }

        arena.claim(BlockIndex::new(9), "x");
        assert_eq!(arena.find_random_free(&mut rng), None);
    }

    #[test]
    fn test_rewrite_links_swaps_both_directions() {
        let mut arena = BlockArena::new(6);
        arena.claim(BlockIndex::new(0), "a");
        arena.claim(BlockIndex::new(2), "a");
        arena.claim(BlockIndex::new(4), "a");
        arena.link(BlockIndex::new(0), BlockIndex::new(2));
        arena.link(BlockIndex::new(2), BlockIndex::new(4));

        arena.rewrite_links(BlockIndex::new(2), BlockIndex::new(4));

        assert_eq!(arena.block(BlockIndex::new(0)).next(), Some(BlockIndex::new(4)));
        assert_eq!(arena.block(BlockIndex::new(2)).next(), Some(BlockIndex::new(2)));
    }

    #[test]
    fn test_fragmentation_score() {
        let mut arena = BlockArena::new(10);
        assert_eq!(arena.fragmentation_score(), 0.0);

        // Adjacent chain 0 -> 1: no broken links.
        arena.claim(BlockIndex::new(0), "a");
        arena.claim(BlockIndex::new(1), "a");
        arena.link(BlockIndex::new(0), BlockIndex::new(1));
        assert_eq!(arena.fragmentation_score(), 0.0);

        // Scattered chain 5 -> 3: one broken link out of two.
        arena.claim(BlockIndex::new(5), "b");
        arena.claim(BlockIndex::new(3), "b");
        arena.link(BlockIndex::new(5), BlockIndex::new(3));
        assert_eq!(arena.fragmentation_score(), 0.5);
    }
}
