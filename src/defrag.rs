//! In-place defragmentation via block swapping
//!
//! A single write cursor sweeps the arena from index 0. Files are visited
//! in catalog order, each file's blocks in chain order; every block that is
//! not already at the cursor is swapped there, and the global pointer
//! repair done by [`Disk::swap_blocks`] keeps every link and head valid
//! after each individual swap. That makes the pass interruptible: stop
//! after any step and the disk is fully consistent, just not yet compact.

use crate::arena::BlockIndex;
use crate::disk::Disk;
use serde::Serialize;

/// What a single defragmentation step did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefragEvent {
    /// The block was moved from `from` to the write cursor at `to`
    Swapped { from: BlockIndex, to: BlockIndex },
    /// The block already sat at the write cursor
    InPlace(BlockIndex),
}

enum Cursor {
    /// About to start the file at this catalog position
    File(usize),
    /// Mid-chain inside the file at this catalog position
    Block(usize, BlockIndex),
}

/// Stepwise compaction state machine
///
/// Owns only the cursor state; the disk is passed into every step so a
/// renderer can inspect it between steps. Driving the machine to the end
/// places every occupied block in `[0, occupied_count)` while preserving
/// each file's chain order.
pub struct Defragmenter {
    write_pos: usize,
    cursor: Cursor,
}

impl Defragmenter {
    pub fn new() -> Self {
        Defragmenter {
            write_pos: 0,
            cursor: Cursor::File(0),
        }
    }

    /// Blocks placed so far; also the next target index
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Place one block, performing at most one swap
    ///
    /// Returns `None` once every file has been processed. After a
    /// [`DefragEvent::Swapped`], the moved chain continues from the swap
    /// partner's old position, which the rewritten links already point at.
    pub fn step(&mut self, disk: &mut Disk) -> Option<DefragEvent> {
        let current = loop {
            match self.cursor {
                Cursor::File(position) => {
                    let record = disk.catalog().get(position)?;
                    match record.head() {
                        Some(head) => break (position, head),
                        // A registered file always has a head; tolerate an
                        // empty record by skipping it rather than stalling.
                        None => self.cursor = Cursor::File(position + 1),
                    }
                }
                Cursor::Block(position, index) => break (position, index),
            }
        };
        let (position, index) = current;

        assert!(
            self.write_pos < disk.arena().capacity(),
            "write cursor ran past the arena: chain walk did not terminate"
        );

        let target = BlockIndex::new(self.write_pos);
        let event = if index == target {
            DefragEvent::InPlace(index)
        } else {
            disk.swap_blocks(target, index);
            tracing::debug!(from = %index, to = %target, "moved block");
            DefragEvent::Swapped {
                from: index,
                to: target,
            }
        };

        // Whatever now sits at the cursor is the chain block just placed;
        // follow its link to find the rest of the file.
        self.cursor = match disk.arena().block(target).next() {
            Some(next) => Cursor::Block(position, next),
            None => Cursor::File(position + 1),
        };
        self.write_pos += 1;

        Some(event)
    }
}

impl Default for Defragmenter {
    fn default() -> Self {
        Defragmenter::new()
    }
}

impl Disk {
    /// Repack all occupied blocks into the lowest contiguous index range
    ///
    /// Runs the [`Defragmenter`] to completion and returns the number of
    /// swaps performed. Idempotent: on an already compact disk every step
    /// reports [`DefragEvent::InPlace`] and nothing moves.
    pub fn defragment_all(&mut self) -> usize {
        let mut defrag = Defragmenter::new();
        let mut swaps = 0usize;

        while let Some(event) = defrag.step(self) {
            if matches!(event, DefragEvent::Swapped { .. }) {
                swaps += 1;
            }
        }

        tracing::info!(swaps, placed = defrag.write_pos(), "defragmentation complete");
        swaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 11, 5).unwrap()
    }

    /// Occupied indices must be exactly [0, occupied_count).
    fn assert_compact(disk: &Disk) {
        let occupied = disk.arena().occupied_blocks();
        for (index, block) in disk.arena().blocks() {
            assert_eq!(
                !block.is_free(),
                index.get() < occupied,
                "block {index} breaks the compact prefix"
            );
        }
    }

    #[test]
    fn test_defragment_scattered_disk() {
        let mut disk = Disk::new(50);
        let mut rng = StdRng::seed_from_u64(1);
        disk.populate_random(6, 2..=5, &mut rng).unwrap();

        let sizes: Vec<usize> = (0..6).map(|i| disk.chain(i).unwrap().len()).collect();

        disk.defragment_all();

        assert_compact(&disk);
        disk.check_consistency().unwrap();
        assert_eq!(disk.stats().fragmentation, 0.0);

        // Chain lengths survive, and every chain is contiguous in order.
        for (position, &size) in sizes.iter().enumerate() {
            let chain = disk.chain(position).unwrap();
            assert_eq!(chain.len(), size);
            for pair in chain.windows(2) {
                assert_eq!(pair[1].get(), pair[0].get() + 1);
            }
        }
    }

    #[test]
    fn test_defragment_is_idempotent() {
        let mut disk = Disk::new(50);
        let mut rng = StdRng::seed_from_u64(9);
        disk.populate_random(5, 2..=5, &mut rng).unwrap();

        disk.defragment_all();
        let compacted = disk.clone();

        let swaps = disk.defragment_all();
        assert_eq!(swaps, 0);
        assert_eq!(disk, compacted);
    }

    #[test]
    fn test_defragment_empty_disk() {
        let mut disk = Disk::new(10);
        assert_eq!(disk.defragment_all(), 0);
        disk.check_consistency().unwrap();
    }

    #[test]
    fn test_step_events_on_small_disk() {
        let mut disk = Disk::new(6);
        disk.create_file("a", date(), 2).unwrap(); // 0 -> 1
        disk.create_file("b", date(), 2).unwrap(); // 2 -> 3
        disk.delete_file(0).unwrap(); // frees 0, 1

        let mut defrag = Defragmenter::new();

        // b's first block moves from 2 to the cursor at 0.
        assert_eq!(
            defrag.step(&mut disk),
            Some(DefragEvent::Swapped {
                from: BlockIndex::new(2),
                to: BlockIndex::new(0),
            })
        );
        disk.check_consistency().unwrap();

        // b's second block moves from 3 to 1.
        assert_eq!(
            defrag.step(&mut disk),
            Some(DefragEvent::Swapped {
                from: BlockIndex::new(3),
                to: BlockIndex::new(1),
            })
        );
        disk.check_consistency().unwrap();

        assert_eq!(defrag.step(&mut disk), None);
        assert_compact(&disk);
    }

    #[test]
    fn test_interrupted_pass_leaves_consistent_disk() {
        let mut disk = Disk::new(50);
        let mut rng = StdRng::seed_from_u64(3);
        disk.populate_random(6, 2..=5, &mut rng).unwrap();

        let mut defrag = Defragmenter::new();
        for _ in 0..4 {
            if defrag.step(&mut disk).is_none() {
                break;
            }
            // Consistency must hold after every individual step, not just
            // at the end of the pass.
            disk.check_consistency().unwrap();
        }

        // Blocks below the cursor form a compact occupied prefix.
        for raw in 0..defrag.write_pos() {
            assert!(!disk.arena().is_free(BlockIndex::new(raw)));
        }
    }

    #[test]
    fn test_defragment_preserves_file_contents() {
        let mut disk = Disk::new(12);
        disk.create_file("a", date(), 2).unwrap();
        disk.create_file("b", date(), 3).unwrap();
        disk.delete_file_by_name("a").unwrap();
        disk.create_file("c", date(), 2).unwrap(); // reclaims a's slots

        disk.defragment_all();
        disk.check_consistency().unwrap();

        // Catalog order drives placement: b packs first, then c.
        assert_eq!(disk.catalog().get(0).unwrap().name(), "b");
        let b_chain = disk.chain(0).unwrap();
        assert_eq!(
            b_chain.iter().map(|i| i.get()).collect::<Vec<_>>(),
            [0, 1, 2]
        );
        let c_chain = disk.chain(1).unwrap();
        assert_eq!(
            c_chain.iter().map(|i| i.get()).collect::<Vec<_>>(),
            [3, 4]
        );

        for index in b_chain {
            assert_eq!(disk.arena().block(index).owner_tag(), "b");
        }
    }
}
