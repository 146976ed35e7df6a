//! Contiguous memory manager
//!
//! One address space `[0, total)` partitioned into blocks kept in ascending
//! offset order. Allocation splits a free block, deallocation coalesces with
//! free neighbours. There is no compaction.
//!
//! Segmentation places like first fit and additionally records a segment
//! (base and limit) for the owner. The segment table is dropped with the
//! block.
//!
//! # Invariants
//!
//! - Blocks are sorted by offset, each starts where the previous one ends
//! - Block sizes sum to `total_size`
//! - No two adjacent blocks are both free
//! - A process owns at most one block
//! - Every segment describes exactly one allocated block of its process

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::types::{MemoryAlgorithm, ProcessId};

/// Memory manager settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    /// Allocation unit. Requests are rounded up to a multiple of it.
    pub granularity: u64,
    /// Algorithm used when a request names none
    pub default_algorithm: MemoryAlgorithm,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            granularity: 1,
            default_algorithm: MemoryAlgorithm::FirstFit,
        }
    }
}

/// A span `[offset, offset + size)` of the address space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryBlock {
    /// Start address
    pub offset: u64,
    /// Length
    pub size: u64,
    /// Owning process, `None` when free
    pub owner: Option<ProcessId>,
    /// Size the owner asked for (0 when free)
    pub requested: u64,
}

impl MemoryBlock {
    fn free(offset: u64, size: u64) -> Self {
        Self {
            offset,
            size,
            owner: None,
            requested: 0,
        }
    }

    /// One past the last address.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// True when no process owns the block.
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    /// Rounding waste inside an allocated block.
    pub fn internal_fragmentation(&self) -> u64 {
        if self.is_free() {
            0
        } else {
            self.size - self.requested
        }
    }
}

/// Segment table entry for a segmentation allocation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySegment {
    pub segment_id: u64,
    /// Start address of the backing block
    pub base_address: u64,
    /// Segment length
    pub limit: u64,
    pub process_id: ProcessId,
}

/// Observable memory state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySnapshot {
    /// Blocks in offset order
    pub blocks: Vec<MemoryBlock>,
    /// Configured size (0 before initialization)
    pub total_size: u64,
    /// Sum of allocated blocks
    pub used_size: u64,
    /// Sum of free blocks
    pub free_size: u64,
    /// Largest single free block
    pub largest_free_block: u64,
    /// Request size the external fragmentation figure refers to
    pub pending_request: u64,
    /// Free memory in blocks individually smaller than `pending_request`
    pub external_fragmentation: u64,
    /// Rounding waste across allocated blocks
    pub internal_fragmentation: u64,
    /// Algorithm used for requests that name none
    pub current_algorithm: MemoryAlgorithm,
    /// Whether `initialize` has run
    pub initialized: bool,
    /// Segment table, in allocation order
    pub segments: Vec<MemorySegment>,
}

/// The memory manager.
#[derive(Clone, Debug)]
pub struct MemoryManager {
    config: MemoryConfig,
    total_size: u64,
    blocks: Vec<MemoryBlock>,
    segments: Vec<MemorySegment>,
    next_segment_id: u64,
    initialized: bool,
}

impl MemoryManager {
    /// Uninitialized manager.
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config: MemoryConfig {
                granularity: config.granularity.max(1),
                ..config
            },
            total_size: 0,
            blocks: Vec::new(),
            segments: Vec::new(),
            next_segment_id: 1,
            initialized: false,
        }
    }

    /// Whether `initialize` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Configured size.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Blocks in offset order.
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    /// Segment table, in allocation order.
    pub fn segments(&self) -> &[MemorySegment] {
        &self.segments
    }

    /// Algorithm for requests that name none.
    pub fn default_algorithm(&self) -> MemoryAlgorithm {
        self.config.default_algorithm
    }

    /// Change the default algorithm.
    pub fn set_default_algorithm(&mut self, algorithm: MemoryAlgorithm) {
        self.config.default_algorithm = algorithm;
    }

    /// Reset to a single free block of `total_size` (rounded down to the
    /// granularity). Destructive: returns the processes that lost a block.
    pub fn initialize(&mut self, total_size: u64) -> SimResult<Vec<ProcessId>> {
        let total = total_size - total_size % self.config.granularity;
        if total == 0 {
            return Err(SimError::Validation(format!(
                "totalSize must be at least {}",
                self.config.granularity
            )));
        }
        let evicted = self.owners();
        self.total_size = total;
        self.blocks = vec![MemoryBlock::free(0, total)];
        self.segments.clear();
        self.initialized = true;
        Ok(evicted)
    }

    /// Free every block back into one span. Returns the previous owners.
    pub fn release_all(&mut self) -> Vec<ProcessId> {
        let evicted = self.owners();
        if self.initialized {
            self.blocks = vec![MemoryBlock::free(0, self.total_size)];
        }
        self.segments.clear();
        evicted
    }

    /// Carve `size` (rounded up) out of a free block chosen by `algorithm`.
    pub fn allocate(
        &mut self,
        pid: ProcessId,
        size: u64,
        algorithm: MemoryAlgorithm,
    ) -> SimResult<MemoryBlock> {
        if !self.initialized {
            return Err(SimError::NotConfigured("memory has not been initialized"));
        }
        if size == 0 {
            return Err(SimError::Validation("size must be positive".into()));
        }
        if self.block_of(pid).is_some() {
            return Err(SimError::Validation(format!(
                "process {} already holds a memory block",
                pid.0
            )));
        }

        let rounded = self.round_up(size).ok_or(SimError::OutOfMemory {
            requested: size,
            largest_free: self.largest_free(),
        })?;
        let index = self
            .find_free(rounded, algorithm)
            .ok_or(SimError::OutOfMemory {
                requested: rounded,
                largest_free: self.largest_free(),
            })?;

        let hole = self.blocks[index].clone();
        let block = MemoryBlock {
            offset: hole.offset,
            size: rounded,
            owner: Some(pid),
            requested: size,
        };
        self.blocks[index] = block.clone();
        if hole.size > rounded {
            self.blocks
                .insert(index + 1, MemoryBlock::free(hole.offset + rounded, hole.size - rounded));
        }
        if algorithm == MemoryAlgorithm::Segmentation {
            self.segments.push(MemorySegment {
                segment_id: self.next_segment_id,
                base_address: block.offset,
                limit: block.size,
                process_id: pid,
            });
            self.next_segment_id += 1;
        }
        Ok(block)
    }

    /// Free the block owned by `pid` and coalesce with free neighbours.
    pub fn deallocate(&mut self, pid: ProcessId) -> SimResult<MemoryBlock> {
        let index = self
            .blocks
            .iter()
            .position(|b| b.owner == Some(pid))
            .ok_or_else(|| {
                SimError::NotFound(format!("process {} holds no memory allocation", pid.0))
            })?;

        let freed = self.blocks[index].clone();
        self.blocks[index] = MemoryBlock::free(freed.offset, freed.size);
        self.segments.retain(|s| s.process_id != pid);

        // Merge with the right neighbour first so `index` stays valid.
        if index + 1 < self.blocks.len() && self.blocks[index + 1].is_free() {
            let right = self.blocks.remove(index + 1);
            self.blocks[index].size += right.size;
        }
        if index > 0 && self.blocks[index - 1].is_free() {
            let current = self.blocks.remove(index);
            self.blocks[index - 1].size += current.size;
        }
        Ok(freed)
    }

    /// Block owned by `pid`.
    pub fn block_of(&self, pid: ProcessId) -> Option<&MemoryBlock> {
        self.blocks.iter().find(|b| b.owner == Some(pid))
    }

    /// Index of the free block `algorithm` would pick for `size`.
    fn find_free(&self, size: u64, algorithm: MemoryAlgorithm) -> Option<usize> {
        let mut free = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.is_free());

        match algorithm {
            MemoryAlgorithm::FirstFit | MemoryAlgorithm::Segmentation => {
                free.find(|(_, b)| b.size >= size).map(|(i, _)| i)
            }
            // Ties go to the lowest offset: min_by_key keeps the first of
            // equal keys, max_by_key the last, hence the Reverse below.
            MemoryAlgorithm::BestFit => free
                .filter(|(_, b)| b.size >= size)
                .min_by_key(|(_, b)| b.size)
                .map(|(i, _)| i),
            MemoryAlgorithm::WorstFit => free
                .max_by_key(|(_, b)| (b.size, core::cmp::Reverse(b.offset)))
                .filter(|(_, b)| b.size >= size)
                .map(|(i, _)| i),
        }
    }

    /// `size` rounded up to the granularity; `None` past `u64::MAX`.
    fn round_up(&self, size: u64) -> Option<u64> {
        let g = self.config.granularity;
        size.div_ceil(g).checked_mul(g)
    }

    fn owners(&self) -> Vec<ProcessId> {
        self.blocks.iter().filter_map(|b| b.owner).collect()
    }

    /// Sum of free blocks.
    pub fn free_size(&self) -> u64 {
        self.blocks.iter().filter(|b| b.is_free()).map(|b| b.size).sum()
    }

    /// Sum of allocated blocks.
    pub fn used_size(&self) -> u64 {
        self.total_size - self.free_size()
    }

    /// Largest single free block.
    pub fn largest_free(&self) -> u64 {
        self.blocks
            .iter()
            .filter(|b| b.is_free())
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }

    /// Free memory sitting in blocks individually smaller than `request`.
    pub fn external_fragmentation(&self, request: u64) -> u64 {
        self.blocks
            .iter()
            .filter(|b| b.is_free() && b.size < request)
            .map(|b| b.size)
            .sum()
    }

    /// Rounding waste across all allocated blocks.
    pub fn internal_fragmentation(&self) -> u64 {
        self.blocks.iter().map(MemoryBlock::internal_fragmentation).sum()
    }

    /// Snapshot. External fragmentation is measured against `pending`, or
    /// against the largest allocated block when no request is given.
    pub fn snapshot(&self, pending: Option<u64>) -> MemorySnapshot {
        let pending_request = pending.unwrap_or_else(|| {
            self.blocks
                .iter()
                .filter(|b| !b.is_free())
                .map(|b| b.size)
                .max()
                .unwrap_or(0)
        });
        MemorySnapshot {
            blocks: self.blocks.clone(),
            total_size: self.total_size,
            used_size: self.used_size(),
            free_size: self.free_size(),
            largest_free_block: self.largest_free(),
            pending_request,
            external_fragmentation: self.external_fragmentation(pending_request),
            internal_fragmentation: self.internal_fragmentation(),
            current_algorithm: self.config.default_algorithm,
            initialized: self.initialized,
            segments: self.segments.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const P1: ProcessId = ProcessId(1);
    const P2: ProcessId = ProcessId(2);
    const P3: ProcessId = ProcessId(3);

    fn manager(total: u64) -> MemoryManager {
        let mut m = MemoryManager::new(MemoryConfig::default());
        m.initialize(total).unwrap();
        m
    }

    fn assert_partition(m: &MemoryManager) {
        let mut cursor = 0;
        for b in m.blocks() {
            assert_eq!(b.offset, cursor);
            assert!(b.size > 0);
            cursor = b.end();
        }
        assert_eq!(cursor, m.total_size());
    }

    #[test]
    fn test_first_fit_scenario() {
        let mut m = manager(1000);
        m.allocate(P1, 400, MemoryAlgorithm::FirstFit).unwrap();
        let free: Vec<_> = m.blocks().iter().filter(|b| b.is_free()).collect();
        assert_eq!(free.len(), 1);
        assert_eq!(free[0].size, 600);

        let err = m.allocate(P2, 700, MemoryAlgorithm::FirstFit).unwrap_err();
        assert!(matches!(err, SimError::OutOfMemory { requested: 700, largest_free: 600 }));

        m.deallocate(P1).unwrap();
        let block = m.allocate(P2, 700, MemoryAlgorithm::FirstFit).unwrap();
        assert_eq!(block.offset, 0);
        assert_partition(&m);
    }

    #[test]
    fn test_deallocate_unknown_is_not_found_without_mutation() {
        let mut m = manager(100);
        m.allocate(P1, 10, MemoryAlgorithm::FirstFit).unwrap();
        let before = m.blocks().to_vec();
        assert!(matches!(m.deallocate(P2), Err(SimError::NotFound(_))));
        assert_eq!(m.blocks(), &before[..]);
    }

    /// Layout: [P1 100][free 50][P2 100][free 200][P3 30][free 20]
    fn fragmented() -> MemoryManager {
        let mut m = manager(500);
        m.allocate(P1, 100, MemoryAlgorithm::FirstFit).unwrap();
        m.allocate(ProcessId(9), 50, MemoryAlgorithm::FirstFit).unwrap();
        m.allocate(P2, 100, MemoryAlgorithm::FirstFit).unwrap();
        m.allocate(ProcessId(8), 200, MemoryAlgorithm::FirstFit).unwrap();
        m.allocate(P3, 30, MemoryAlgorithm::FirstFit).unwrap();
        m.deallocate(ProcessId(9)).unwrap();
        m.deallocate(ProcessId(8)).unwrap();
        m
    }

    #[test]
    fn test_placement_algorithms() {
        let mut m = fragmented();
        let b = m.allocate(ProcessId(10), 20, MemoryAlgorithm::FirstFit).unwrap();
        assert_eq!(b.offset, 100);

        let mut m = fragmented();
        let b = m.allocate(ProcessId(10), 20, MemoryAlgorithm::BestFit).unwrap();
        assert_eq!(b.offset, 480);

        let mut m = fragmented();
        let b = m.allocate(ProcessId(10), 20, MemoryAlgorithm::WorstFit).unwrap();
        assert_eq!(b.offset, 250);
    }

    #[test]
    fn test_worst_fit_fails_when_largest_too_small() {
        let mut m = fragmented();
        let err = m.allocate(ProcessId(10), 201, MemoryAlgorithm::WorstFit).unwrap_err();
        assert!(matches!(err, SimError::OutOfMemory { largest_free: 200, .. }));
    }

    #[test]
    fn test_coalescing_merges_both_sides() {
        let mut m = manager(300);
        m.allocate(P1, 100, MemoryAlgorithm::FirstFit).unwrap();
        m.allocate(P2, 100, MemoryAlgorithm::FirstFit).unwrap();
        m.allocate(P3, 100, MemoryAlgorithm::FirstFit).unwrap();
        m.deallocate(P1).unwrap();
        m.deallocate(P3).unwrap();
        assert_eq!(m.blocks().len(), 3);
        m.deallocate(P2).unwrap();
        assert_eq!(m.blocks().len(), 1);
        assert!(m.blocks()[0].is_free());
        assert_eq!(m.blocks()[0].size, 300);
    }

    #[test]
    fn test_not_initialized_and_double_allocation() {
        let mut m = MemoryManager::new(MemoryConfig::default());
        assert!(matches!(
            m.allocate(P1, 1, MemoryAlgorithm::FirstFit),
            Err(SimError::NotConfigured(_))
        ));
        m.initialize(10).unwrap();
        m.allocate(P1, 1, MemoryAlgorithm::FirstFit).unwrap();
        assert!(matches!(
            m.allocate(P1, 1, MemoryAlgorithm::FirstFit),
            Err(SimError::Validation(_))
        ));
        assert!(matches!(
            m.allocate(P2, 0, MemoryAlgorithm::FirstFit),
            Err(SimError::Validation(_))
        ));
    }

    #[test]
    fn test_reinitialize_is_destructive() {
        let mut m = manager(100);
        m.allocate(P1, 10, MemoryAlgorithm::FirstFit).unwrap();
        let evicted = m.initialize(200).unwrap();
        assert_eq!(evicted, vec![P1]);
        assert_eq!(m.blocks().len(), 1);
        assert_eq!(m.total_size(), 200);
    }

    #[test]
    fn test_granularity_rounding() {
        let mut m = MemoryManager::new(MemoryConfig {
            granularity: 32,
            ..MemoryConfig::default()
        });
        m.initialize(1000).unwrap();
        assert_eq!(m.total_size(), 992);
        let b = m.allocate(P1, 40, MemoryAlgorithm::FirstFit).unwrap();
        assert_eq!(b.size, 64);
        assert_eq!(b.requested, 40);
        assert_eq!(m.internal_fragmentation(), 24);
        assert!(m.initialize(31).is_err());
    }

    #[test]
    fn test_oversized_request_with_granularity() {
        let mut m = MemoryManager::new(MemoryConfig {
            granularity: 32,
            ..MemoryConfig::default()
        });
        m.initialize(1024).unwrap();
        let err = m.allocate(P1, u64::MAX, MemoryAlgorithm::FirstFit).unwrap_err();
        assert_eq!(
            err,
            SimError::OutOfMemory {
                requested: u64::MAX,
                largest_free: 1024
            }
        );
        assert_eq!(m.blocks().len(), 1);
        assert!(m.blocks()[0].is_free());
    }

    #[test]
    fn test_segmentation_keeps_a_segment_table() {
        let mut m = manager(1000);
        m.allocate(P1, 100, MemoryAlgorithm::FirstFit).unwrap();
        let b = m.allocate(P2, 200, MemoryAlgorithm::Segmentation).unwrap();
        let c = m.allocate(P3, 50, MemoryAlgorithm::Segmentation).unwrap();
        assert_eq!(b.offset, 100);
        assert_eq!(c.offset, 300);

        let segments = m.snapshot(None).segments;
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[0],
            MemorySegment {
                segment_id: 1,
                base_address: 100,
                limit: 200,
                process_id: P2,
            }
        );
        assert_eq!(segments[1].segment_id, 2);
        assert_eq!(segments[1].base_address, 300);

        // Freed space is reused lowest offset first.
        m.deallocate(P2).unwrap();
        assert_eq!(m.segments().len(), 1);
        assert_eq!(m.segments()[0].process_id, P3);
        let d = m.allocate(ProcessId(4), 150, MemoryAlgorithm::Segmentation).unwrap();
        assert_eq!(d.offset, 100);
        assert_eq!(m.segments()[1].segment_id, 3);

        m.initialize(1000).unwrap();
        assert!(m.segments().is_empty());
    }

    #[test]
    fn test_snapshot_fragmentation() {
        let m = fragmented();
        let snap = m.snapshot(None);
        assert_eq!(snap.pending_request, 100);
        // free blocks: 50, 200, 20 -> 50 + 20 below 100
        assert_eq!(snap.external_fragmentation, 70);
        assert_eq!(m.snapshot(Some(300)).external_fragmentation, 270);
        assert_eq!(snap.used_size + snap.free_size, snap.total_size);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Alloc(u64, u64, u8),
        Free(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u64..8, 1u64..300, 0u8..4).prop_map(|(p, s, a)| Op::Alloc(p, s, a)),
            (1u64..8).prop_map(Op::Free),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn blocks_always_partition_the_space(ops in proptest::collection::vec(op(), 0..64)) {
            let mut m = manager(1000);
            for op in ops {
                let before = m.blocks().to_vec();
                let result = match op {
                    Op::Alloc(p, s, a) => {
                        let algorithm = match a {
                            0 => MemoryAlgorithm::FirstFit,
                            1 => MemoryAlgorithm::BestFit,
                            2 => MemoryAlgorithm::WorstFit,
                            _ => MemoryAlgorithm::Segmentation,
                        };
                        m.allocate(ProcessId(p), s, algorithm).map(|_| ())
                    }
                    Op::Free(p) => m.deallocate(ProcessId(p)).map(|_| ()),
                };
                if result.is_err() {
                    prop_assert_eq!(m.blocks(), &before[..]);
                }

                let mut cursor = 0;
                for pair in m.blocks().windows(2) {
                    prop_assert!(!(pair[0].is_free() && pair[1].is_free()));
                }
                for b in m.blocks() {
                    prop_assert_eq!(b.offset, cursor);
                    cursor = b.end();
                }
                prop_assert_eq!(cursor, 1000);
                for seg in m.segments() {
                    let block = m.block_of(seg.process_id);
                    prop_assert!(block.is_some_and(|b| b.offset == seg.base_address && b.size == seg.limit));
                }
            }
        }
    }
}
