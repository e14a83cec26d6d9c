/*!
 * Group Types
 * One group per hardware class-of-service id
 */

use crate::core::limits::MAX_LAYOUTS;
use crate::core::types::{EntrySet, GroupId, LayoutId, Pid, SocketId, SocketSet};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A contiguous way range packed into one word: `len << 32 | start`
///
/// Packed so the scheduler path can read a range with a single atomic load.
/// A zero word means "not placed in this layout".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WayRange {
    pub start: u32,
    pub len: u32,
}

impl WayRange {
    #[inline]
    pub fn pack(self) -> u64 {
        (self.len as u64) << 32 | self.start as u64
    }

    #[inline]
    pub fn unpack(word: u64) -> Option<Self> {
        let len = (word >> 32) as u32;
        (len != 0).then_some(Self {
            start: word as u32,
            len,
        })
    }
}

/// A class-of-service equivalence class
///
/// Shared with the scheduler path through an `Arc`: the member set and way
/// total are fixed at creation, ranges and the synced map are single-word
/// atomics, and the task bookkeeping is only touched under the control lock.
pub struct Group {
    pub id: GroupId,
    /// Exact reservation set this group represents; immutable once live
    members: EntrySet,
    /// Sum of member way counts; the length of every placed range
    way_count: u32,
    /// Placed range per layout id, packed (`WayRange::pack`)
    per_layout: [AtomicU64; MAX_LAYOUTS as usize],
    /// Sockets whose registers reflect this group
    synced: AtomicU64,
    task_count: AtomicU32,
    tasks: Mutex<Vec<Pid>>,
}

impl Group {
    pub fn new(id: GroupId, members: EntrySet, way_count: u32) -> Self {
        Self {
            id,
            members,
            way_count,
            per_layout: std::array::from_fn(|_| AtomicU64::new(0)),
            synced: AtomicU64::new(0),
            task_count: AtomicU32::new(0),
            tasks: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn members(&self) -> EntrySet {
        self.members
    }

    #[inline]
    pub fn way_count(&self) -> u32 {
        self.way_count
    }

    /// Placed range in `layout`, if any
    #[inline]
    pub fn range(&self, layout: LayoutId) -> Option<WayRange> {
        WayRange::unpack(self.per_layout[layout as usize].load(Ordering::Acquire))
    }

    pub fn set_range(&self, layout: LayoutId, range: WayRange) {
        self.per_layout[layout as usize].store(range.pack(), Ordering::Release);
    }

    pub fn clear_range(&self, layout: LayoutId) {
        self.per_layout[layout as usize].store(0, Ordering::Release);
    }

    /// Copy every placed range from `other` (seeding a successor group)
    pub fn seed_ranges_from(&self, other: &Group) {
        for layout in 0..MAX_LAYOUTS as usize {
            self.per_layout[layout].store(
                other.per_layout[layout].load(Ordering::Acquire),
                Ordering::Release,
            );
        }
    }

    /// Drop every placed range without freeing way bitmap state
    ///
    /// Used when ranges were handed over to a successor group.
    pub fn forget_ranges(&self) {
        for layout in 0..MAX_LAYOUTS as usize {
            self.per_layout[layout].store(0, Ordering::Release);
        }
    }

    #[inline]
    pub fn is_synced(&self, socket: SocketId) -> bool {
        self.synced.load(Ordering::Acquire) & (1u64 << socket) != 0
    }

    #[inline]
    pub fn mark_synced(&self, socket: SocketId) {
        self.synced.fetch_or(1u64 << socket, Ordering::AcqRel);
    }

    /// Sockets this group has been synced to
    #[inline]
    pub fn synced_sockets(&self) -> SocketSet {
        self.synced.load(Ordering::Acquire)
    }

    #[inline]
    pub fn task_count(&self) -> u32 {
        self.task_count.load(Ordering::Acquire)
    }

    /// Snapshot of attached task pids
    pub fn task_pids(&self) -> Vec<Pid> {
        self.tasks.lock().clone()
    }

    pub fn add_task(&self, pid: Pid) {
        self.tasks.lock().push(pid);
        self.task_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Remove one reference from `pid`; returns the remaining count
    pub fn remove_task(&self, pid: Pid) -> u32 {
        let mut tasks = self.tasks.lock();
        if let Some(pos) = tasks.iter().position(|&p| p == pid) {
            tasks.swap_remove(pos);
        }
        self.task_count.fetch_sub(1, Ordering::AcqRel) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_way_range_pack_round_trip() {
        let r = WayRange { start: 5, len: 3 };
        assert_eq!(WayRange::unpack(r.pack()), Some(r));
        assert_eq!(WayRange::unpack(0), None);
    }

    #[test]
    fn test_range_per_layout() {
        let g = Group::new(1, 0b1, 2);
        assert_eq!(g.range(0), None);
        g.set_range(0, WayRange { start: 4, len: 2 });
        assert_eq!(g.range(0), Some(WayRange { start: 4, len: 2 }));
        assert_eq!(g.range(1), None);
        g.clear_range(0);
        assert_eq!(g.range(0), None);
    }

    #[test]
    fn test_task_refs() {
        let g = Group::new(1, 0b1, 2);
        g.add_task(10);
        g.add_task(20);
        assert_eq!(g.task_count(), 2);
        assert_eq!(g.remove_task(10), 1);
        assert_eq!(g.task_pids(), vec![20]);
        assert_eq!(g.remove_task(20), 0);
    }

    #[test]
    fn test_synced_bitmap() {
        let g = Group::new(1, 0b1, 2);
        assert!(!g.is_synced(3));
        g.mark_synced(3);
        assert!(g.is_synced(3));
        assert_eq!(g.synced_sockets(), 0b1000);
    }
}
