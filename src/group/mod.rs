/*!
 * Group Table
 *
 * Fixed-capacity table of class-of-service groups. Owns id allocation from
 * the 128-slot COS id space (id 0 reserved at init for the global pool) and
 * the member-set uniqueness scan.
 */

mod types;

pub use types::{Group, WayRange};

use crate::core::bitmap;
use crate::core::errors::ReservationError;
use crate::core::limits::{COS_ID_SPACE, GLOBAL_POOL_COS};
use crate::core::types::{EntrySet, GroupId, GroupSet, ReservationResult};
use std::sync::Arc;

/// Table of live groups, indexed by COS id
pub struct GroupTable {
    slots: Box<[Option<Arc<Group>>]>,
    used: GroupSet,
    max_ids: u32,
}

impl GroupTable {
    /// `max_ids` caps usable COS ids at the hardware class count
    pub fn new(max_ids: u32) -> Self {
        let max_ids = max_ids.min(COS_ID_SPACE);
        Self {
            slots: (0..max_ids).map(|_| None).collect(),
            // COS 0 belongs to the global task pool
            used: 1u128 << GLOBAL_POOL_COS,
            max_ids,
        }
    }

    /// Live groups, excluding the reserved pool id
    pub fn live_count(&self) -> u32 {
        self.used.count_ones() - 1
    }

    /// Find the live group with exactly this member set
    ///
    /// Linear scan; the id space is small and the control path is cold.
    pub fn find_by_members(&self, members: EntrySet) -> Option<Arc<Group>> {
        self.slots
            .iter()
            .flatten()
            .find(|g| g.members() == members)
            .map(Arc::clone)
    }

    /// Reserve the first free COS id
    pub fn alloc_id(&mut self) -> ReservationResult<GroupId> {
        let id = bitmap::first_zero128(self.used, self.max_ids).ok_or(ReservationError::OutOfIds)?;
        self.used |= 1u128 << id;
        Ok(id)
    }

    /// Install a group under its previously reserved id
    pub fn install(&mut self, group: Arc<Group>) {
        let id = group.id as usize;
        debug_assert!(self.used & (1u128 << id) != 0, "installing unreserved id");
        debug_assert!(self.slots[id].is_none(), "installing over a live group");
        self.slots[id] = Some(group);
    }

    /// Release an id, dropping the table's reference to its group if any
    pub fn release(&mut self, id: GroupId) {
        debug_assert_ne!(id, GLOBAL_POOL_COS, "releasing the global pool id");
        if let Some(slot) = self.slots.get_mut(id as usize) {
            *slot = None;
            self.used &= !(1u128 << id);
        }
    }

    pub fn get(&self, id: GroupId) -> Option<Arc<Group>> {
        self.slots.get(id as usize)?.as_ref().map(Arc::clone)
    }

    /// Iterate live groups in id order
    pub fn iter_live(&self) -> impl Iterator<Item = &Arc<Group>> {
        self.slots.iter().flatten()
    }
}
