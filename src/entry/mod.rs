/*!
 * Cache Entry Table
 *
 * Fixed-capacity table of cache reservations. Owns id allocation from a
 * single bitmap word and the per-entry group-membership accounting; sizing
 * and socket admission live in the reservation operations that drive it.
 */

mod types;

pub use types::{CacheEntry, ReservationInfo, ReservationKind, RoundPolicy};

use crate::core::bitmap;
use crate::core::errors::ReservationError;
use crate::core::limits::CBM_LEN;
use crate::core::types::{EntryId, EntrySet, GroupId, ReservationResult};

/// Table of live reservations, indexed by entry id
pub struct EntryTable {
    slots: Box<[Option<CacheEntry>]>,
    used: EntrySet,
}

impl EntryTable {
    pub fn new() -> Self {
        Self {
            slots: (0..CBM_LEN).map(|_| None).collect(),
            used: 0,
        }
    }

    /// Number of live entries
    #[inline]
    pub fn live_count(&self) -> u32 {
        self.used.count_ones()
    }

    /// Allocate the first free id and store `entry` under it
    ///
    /// The caller fills every field except `id`, which is overwritten with
    /// the allocated slot.
    pub fn alloc(&mut self, mut entry: CacheEntry) -> ReservationResult<EntryId> {
        let id = bitmap::first_zero(self.used, CBM_LEN).ok_or(ReservationError::OutOfIds)?;
        entry.id = id;
        debug_assert_eq!(entry.member_of, 0);
        self.used |= 1u64 << id;
        self.slots[id as usize] = Some(entry);
        Ok(id)
    }

    pub fn get(&self, id: EntryId) -> ReservationResult<&CacheEntry> {
        self.slots
            .get(id as usize)
            .and_then(|s| s.as_ref())
            .ok_or(ReservationError::InvalidId(id))
    }

    pub fn get_mut(&mut self, id: EntryId) -> ReservationResult<&mut CacheEntry> {
        self.slots
            .get_mut(id as usize)
            .and_then(|s| s.as_mut())
            .ok_or(ReservationError::InvalidId(id))
    }

    /// Release an id
    ///
    /// Only legal once no group references the entry; the caller strips
    /// memberships first.
    pub fn free(&mut self, id: EntryId) -> ReservationResult<CacheEntry> {
        let entry = self
            .slots
            .get_mut(id as usize)
            .and_then(Option::take)
            .ok_or(ReservationError::InvalidId(id))?;
        debug_assert_eq!(entry.member_of, 0, "freeing a referenced entry");
        self.used &= !(1u64 << id);
        Ok(entry)
    }

    /// Iterate live entries in id order
    pub fn iter_live(&self) -> impl Iterator<Item = &CacheEntry> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// Sum of way counts over the entries in `set`
    pub fn way_total(&self, set: EntrySet) -> u32 {
        let mut bits = set;
        let mut total = 0;
        while bits != 0 {
            let id = bits.trailing_zeros();
            bits &= bits - 1;
            if let Some(entry) = self.slots[id as usize].as_ref() {
                total += entry.way_count;
            }
        }
        total
    }

    /// Record that `group` references every entry in `set`
    pub fn mark_members(&mut self, set: EntrySet, group: GroupId) {
        let mut bits = set;
        while bits != 0 {
            let id = bits.trailing_zeros();
            bits &= bits - 1;
            if let Some(entry) = self.slots[id as usize].as_mut() {
                entry.member_of |= 1u128 << group;
            }
        }
    }

    /// Drop `group`'s reference from every entry in `set`
    pub fn clear_members(&mut self, set: EntrySet, group: GroupId) {
        let mut bits = set;
        while bits != 0 {
            let id = bits.trailing_zeros();
            bits &= bits - 1;
            if let Some(entry) = self.slots[id as usize].as_mut() {
                entry.member_of &= !(1u128 << group);
            }
        }
    }
}

impl Default for EntryTable {
    fn default() -> Self {
        Self::new()
    }
}
