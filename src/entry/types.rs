/*!
 * Reservation Types
 */

use crate::core::types::{CpuSet, EntryId, GroupSet, SocketSet};
use serde::{Deserialize, Serialize};

/// What a reservation protects
///
/// `Code` and `Data` are only meaningful with code/data prioritization
/// enabled; without CDP every reservation is `Both`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationKind {
    Code,
    Data,
    Both,
}

/// How a requested size is fitted to the way granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPolicy {
    Up,
    Down,
}

/// One cache reservation
///
/// Sized in ways at creation; placed into concrete way ranges only once a
/// task attaches it (via the group the task ends up in).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub id: EntryId,
    pub requested_kbytes: u64,
    pub rounded_kbytes: u64,
    /// Contiguous ways this entry needs in each layout it participates in
    pub way_count: u32,
    pub kind: ReservationKind,
    /// CPUs the size was accounted over
    pub cpus: CpuSet,
    /// Sockets charged at creation; accounting is released against this set
    /// even if CPUs have gone offline since
    pub sockets: SocketSet,
    /// Every group currently referencing this entry, one bit per group id
    pub member_of: GroupSet,
}

/// Public listing record for one reservation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationInfo {
    pub id: EntryId,
    pub kbytes: u64,
    pub kind: ReservationKind,
    pub cpus: CpuSet,
}
