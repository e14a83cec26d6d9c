/*!
 * Manager Statistics
 */

use crate::core::types::{LayoutId, SocketId};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of allocator state
///
/// `occupied_ways` (admission, charged at create) and `placed_ways` (ranges
/// committed at attach) are independent counters by design; exposing both
/// makes the divergence observable instead of silently assumed away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    pub entries_used: u32,
    pub groups_live: u32,
    pub layouts_known: u32,
    pub sockets: Vec<SocketStats>,
    pub layouts: Vec<LayoutStats>,
}

/// Admission state of one online socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketStats {
    pub socket: SocketId,
    pub layout: LayoutId,
    pub occupied_ways: u32,
    pub free_ways: u32,
}

/// Placement state of one layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutStats {
    pub layout: LayoutId,
    pub placed_ways: u32,
    pub hw_reserved_ways: u32,
}
