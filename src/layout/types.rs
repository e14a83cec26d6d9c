/*!
 * Layout Types
 * Hardware description, per-topology layouts, and per-socket state
 */

use crate::core::bitmap;
use crate::core::limits::{CBM_LEN, COS_ID_SPACE, DEFAULT_CBM_LEN, DEFAULT_L3_KBYTES};
use crate::core::types::{LayoutId, WayMask};
use miette::Diagnostic;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Sentinel for "socket not brought online yet"
pub(crate) const LAYOUT_NONE: u32 = u32::MAX;

/// Static description of the cache hardware under management
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheDescriptor {
    /// Total last-level cache size
    pub l3_kbytes: u64,
    /// Capacity bitmask length: number of ways per socket
    pub cbm_len: u32,
    /// Code/data prioritization; on by default
    pub cdp_enabled: bool,
    /// Hardware class-of-service count (clamped to the 128-slot id space)
    pub max_cos_ids: u32,
}

impl Default for CacheDescriptor {
    fn default() -> Self {
        Self {
            l3_kbytes: DEFAULT_L3_KBYTES,
            cbm_len: DEFAULT_CBM_LEN,
            cdp_enabled: true,
            max_cos_ids: COS_ID_SPACE,
        }
    }
}

impl CacheDescriptor {
    /// Granularity: kbytes charged per capacity-bitmask bit
    #[inline]
    pub fn kbytes_per_way(&self) -> u64 {
        self.l3_kbytes / self.cbm_len as u64
    }

    /// Mask covering every way of one socket
    #[inline]
    pub fn full_mask(&self) -> WayMask {
        bitmap::range_mask(0, self.cbm_len)
    }

    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.cbm_len == 0 || self.l3_kbytes == 0 {
            return Err(DescriptorError::ZeroGeometry);
        }
        if self.cbm_len > CBM_LEN {
            return Err(DescriptorError::TooManyWays {
                cbm_len: self.cbm_len,
            });
        }
        if self.l3_kbytes % self.cbm_len as u64 != 0 {
            return Err(DescriptorError::IndivisibleSize {
                l3_kbytes: self.l3_kbytes,
                cbm_len: self.cbm_len,
            });
        }
        if self.max_cos_ids < 2 {
            return Err(DescriptorError::TooFewCosIds {
                max_cos_ids: self.max_cos_ids,
            });
        }
        Ok(())
    }
}

/// Invalid hardware description
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum DescriptorError {
    #[error("cache size and way count must be nonzero")]
    #[diagnostic(code(descriptor::zero_geometry))]
    ZeroGeometry,

    #[error("capacity bitmask length {cbm_len} exceeds the supported maximum")]
    #[diagnostic(code(descriptor::too_many_ways))]
    TooManyWays { cbm_len: u32 },

    #[error("cache size {l3_kbytes} KB is not a multiple of the way count {cbm_len}")]
    #[diagnostic(
        code(descriptor::indivisible_size),
        help("The per-way granularity must be a whole number of kbytes.")
    )]
    IndivisibleSize { l3_kbytes: u64, cbm_len: u32 },

    #[error("at least two class-of-service ids are required, got {max_cos_ids}")]
    #[diagnostic(
        code(descriptor::too_few_cos_ids),
        help("One id is reserved for the global pool; reservations need another.")
    )]
    TooFewCosIds { max_cos_ids: u32 },
}

/// One distinct cache-sharing topology
///
/// Sockets whose firmware reserves the same way mask share a layout and
/// therefore a single allocation bitmap. Never destroyed: topology does not
/// change at runtime.
#[derive(Debug)]
pub struct CacheLayout {
    pub id: LayoutId,
    /// Ways permanently reserved by firmware/host, never allocable
    pub hw_reserved: WayMask,
    /// Sockets using this layout
    pub ref_count: u32,
}

/// Per-socket state
///
/// `layout` and `occupied_ways` are written under the registration and
/// control locks respectively; `hw` serializes the socket's register
/// synchronization against the scheduler path.
pub struct SocketState {
    layout: AtomicU32,
    /// Admission counter: requested (not placed) ways charged to this socket
    occupied_ways: AtomicU32,
    pub(crate) hw: Mutex<SocketHw>,
}

/// Register-sync state guarded by the socket's hardware lock
pub(crate) struct SocketHw {
    /// Desired global-pool (COS 0) mask: all ways minus active synced ranges
    pub pool_mask: WayMask,
}

impl SocketState {
    pub(crate) fn new() -> Self {
        Self {
            layout: AtomicU32::new(LAYOUT_NONE),
            occupied_ways: AtomicU32::new(0),
            hw: Mutex::new(SocketHw { pool_mask: 0 }),
        }
    }

    /// Layout assigned at bring-up, if the socket is online
    #[inline]
    pub fn layout(&self) -> Option<LayoutId> {
        let id = self.layout.load(Ordering::Acquire);
        (id != LAYOUT_NONE).then_some(id)
    }

    pub(crate) fn assign_layout(&self, id: LayoutId) {
        self.layout.store(id, Ordering::Release);
    }

    #[inline]
    pub fn occupied_ways(&self) -> u32 {
        self.occupied_ways.load(Ordering::Acquire)
    }

    pub(crate) fn charge_ways(&self, ways: u32) {
        self.occupied_ways.fetch_add(ways, Ordering::AcqRel);
    }

    pub(crate) fn release_ways(&self, ways: u32) {
        let prev = self.occupied_ways.fetch_sub(ways, Ordering::AcqRel);
        debug_assert!(prev >= ways, "socket occupancy underflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_valid() {
        let d = CacheDescriptor::default();
        d.validate().unwrap();
        assert_eq!(d.kbytes_per_way(), 1024);
        assert_eq!(d.full_mask().count_ones(), d.cbm_len);
    }

    #[test]
    fn test_descriptor_rejects_bad_geometry() {
        let mut d = CacheDescriptor::default();
        d.cbm_len = 0;
        assert_eq!(d.validate(), Err(DescriptorError::ZeroGeometry));

        let mut d = CacheDescriptor::default();
        d.cbm_len = 65;
        assert!(matches!(d.validate(), Err(DescriptorError::TooManyWays { .. })));

        let mut d = CacheDescriptor::default();
        d.l3_kbytes = 1000;
        d.cbm_len = 16;
        assert!(matches!(
            d.validate(),
            Err(DescriptorError::IndivisibleSize { .. })
        ));

        let mut d = CacheDescriptor::default();
        d.max_cos_ids = 1;
        assert!(matches!(
            d.validate(),
            Err(DescriptorError::TooFewCosIds { .. })
        ));
    }

    #[test]
    fn test_socket_state_defaults() {
        let s = SocketState::new();
        assert_eq!(s.layout(), None);
        assert_eq!(s.occupied_ways(), 0);
        s.charge_ways(3);
        s.release_ways(1);
        assert_eq!(s.occupied_ways(), 2);
    }
}
