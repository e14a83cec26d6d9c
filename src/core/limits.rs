/*!
 * System Limits and Constants
 *
 * Centralized location for all capacity constants and hardware bounds.
 * All values include rationale comments explaining WHY they exist.
 */

// =============================================================================
// CAPACITY BITMASK GEOMETRY
// =============================================================================

/// Width of a capacity bitmask register, one bit per cache way (64 bits)
/// Also bounds the reservation-id space: at most one reservation per way
/// in the degenerate case, so the entry table never needs more slots.
pub const CBM_LEN: u32 = 64;

/// Distinct cache-sharing topologies supported concurrently (10 layouts)
/// Sockets with identical firmware-reserved way masks share a layout.
pub const MAX_LAYOUTS: u32 = 10;

/// Class-of-service id space (128 slots)
/// Upper bound on simultaneously-live groups; real hardware exposes fewer
/// COS registers, configured via `CacheDescriptor::max_cos_ids`.
pub const COS_ID_SPACE: u32 = 128;

/// COS id reserved for the global task pool
/// Never allocated to a group; unattached tasks run under this class.
pub const GLOBAL_POOL_COS: u32 = 0;

// =============================================================================
// TOPOLOGY BOUNDS
// =============================================================================

/// Maximum physical sockets tracked (64)
/// Bounds the per-socket state array and lets socket sets fit one u64.
pub const MAX_SOCKETS: u32 = 64;

/// Maximum logical CPUs representable in a `CpuSet` (256)
pub const MAX_CPUS: u32 = 256;

/// Words backing a `CpuSet` bitmap
pub const CPU_SET_WORDS: usize = (MAX_CPUS as usize) / 64;

// =============================================================================
// DEFAULT HARDWARE DESCRIPTION
// =============================================================================

/// Default last-level cache size (20 MB)
pub const DEFAULT_L3_KBYTES: u64 = 20 * 1024;

/// Default capacity bitmask length (20 ways)
/// Typical for server parts with a 20 MB L3: 1 MB per way.
pub const DEFAULT_CBM_LEN: u32 = 20;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_bounds() {
        // Entry sets are stored in a u64, group sets in a u128
        assert!(CBM_LEN <= 64);
        assert!(COS_ID_SPACE <= 128);
        // Socket sets fit one word
        assert!(MAX_SOCKETS <= 64);
        assert_eq!(CPU_SET_WORDS * 64, MAX_CPUS as usize);
    }

    #[test]
    fn test_default_descriptor_divides_evenly() {
        assert_eq!(DEFAULT_L3_KBYTES % DEFAULT_CBM_LEN as u64, 0);
        assert!(DEFAULT_CBM_LEN <= CBM_LEN);
    }
}
