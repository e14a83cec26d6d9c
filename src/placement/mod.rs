/*!
 * Contiguous Region Allocator
 *
 * Places a group's combined way total as one contiguous run in every known
 * layout. Strictly two-phase: a find pass proves every layout has room, and
 * only then does a commit pass mutate any bitmap — a failed call leaves no
 * trace, and no rollback of partially-committed layouts ever happens.
 */

use crate::core::bitmap::{range_mask, zero_run};
use crate::core::limits::MAX_LAYOUTS;
use crate::core::types::{LayoutId, WayMask};
use crate::group::{Group, WayRange};
use crate::layout::LayoutRegistry;

/// Allocated-way bitmaps, one per layout id
///
/// Guarded by the control lock together with the entry and group tables.
pub struct WayAllocState {
    ways: [WayMask; MAX_LAYOUTS as usize],
}

/// Placement failure: some layout lacks a contiguous run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Busy {
    pub layout: LayoutId,
    pub needed_ways: u32,
    pub free_ways: u32,
}

impl WayAllocState {
    pub fn new() -> Self {
        Self {
            ways: [0; MAX_LAYOUTS as usize],
        }
    }

    /// Ways currently allocated to any group in `layout`
    #[inline]
    pub fn allocated(&self, layout: LayoutId) -> WayMask {
        self.ways[layout as usize]
    }
}

impl Default for WayAllocState {
    fn default() -> Self {
        Self::new()
    }
}

/// Place `total_ways` contiguous ways for `group` in every known layout
///
/// A range already held by the group is treated as re-spendable: it is
/// masked out of the busy map during the search and released on commit, so
/// a group growing in place charges only its combined total. First-fit
/// lowest address; no compaction on failure.
pub(crate) fn allocate_across_layouts(
    registry: &LayoutRegistry,
    state: &mut WayAllocState,
    group: &Group,
    total_ways: u32,
) -> Result<(), Busy> {
    let cbm_len = registry.descriptor().cbm_len;
    let layouts = registry.layout_masks();

    // Find: every layout must have room before anything is touched.
    let mut placements: Vec<(LayoutId, u32)> = Vec::with_capacity(layouts.len());
    for &(layout, hw_reserved) in &layouts {
        let mut busy = state.ways[layout as usize] | hw_reserved;
        if let Some(seed) = group.range(layout) {
            busy &= !range_mask(seed.start, seed.len);
        }
        match zero_run(busy, cbm_len, total_ways) {
            Some(start) => placements.push((layout, start)),
            None => {
                return Err(Busy {
                    layout,
                    needed_ways: total_ways,
                    free_ways: cbm_len - busy.count_ones(),
                })
            }
        }
    }

    // Commit: release seeds, mark the new runs, publish the ranges.
    for (layout, start) in placements {
        let ways = &mut state.ways[layout as usize];
        if let Some(seed) = group.range(layout) {
            *ways &= !range_mask(seed.start, seed.len);
        }
        *ways |= range_mask(start, total_ways);
        group.set_range(
            layout,
            WayRange {
                start,
                len: total_ways,
            },
        );
    }
    Ok(())
}

/// Release `group`'s placed range in one layout
pub(crate) fn free(state: &mut WayAllocState, group: &Group, layout: LayoutId) {
    if let Some(range) = group.range(layout) {
        state.ways[layout as usize] &= !range_mask(range.start, range.len);
        group.clear_range(layout);
    }
}

/// Release every placed range of `group`
pub(crate) fn free_group_ranges(state: &mut WayAllocState, group: &Group) {
    for layout in 0..MAX_LAYOUTS {
        free(state, group, layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::CacheDescriptor;

    fn registry_16way(reserved: &[(u32, WayMask)]) -> LayoutRegistry {
        let reg = LayoutRegistry::new(CacheDescriptor {
            l3_kbytes: 4096,
            cbm_len: 16,
            cdp_enabled: true,
            max_cos_ids: 16,
        });
        for &(socket, mask) in reserved {
            reg.socket_online(socket, mask);
        }
        reg
    }

    #[test]
    fn test_first_fit_lowest_address() {
        let reg = registry_16way(&[(0, 0)]);
        let mut state = WayAllocState::new();
        let g = Group::new(1, 0b1, 4);
        allocate_across_layouts(&reg, &mut state, &g, 4).unwrap();
        assert_eq!(g.range(0), Some(WayRange { start: 0, len: 4 }));
        assert_eq!(state.allocated(0), 0b1111);
    }

    #[test]
    fn test_hw_reserved_ways_skipped() {
        let reg = registry_16way(&[(0, 0b11)]);
        let mut state = WayAllocState::new();
        let g = Group::new(1, 0b1, 3);
        allocate_across_layouts(&reg, &mut state, &g, 3).unwrap();
        assert_eq!(g.range(0), Some(WayRange { start: 2, len: 3 }));
    }

    #[test]
    fn test_seeded_growth_reuses_own_range() {
        let reg = registry_16way(&[(0, 0)]);
        let mut state = WayAllocState::new();

        let g = Group::new(1, 0b1, 2);
        allocate_across_layouts(&reg, &mut state, &g, 2).unwrap();
        assert_eq!(g.range(0), Some(WayRange { start: 0, len: 2 }));

        // Grow to 5 ways: the old 2-way range is re-spendable, so the
        // combined run lands at the bottom again.
        allocate_across_layouts(&reg, &mut state, &g, 5).unwrap();
        assert_eq!(g.range(0), Some(WayRange { start: 0, len: 5 }));
        assert_eq!(state.allocated(0), 0b11111);
    }

    #[test]
    fn test_failure_mutates_nothing() {
        let reg = registry_16way(&[(0, 0), (1, 0xFF)]);
        let mut state = WayAllocState::new();
        let g = Group::new(1, 0b1, 12);

        // Layout 1 has only 8 free ways; layout 0 could fit.
        let err = allocate_across_layouts(&reg, &mut state, &g, 12).unwrap_err();
        assert_eq!(err.needed_ways, 12);
        assert_eq!(err.free_ways, 8);
        assert_eq!(state.allocated(0), 0);
        assert_eq!(state.allocated(1), 0);
        assert_eq!(g.range(0), None);
        assert_eq!(g.range(1), None);
    }

    #[test]
    fn test_free_returns_ways() {
        let reg = registry_16way(&[(0, 0)]);
        let mut state = WayAllocState::new();
        let g = Group::new(1, 0b1, 4);
        allocate_across_layouts(&reg, &mut state, &g, 4).unwrap();

        free_group_ranges(&mut state, &g);
        assert_eq!(state.allocated(0), 0);
        assert_eq!(g.range(0), None);
    }

    #[test]
    fn test_no_overlap_between_groups() {
        let reg = registry_16way(&[(0, 0b1)]);
        let mut state = WayAllocState::new();
        let a = Group::new(1, 0b1, 6);
        let b = Group::new(2, 0b10, 6);
        allocate_across_layouts(&reg, &mut state, &a, 6).unwrap();
        allocate_across_layouts(&reg, &mut state, &b, 6).unwrap();

        let ra = a.range(0).unwrap();
        let rb = b.range(0).unwrap();
        assert_eq!(
            range_mask(ra.start, ra.len) & range_mask(rb.start, rb.len),
            0
        );

        // Only 3 ways left (15 free minus 12 placed): a third group of 4 fails
        let c = Group::new(3, 0b100, 4);
        assert!(allocate_across_layouts(&reg, &mut state, &c, 4).is_err());
    }
}
