/*!
 * Reservation Operations
 * Create, delete, attach, detach, list — the control path
 */

use super::{AllocState, ReservationManager, Task};
use crate::core::bitmap::range_mask;
use crate::core::errors::ReservationError;
use crate::core::types::{CpuSet, EntryId, EntrySet, Pid, ReservationResult, SocketSet};
use crate::entry::{CacheEntry, ReservationInfo, ReservationKind, RoundPolicy};
use crate::group::Group;
use crate::placement;
use log::{info, warn};
use std::sync::Arc;

impl ReservationManager {
    /// Create a reservation sized over `cpus`
    ///
    /// Returns the allocated id and the granularity-rounded size. No way
    /// range is placed yet; placement happens when a task attaches.
    pub fn create_reservation(
        &self,
        cpus: CpuSet,
        size_kbytes: u64,
        kind: ReservationKind,
        round: RoundPolicy,
    ) -> ReservationResult<(EntryId, u64)> {
        let desc = *self.registry.descriptor();
        if kind != ReservationKind::Both && !desc.cdp_enabled {
            return Err(ReservationError::Unsupported);
        }

        let way_kbytes = desc.kbytes_per_way();
        let rounded = match round {
            RoundPolicy::Up => size_kbytes.div_ceil(way_kbytes) * way_kbytes,
            RoundPolicy::Down => size_kbytes / way_kbytes * way_kbytes,
        };
        let way_count = (rounded / way_kbytes) as u32;
        if rounded > desc.l3_kbytes || way_count == 0 {
            return Err(ReservationError::NoSpace {
                needed_ways: way_count,
                free_ways: desc.cbm_len,
            });
        }

        let mut st = self.state.lock();

        // Admission: every CPU must resolve to an online socket with room.
        // Any failure fails the whole call before anything is charged.
        let mut sockets: SocketSet = 0;
        for cpu in cpus.iter() {
            let Some(socket) = self.topology.socket_of(cpu) else {
                warn!("create_reservation: CPU {} is offline", cpu);
                return Err(ReservationError::NoSpace {
                    needed_ways: way_count,
                    free_ways: 0,
                });
            };
            sockets |= 1u64 << socket;
        }
        let mut bits = sockets;
        while bits != 0 {
            let socket = bits.trailing_zeros();
            bits &= bits - 1;
            let state = self.registry.socket(socket);
            if state.layout().is_none() {
                warn!("create_reservation: socket {} not online", socket);
                return Err(ReservationError::NoSpace {
                    needed_ways: way_count,
                    free_ways: 0,
                });
            }
            let free = desc.cbm_len - state.occupied_ways();
            if way_count > free {
                return Err(ReservationError::NoSpace {
                    needed_ways: way_count,
                    free_ways: free,
                });
            }
        }

        // CDP hardware keeps separate code/data masks per class; the logical
        // entry always charges both, so the stored kind is normalized.
        let id = st.entries.alloc(CacheEntry {
            id: 0,
            requested_kbytes: size_kbytes,
            rounded_kbytes: rounded,
            way_count,
            kind: ReservationKind::Both,
            cpus,
            sockets,
            member_of: 0,
        })?;

        let mut bits = sockets;
        while bits != 0 {
            let socket = bits.trailing_zeros();
            bits &= bits - 1;
            self.registry.socket(socket).charge_ways(way_count);
        }

        info!(
            "Created reservation {}: {} KB requested, {} KB ({} ways) over {} CPUs",
            id,
            size_kbytes,
            rounded,
            way_count,
            cpus.len()
        );
        Ok((id, rounded))
    }

    /// Delete a reservation
    ///
    /// Strip-then-delete: every task attached to a group referencing this
    /// entry is first retargeted to the group for the reduced member set
    /// (creating it on demand, back to the global pool when the set empties),
    /// then the entry itself is freed. Deletion is never rejected for being
    /// referenced.
    pub fn delete_reservation(&self, id: EntryId) -> ReservationResult<()> {
        let mut st = self.state.lock();

        loop {
            let member_of = st.entries.get(id)?.member_of;
            if member_of == 0 {
                break;
            }
            let gid = member_of.trailing_zeros();
            let Some(group) = st.groups.get(gid) else {
                // Membership bit without a live group: tables out of sync
                debug_assert!(false, "entry {id} references dead group {gid}");
                st.entries.clear_members(1u64 << id, gid);
                continue;
            };
            let reduced = group.members() & !(1u64 << id);
            self.strip_group_locked(&mut st, &group, reduced);
        }

        let entry = st.entries.free(id)?;
        let mut bits = entry.sockets;
        while bits != 0 {
            let socket = bits.trailing_zeros();
            bits &= bits - 1;
            self.registry.socket(socket).release_ways(entry.way_count);
        }

        info!(
            "Deleted reservation {}: released {} ways on {} socket(s)",
            id,
            entry.way_count,
            entry.sockets.count_ones()
        );
        Ok(())
    }

    /// Attach a reservation to a task
    pub fn attach_reservation(&self, pid: Pid, id: EntryId) -> ReservationResult<()> {
        let task = self.task(pid)?;
        let mut st = self.state.lock();
        st.entries.get(id)?;

        let current = task.cos.load().map_or(0, |g| g.members());
        if current & (1u64 << id) != 0 {
            return Err(ReservationError::AlreadyAttached { pid, id });
        }

        self.retarget_locked(&mut st, &task, current | (1u64 << id))?;
        info!("Attached reservation {} to task {}", id, pid);
        Ok(())
    }

    /// Detach a reservation from a task
    ///
    /// An emptied set returns the task to the global pool. Like attach, a
    /// shrinking task may need a fresh group placement (when others still
    /// share its old group), so this can fail with `NoSpace`.
    pub fn detach_reservation(&self, pid: Pid, id: EntryId) -> ReservationResult<()> {
        let task = self.task(pid)?;
        let mut st = self.state.lock();
        st.entries.get(id)?;

        let current = task.cos.load().map_or(0, |g| g.members());
        if current & (1u64 << id) == 0 {
            return Err(ReservationError::NotAttached { pid, id });
        }

        self.retarget_locked(&mut st, &task, current & !(1u64 << id))?;
        info!("Detached reservation {} from task {}", id, pid);
        Ok(())
    }

    /// Enumerate live reservations
    ///
    /// `capacity` models the caller's buffer; when insufficient, the error
    /// carries the required size so the caller can retry.
    pub fn list_reservations(&self, capacity: usize) -> ReservationResult<Vec<ReservationInfo>> {
        let st = self.state.lock();
        let required = st.entries.live_count() as usize;
        if required > capacity {
            return Err(ReservationError::BufferTooSmall { required });
        }
        Ok(st
            .entries
            .iter_live()
            .map(|e| ReservationInfo {
                id: e.id,
                kbytes: e.rounded_kbytes,
                kind: e.kind,
                cpus: e.cpus,
            })
            .collect())
    }

    /// Move `task` to the group matching `desired`, creating it on demand
    ///
    /// The single state transition behind attach, detach, and delete-strip:
    /// find-or-create preserves group uniqueness, and a task leaving a group
    /// it held alone hands that group's placed ranges to the successor so
    /// growing or shrinking reuses the ways already spent.
    pub(crate) fn retarget_locked(
        &self,
        st: &mut AllocState,
        task: &Arc<Task>,
        desired: EntrySet,
    ) -> ReservationResult<()> {
        let old = task.cos.load();

        if desired == 0 {
            task.cos.store(None);
            task.kick();
            if let Some(old_group) = old {
                self.put_group_locked(st, &old_group, task.pid);
            }
            return Ok(());
        }

        if let Some(found) = st.groups.find_by_members(desired) {
            // Space is already placed for this member set; no allocation.
            found.add_task(task.pid);
            task.cos.store(Some(Arc::clone(&found)));
            task.kick();
            if let Some(old_group) = old {
                self.put_group_locked(st, &old_group, task.pid);
            }
            return Ok(());
        }

        let sole_owner = old.as_ref().is_some_and(|g| g.task_count() == 1);
        let total_ways = st.entries.way_total(desired);
        let gid = st.groups.alloc_id()?;
        let group = Arc::new(Group::new(gid, desired, total_ways));
        if sole_owner {
            if let Some(ref old_group) = old {
                // The old group dies with this move; its ways are re-spendable.
                group.seed_ranges_from(old_group);
            }
        }

        if let Err(busy) =
            placement::allocate_across_layouts(&self.registry, &mut st.ways, &group, total_ways)
        {
            st.groups.release(gid);
            warn!(
                "No contiguous {}-way run in layout {} ({} ways free) for task {}",
                busy.needed_ways, busy.layout, busy.free_ways, task.pid
            );
            return Err(ReservationError::NoSpace {
                needed_ways: busy.needed_ways,
                free_ways: busy.free_ways,
            });
        }
        if sole_owner {
            if let Some(ref old_group) = old {
                // Ranges were handed over; the dying group must not free them.
                old_group.forget_ranges();
            }
        }

        st.entries.mark_members(desired, gid);
        st.groups.install(Arc::clone(&group));
        group.add_task(task.pid);
        task.cos.store(Some(group));
        task.kick();
        if let Some(old_group) = old {
            self.put_group_locked(st, &old_group, task.pid);
        }
        Ok(())
    }

    /// Drop `pid`'s reference on `group`, destroying it at zero
    pub(crate) fn put_group_locked(&self, st: &mut AllocState, group: &Arc<Group>, pid: Pid) {
        if group.remove_task(pid) == 0 {
            self.destroy_group_locked(st, group);
        }
    }

    /// Retarget every task of `group` to `reduced`, destroying the group
    ///
    /// Used by delete-strip. A task whose reduced placement cannot be made
    /// falls back to the global pool; stripping never blocks deletion.
    fn strip_group_locked(&self, st: &mut AllocState, group: &Arc<Group>, reduced: EntrySet) {
        let pids = group.task_pids();
        if pids.is_empty() {
            // A live group always has tasks; destroy defensively.
            debug_assert!(false, "group {} live without tasks", group.id);
            self.destroy_group_locked(st, group);
            return;
        }
        for pid in pids {
            let Ok(task) = self.task(pid) else {
                self.put_group_locked(st, group, pid);
                continue;
            };
            if let Err(err) = self.retarget_locked(st, &task, reduced) {
                warn!(
                    "Task {} cannot keep reduced reservation set ({}); moving to global pool",
                    pid, err
                );
                let _ = self.retarget_locked(st, &task, 0);
            }
        }
    }

    /// Tear a group down once its last task is gone
    ///
    /// Returns its synced ranges to each socket's global-pool mask, frees
    /// the placed ranges, clears entry memberships, and recycles the id.
    /// Any scheduler still holding the `Arc` keeps reading intact (if stale)
    /// fields until it drops the reference.
    fn destroy_group_locked(&self, st: &mut AllocState, group: &Arc<Group>) {
        let mut sockets = group.synced_sockets();
        while sockets != 0 {
            let socket = sockets.trailing_zeros();
            sockets &= sockets - 1;
            let Some(layout) = self.registry.layout_of(socket) else {
                continue;
            };
            if let Some(range) = group.range(layout) {
                let state = self.registry.socket(socket);
                let mut hw = state.hw.lock();
                hw.pool_mask |= range_mask(range.start, range.len);
            }
        }

        placement::free_group_ranges(&mut st.ways, group);
        st.entries.clear_members(group.members(), group.id);
        st.groups.release(group.id);
        info!("Group {} destroyed, ranges released", group.id);
    }
}
