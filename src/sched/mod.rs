/*!
 * Scheduler Synchronization
 *
 * Invoked on every context-switch-in. Register writes are deferred until a
 * task carrying a group actually runs on a socket, then amortized across
 * every task sharing that group via the group's synced-socket bitmap. This
 * path never touches the control lock: it reads the task's group through
 * the RCU slot and serializes only on the socket's own hardware lock.
 *
 * This path cannot return an error to its caller; precondition violations
 * (a group with no placed range for the running socket's layout, a socket
 * that was never brought online) are programming errors and assert.
 */

use crate::core::bitmap::range_mask;
use crate::core::limits::GLOBAL_POOL_COS;
use crate::core::types::{CpuId, Pid, SocketId};
use crate::group::Group;
use crate::reservation::ReservationManager;
use std::sync::Arc;

impl ReservationManager {
    /// Establish hardware state for `pid` switching in on `cpu`
    pub fn sched_in(&self, pid: Pid, cpu: CpuId) {
        let socket = self
            .topology
            .socket_of(cpu)
            .expect("sched_in on a CPU with no known socket");

        // Unregistered tasks run in the global pool like unattached ones.
        let group = self
            .tasks
            .get(&pid)
            .and_then(|t| t.value().current_group());

        match group {
            None => self.sync_pool(socket),
            Some(group) => {
                if group.is_synced(socket) {
                    return;
                }
                self.sync_group(socket, &group);
            }
        }
    }

    /// Bring the socket's COS 0 register back to the global-pool mask
    fn sync_pool(&self, socket: SocketId) {
        let state = self.registry.socket(socket);
        let hw = state.hw.lock();
        assert!(
            state.layout().is_some(),
            "sched_in on socket {socket} before bring-up"
        );
        let current = self.port.read(socket, GLOBAL_POOL_COS);
        if current != hw.pool_mask {
            self.port.write(socket, GLOBAL_POOL_COS, hw.pool_mask);
        }
    }

    /// Write a group's range into its register on this socket, once
    fn sync_group(&self, socket: SocketId, group: &Arc<Group>) {
        let state = self.registry.socket(socket);
        let mut hw = state.hw.lock();
        // Another CPU on this socket may have won the race.
        if group.is_synced(socket) {
            return;
        }

        let layout = state
            .layout()
            .unwrap_or_else(|| panic!("sched_in on socket {socket} before bring-up"));
        let range = group.range(layout).unwrap_or_else(|| {
            panic!(
                "group {} has no placed range for layout {layout} on socket {socket}",
                group.id
            )
        });
        let mask = range_mask(range.start, range.len);

        // The global pool must never overlap an active reservation.
        hw.pool_mask &= !mask;
        let pool = self.port.read(socket, GLOBAL_POOL_COS);
        if pool & mask != 0 {
            self.port.write(socket, GLOBAL_POOL_COS, pool & !mask);
        }

        let current = self.port.read(socket, group.id);
        if current & mask != mask {
            self.port.write(socket, group.id, current | mask);
        }

        group.mark_synced(socket);
    }
}
