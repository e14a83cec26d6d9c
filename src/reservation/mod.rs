/*!
 * Reservation Manager
 *
 * The public face of the allocator: create/delete/attach/detach/list plus
 * task registration and bring-up delegation. All control-path state — entry
 * table, group table, way bitmaps — lives behind a single lock; the
 * scheduler path (see `sched`) never takes it.
 */

mod operations;
mod task;
mod types;

pub use task::Task;
pub use types::{LayoutStats, ManagerStats, SocketStats};

use crate::core::errors::ReservationError;
use crate::core::limits::MAX_SOCKETS;
use crate::core::types::{Pid, ReservationResult, SocketId, WayMask};
use crate::entry::EntryTable;
use crate::group::GroupTable;
use crate::hw::{CosPort, TopologyMap};
use crate::layout::{CacheDescriptor, DescriptorError, LayoutRegistry};
use crate::placement::WayAllocState;
use ahash::RandomState;
use dashmap::DashMap;
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;

/// Everything the control-path lock guards
pub(crate) struct AllocState {
    pub entries: EntryTable,
    pub groups: GroupTable,
    pub ways: WayAllocState,
}

/// Cache-way partitioning allocator
pub struct ReservationManager {
    pub(crate) state: Mutex<AllocState>,
    pub(crate) registry: LayoutRegistry,
    /// pid → task; sharded so scheduler-path lookups stay cheap
    pub(crate) tasks: DashMap<Pid, Arc<Task>, RandomState>,
    pub(crate) topology: Arc<dyn TopologyMap>,
    pub(crate) port: Arc<dyn CosPort>,
}

impl ReservationManager {
    /// Build a manager for the described hardware
    ///
    /// Sockets still need `socket_online` before reservations can be
    /// admitted against them.
    pub fn new(
        descriptor: CacheDescriptor,
        topology: Arc<dyn TopologyMap>,
        port: Arc<dyn CosPort>,
    ) -> Result<Self, DescriptorError> {
        descriptor.validate()?;
        info!(
            "Reservation manager initialized: {} KB L3, {} ways ({} KB/way), CDP {}",
            descriptor.l3_kbytes,
            descriptor.cbm_len,
            descriptor.kbytes_per_way(),
            if descriptor.cdp_enabled { "on" } else { "off" },
        );
        Ok(Self {
            state: Mutex::new(AllocState {
                entries: EntryTable::new(),
                groups: GroupTable::new(descriptor.max_cos_ids),
                ways: WayAllocState::new(),
            }),
            registry: LayoutRegistry::new(descriptor),
            tasks: DashMap::with_hasher(RandomState::new()),
            topology,
            port,
        })
    }

    #[inline]
    pub fn descriptor(&self) -> &CacheDescriptor {
        self.registry.descriptor()
    }

    /// Bring a socket online (hotplug glue entry point)
    pub fn socket_online(&self, socket: SocketId, hw_reserved: WayMask) {
        self.registry.socket_online(socket, hw_reserved);
    }

    /// Make a task known to the allocator; idempotent per pid
    pub fn register_task(&self, pid: Pid) -> Arc<Task> {
        Arc::clone(
            self.tasks
                .entry(pid)
                .or_insert_with(|| Arc::new(Task::new(pid)))
                .value(),
        )
    }

    /// Forget a task, detaching it from any group it still references
    pub fn unregister_task(&self, pid: Pid) -> ReservationResult<()> {
        let (_, task) = self
            .tasks
            .remove(&pid)
            .ok_or(ReservationError::NoSuchProcess(pid))?;
        if task.current_group().is_some() {
            let mut st = self.state.lock();
            self.retarget_locked(&mut st, &task, 0)?;
        }
        Ok(())
    }

    /// Resolve a registered task
    pub fn task(&self, pid: Pid) -> ReservationResult<Arc<Task>> {
        self.tasks
            .get(&pid)
            .map(|e| Arc::clone(e.value()))
            .ok_or(ReservationError::NoSuchProcess(pid))
    }

    /// Point-in-time allocator snapshot
    pub fn stats(&self) -> ManagerStats {
        let st = self.state.lock();
        let desc = self.registry.descriptor();

        let sockets = (0..MAX_SOCKETS)
            .filter_map(|socket| {
                let state = self.registry.socket(socket);
                state.layout().map(|layout| SocketStats {
                    socket,
                    layout,
                    occupied_ways: state.occupied_ways(),
                    free_ways: desc.cbm_len - state.occupied_ways(),
                })
            })
            .collect();

        let layouts = self
            .registry
            .layout_masks()
            .into_iter()
            .map(|(layout, hw_reserved)| LayoutStats {
                layout,
                placed_ways: st.ways.allocated(layout).count_ones(),
                hw_reserved_ways: hw_reserved.count_ones(),
            })
            .collect();

        ManagerStats {
            entries_used: st.entries.live_count(),
            groups_live: st.groups.live_count(),
            layouts_known: self.registry.layout_count(),
            sockets,
            layouts,
        }
    }
}
