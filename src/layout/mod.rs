/*!
 * Cache Layout Registry
 *
 * Deduplicates hardware cache-sharing topologies: sockets that come online
 * with the same firmware-reserved way mask share one layout id and one
 * allocation bitmap. Registration runs under its own short non-blocking
 * lock because CPU bring-up contexts must never wait on the control path.
 */

mod types;

pub use types::{CacheDescriptor, CacheLayout, DescriptorError, SocketState};

use crate::core::limits::{MAX_LAYOUTS, MAX_SOCKETS};
use crate::core::types::{LayoutId, SocketId, WayMask};
use log::{error, info};
use parking_lot::Mutex;

/// Registry of known layouts plus the per-socket state array
pub struct LayoutRegistry {
    descriptor: CacheDescriptor,
    /// Registration lock; short critical sections only
    layouts: Mutex<Vec<CacheLayout>>,
    sockets: Box<[SocketState]>,
}

impl LayoutRegistry {
    pub fn new(descriptor: CacheDescriptor) -> Self {
        Self {
            descriptor,
            layouts: Mutex::new(Vec::new()),
            sockets: (0..MAX_SOCKETS).map(|_| SocketState::new()).collect(),
        }
    }

    #[inline]
    pub fn descriptor(&self) -> &CacheDescriptor {
        &self.descriptor
    }

    #[inline]
    pub fn socket(&self, socket: SocketId) -> &SocketState {
        &self.sockets[socket as usize]
    }

    /// Layout assigned to `socket`, if it has been brought online
    #[inline]
    pub fn layout_of(&self, socket: SocketId) -> Option<LayoutId> {
        self.sockets.get(socket as usize)?.layout()
    }

    pub fn layout_count(&self) -> u32 {
        self.layouts.lock().len() as u32
    }

    /// Snapshot of `(id, hw_reserved)` for every known layout
    pub(crate) fn layout_masks(&self) -> Vec<(LayoutId, WayMask)> {
        self.layouts
            .lock()
            .iter()
            .map(|l| (l.id, l.hw_reserved))
            .collect()
    }

    /// Bring a socket online with its firmware-reserved way mask
    ///
    /// Finds or creates the layout for the mask and initializes the socket's
    /// global-pool mask to the full way set. Idempotent per socket.
    pub fn socket_online(&self, socket: SocketId, hw_reserved: WayMask) {
        assert!(socket < MAX_SOCKETS, "socket id {socket} out of range");
        let state = &self.sockets[socket as usize];
        if state.layout().is_some() {
            return;
        }

        let hw_reserved = hw_reserved & self.descriptor.full_mask();
        let id = self.find_create_layout(hw_reserved);
        {
            let mut hw = state.hw.lock();
            hw.pool_mask = self.descriptor.full_mask();
        }
        state.assign_layout(id);
        info!(
            "Socket {} online: layout {} (reserved mask {:#x})",
            socket, id, hw_reserved
        );
    }

    fn find_create_layout(&self, hw_reserved: WayMask) -> LayoutId {
        let mut layouts = self.layouts.lock();

        if let Some(layout) = layouts.iter_mut().find(|l| l.hw_reserved == hw_reserved) {
            layout.ref_count += 1;
            return layout.id;
        }

        if layouts.len() as u32 >= MAX_LAYOUTS {
            // Out of layout ids: fall back to sharing the first layout
            // rather than failing bring-up.
            error!(
                "layout id space exhausted ({} layouts); socket shares layout 0",
                MAX_LAYOUTS
            );
            let first = &mut layouts[0];
            first.ref_count += 1;
            return first.id;
        }

        let id = layouts.len() as LayoutId;
        layouts.push(CacheLayout {
            id,
            hw_reserved,
            ref_count: 1,
        });
        id
    }
}
