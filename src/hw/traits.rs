/*!
 * Hardware Interfaces
 * The two seams to the platform glue: COS register access and CPU topology
 */

use crate::core::types::{CpuId, GroupId, SocketId, WayMask};

/// Access to the per-socket capacity-bitmask register bank
///
/// One register per class-of-service id. Implementations wrap the raw MSR
/// primitives; reads and writes must be safe to issue from the context-switch
/// path (no blocking, no allocation).
pub trait CosPort: Send + Sync {
    /// Read the capacity bitmask of `cos` on `socket`
    fn read(&self, socket: SocketId, cos: GroupId) -> WayMask;

    /// Write the capacity bitmask of `cos` on `socket`
    fn write(&self, socket: SocketId, cos: GroupId, mask: WayMask);
}

/// CPU to physical-package mapping
pub trait TopologyMap: Send + Sync {
    /// Socket of `cpu`, or `None` while the CPU is offline or unknown
    fn socket_of(&self, cpu: CpuId) -> Option<SocketId>;

    /// True when the CPU is online
    #[inline]
    fn is_online(&self, cpu: CpuId) -> bool {
        self.socket_of(cpu).is_some()
    }
}
