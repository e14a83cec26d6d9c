/*!
 * Simulated Hardware
 *
 * In-memory register bank and static topology used by tests and by
 * hardware-free deployments, the same way the in-memory VFS backs the file
 * layer. The register bank keeps one atomic word per (socket, cos) pair so
 * concurrent scheduler-path accesses stay lock-free.
 */

use super::traits::{CosPort, TopologyMap};
use crate::core::limits::{COS_ID_SPACE, MAX_SOCKETS};
use crate::core::types::{CpuId, GroupId, SocketId, WayMask};
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory COS register bank
pub struct SimCosBank {
    regs: Vec<Vec<AtomicU64>>,
}

impl SimCosBank {
    /// Bank covering every representable socket, all registers zeroed
    pub fn new() -> Self {
        let regs = (0..MAX_SOCKETS)
            .map(|_| (0..COS_ID_SPACE).map(|_| AtomicU64::new(0)).collect())
            .collect();
        Self { regs }
    }
}

impl Default for SimCosBank {
    fn default() -> Self {
        Self::new()
    }
}

impl CosPort for SimCosBank {
    fn read(&self, socket: SocketId, cos: GroupId) -> WayMask {
        self.regs[socket as usize][cos as usize].load(Ordering::Acquire)
    }

    fn write(&self, socket: SocketId, cos: GroupId, mask: WayMask) {
        self.regs[socket as usize][cos as usize].store(mask, Ordering::Release);
    }
}

/// Fixed CPU-to-socket mapping
pub struct StaticTopology {
    cpu_to_socket: Vec<Option<SocketId>>,
}

impl StaticTopology {
    /// Build from explicit `(cpu, socket)` pairs; unlisted CPUs are offline
    pub fn from_pairs(pairs: &[(CpuId, SocketId)]) -> Self {
        let max_cpu = pairs.iter().map(|&(c, _)| c).max().unwrap_or(0);
        let mut cpu_to_socket = vec![None; max_cpu as usize + 1];
        for &(cpu, socket) in pairs {
            cpu_to_socket[cpu as usize] = Some(socket);
        }
        Self { cpu_to_socket }
    }

    /// `sockets` packages with `cpus_per_socket` consecutively numbered CPUs each
    pub fn uniform(sockets: u32, cpus_per_socket: u32) -> Self {
        let cpu_to_socket = (0..sockets * cpus_per_socket)
            .map(|cpu| Some(cpu / cpus_per_socket))
            .collect();
        Self { cpu_to_socket }
    }
}

impl TopologyMap for StaticTopology {
    fn socket_of(&self, cpu: CpuId) -> Option<SocketId> {
        self.cpu_to_socket.get(cpu as usize).copied().flatten()
    }
}
