/*!
 * waypart
 *
 * Cache-way partitioning allocator: divides a shared last-level cache into
 * named reservations and maps the combinations of reservations used by
 * running tasks onto the hardware's class-of-service bitmask registers.
 *
 * Reservations are sized in cache ways at creation and placed as contiguous
 * way ranges when a task attaches them. Tasks with identical reservation
 * sets share one class of service; register writes happen lazily, on the
 * first context switch of a sharing task onto each socket.
 */

pub mod core;
pub mod entry;
pub mod group;
pub mod hw;
pub mod layout;
pub mod placement;
pub mod reservation;
pub mod sched;

// Re-exports
pub use crate::core::errors::ReservationError;
pub use crate::core::types::{CpuId, CpuSet, EntryId, GroupId, Pid, ReservationResult, SocketId};
pub use entry::{ReservationInfo, ReservationKind, RoundPolicy};
pub use hw::{CosPort, SimCosBank, StaticTopology, TopologyMap};
pub use layout::{CacheDescriptor, DescriptorError};
pub use reservation::{LayoutStats, ManagerStats, ReservationManager, SocketStats, Task};
