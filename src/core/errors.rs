/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use super::types::{EntryId, Pid};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reservation-related errors with serialization support
///
/// Resource exhaustion and invalid references are recoverable and reported
/// to the caller with no state mutated; invariant violations on the
/// scheduler path assert instead of surfacing here.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ReservationError {
    #[error("insufficient cache capacity: need {needed_ways} ways, {free_ways} available")]
    #[diagnostic(
        code(reservation::no_space),
        help("Shrink the reservation, free others, or retry on a less loaded socket.")
    )]
    NoSpace { needed_ways: u32, free_ways: u32 },

    #[error("id space exhausted")]
    #[diagnostic(
        code(reservation::out_of_ids),
        help("Delete unused reservations or detach tasks to reclaim class-of-service ids.")
    )]
    OutOfIds,

    #[error("reservation type requires code/data prioritization, which is disabled")]
    #[diagnostic(
        code(reservation::unsupported),
        help("Request a combined code+data reservation, or enable CDP in the descriptor.")
    )]
    Unsupported,

    #[error("reservation {0} not found")]
    #[diagnostic(
        code(reservation::invalid_id),
        help("The reservation may have been deleted or never existed.")
    )]
    InvalidId(EntryId),

    #[error("reservation {id} already attached to task {pid}")]
    #[diagnostic(code(reservation::already_attached))]
    AlreadyAttached { pid: Pid, id: EntryId },

    #[error("reservation {id} not attached to task {pid}")]
    #[diagnostic(code(reservation::not_attached))]
    NotAttached { pid: Pid, id: EntryId },

    #[error("task {0} not registered")]
    #[diagnostic(
        code(reservation::no_such_process),
        help("Register the task before attaching reservations to it.")
    )]
    NoSuchProcess(Pid),

    #[error("list buffer too small: {required} entries required")]
    #[diagnostic(
        code(reservation::buffer_too_small),
        help("Retry with at least the reported capacity.")
    )]
    BufferTooSmall { required: usize },
}
