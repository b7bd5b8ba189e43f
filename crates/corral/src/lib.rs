//! Single-process actor runtime.
//!
//! Each actor owns private state reachable only from its own jobs. A fixed
//! pool of worker threads runs jobs one at a time per actor; a job that
//! awaits releases its worker and re-enters the actor's mailbox when woken,
//! so state may change across any await. Values crossing an actor boundary
//! are checked by the [`Crossable`] validator, and one affinity actor runs
//! its jobs on a single dedicated thread.

mod actor;
mod affinity;
mod capability;
mod class;
mod config;
mod continuation;
mod error;
mod job;
mod mailbox;
mod offload;
mod registry;
mod runtime;
mod scheduler;
mod spawn;
mod timer;
mod token;


pub use actor::{Actor, ActorCx, ActorId, ActorRef, ActorSpec, EventReceiver, Handler};
pub use affinity::AffinityActor;
pub use capability::{Boundary, Capability, CapabilityViolation, Closure, Crossable, SharedMut, check, is_crossable};
pub use class::ThreadClass;
pub use config::{ENV_JOBS_PER_TURN, ENV_OFFLOAD_THREADS, ENV_WORKERS, RuntimeConfig};
pub use continuation::{Continuation, Suspension, YieldNow, bridge, continuation, orphaned_count, yield_now};
pub use error::{ActorError, DoubleResumeError, RuntimeError, StateInvariantViolation};
pub use job::{JobHandle, JobId, current as current_job};
pub use mailbox::MailboxPolicy;
pub use registry::ActorSnapshot;
pub use runtime::{Runtime, RuntimeStats, global, main_actor};
pub use scheduler::{LaneKind, current_lane};
pub use token::CancelToken;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&'static str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"<non-string panic payload>".to_string()
	}
}
