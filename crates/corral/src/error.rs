//! Error types for submission, job results and runtime construction.

use thiserror::Error;

use crate::ActorId;
use crate::capability::CapabilityViolation;

/// Recoverable errors surfaced by submission and by job handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActorError {
	/// A value failed the capability check at an isolation boundary.
	#[error(transparent)]
	Capability(#[from] CapabilityViolation),

	/// The job observed its cancellation token at a suspension point.
	#[error("job cancelled")]
	Cancelled,

	/// The continuation a job was waiting on was dropped without being resumed.
	#[error("continuation dropped without being resumed")]
	OrphanedContinuation,

	/// The target actor's bounded mailbox is at capacity.
	#[error("actor mailbox full")]
	MailboxFull,

	/// The target actor no longer accepts submissions.
	#[error("actor mailbox closed")]
	MailboxClosed,

	/// Job code panicked; the payload message is preserved.
	#[error("job panicked: {0}")]
	Panicked(String),

	/// The job was dropped before producing a result, e.g. during shutdown.
	#[error("job aborted before completion")]
	Aborted,

	/// A blocking wait was attempted from inside a job.
	#[error("blocking wait attempted from inside a job")]
	WouldBlock,

	/// Domain failure raised by job code.
	#[error("{0}")]
	Failed(String),
}

impl ActorError {
	/// Creates a domain failure.
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}

	/// Returns true for [`ActorError::Cancelled`].
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}
}

/// A continuation was resumed a second time.
///
/// Always fatal through [`Continuation::resume`](crate::Continuation::resume);
/// returned as a value only by the `try_resume*` family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("continuation {id} resumed twice")]
pub struct DoubleResumeError {
	/// Id of the offending continuation.
	pub id: u64,
}

/// Violations of the per-actor mutual exclusion invariant. Always fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateInvariantViolation {
	/// A worker tried to activate an actor that already had an active job.
	#[error("{actor} already has an active job")]
	ConcurrentActivation {
		/// The actor whose invariant broke.
		actor: ActorId,
	},

	/// Actor state was touched from outside one of that actor's jobs.
	#[error("{actor} state accessed outside of its own jobs")]
	AccessOutsideJob {
		/// The actor whose state was touched.
		actor: ActorId,
	},

	/// A job re-entered its own actor's state while already holding it.
	#[error("{actor} state accessed re-entrantly")]
	NestedAccess {
		/// The actor whose state was re-entered.
		actor: ActorId,
	},
}

/// Errors building a runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
	/// A runtime thread could not be spawned.
	#[error("failed to spawn runtime thread: {0}")]
	Spawn(#[from] std::io::Error),

	/// A configuration value is invalid.
	#[error("invalid configuration for {key}: {reason}")]
	InvalidConfig {
		/// Configuration key or environment variable.
		key: String,
		/// Why the value was rejected.
		reason: String,
	},
}

/// Logs and raises a fatal runtime condition.
#[track_caller]
pub(crate) fn fatal(err: impl std::fmt::Display) -> ! {
	tracing::error!(error = %err, "runtime.fatal");
	panic!("fatal runtime error: {err}")
}
