use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Monotonic id clock, usable as a `static`.
#[derive(Debug, Default)]
pub(crate) struct SequenceClock {
	next: AtomicU64,
}

impl SequenceClock {
	/// Creates a new clock whose first id is 1.
	pub const fn new() -> Self {
		Self { next: AtomicU64::new(0) }
	}

	/// Returns the next id.
	pub fn next(&self) -> u64 {
		self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
	}
}

/// Cooperative cancellation token attached to a job at submission.
///
/// Cancelling never interrupts code between suspension points. The job
/// observes the request at its next suspension point and unwinds with
/// [`ActorError::Cancelled`](crate::ActorError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
	inner: CancellationToken,
}

impl CancelToken {
	/// Creates a fresh, uncancelled token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests cancellation of every job holding this token or a child of it.
	pub fn cancel(&self) {
		self.inner.cancel();
	}

	/// Returns true when cancellation has been requested.
	pub fn is_cancelled(&self) -> bool {
		self.inner.is_cancelled()
	}

	/// Future resolving when cancellation is requested.
	pub async fn cancelled(&self) {
		self.inner.cancelled().await;
	}

	/// Creates a child token, cancelled together with this one.
	pub fn child(&self) -> Self {
		Self {
			inner: self.inner.child_token(),
		}
	}
}
