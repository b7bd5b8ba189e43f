use crate::MailboxPolicy;
use crate::actor::Actor;

/// Builder spec for one actor.
///
/// Unset options fall back to the runtime's [`RuntimeConfig`](crate::RuntimeConfig)
/// defaults.
pub struct ActorSpec<A: Actor> {
	pub(crate) name: String,
	pub(crate) state: A,
	pub(crate) mailbox: Option<MailboxPolicy>,
	pub(crate) event_buffer: Option<usize>,
	pub(crate) pinned: bool,
}

impl<A: Actor> ActorSpec<A> {
	/// Creates a spec owning the actor's initial state.
	pub fn new(name: impl Into<String>, state: A) -> Self {
		Self {
			name: name.into(),
			state,
			mailbox: None,
			event_buffer: None,
			pinned: false,
		}
	}

	/// Sets the mailbox policy.
	///
	/// # Panics
	///
	/// Panics if the policy is `Bounded(0)`.
	#[must_use]
	pub fn mailbox(mut self, policy: MailboxPolicy) -> Self {
		if let MailboxPolicy::Bounded(capacity) = policy {
			assert!(capacity > 0, "mailbox capacity must be > 0");
		}
		self.mailbox = Some(policy);
		self
	}

	/// Sets the event broadcast buffer.
	///
	/// # Panics
	///
	/// Panics if `size` is zero.
	#[must_use]
	pub fn event_buffer(mut self, size: usize) -> Self {
		assert!(size > 0, "event buffer size must be > 0");
		self.event_buffer = Some(size);
		self
	}

	/// Runs the actor's jobs on the affinity worker instead of the pool.
	#[must_use]
	pub fn pinned(mut self) -> Self {
		self.pinned = true;
		self
	}

	/// Actor name.
	pub fn name(&self) -> &str {
		&self.name
	}
}
