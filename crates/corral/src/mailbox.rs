use std::collections::VecDeque;

use parking_lot::Mutex;

/// Capacity policy for an actor mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailboxPolicy {
	/// Accept every submission.
	#[default]
	Unbounded,
	/// Reject new submissions once this many jobs are queued.
	Bounded(usize),
}

/// Mailbox send error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSendError {
	/// Mailbox is closed.
	Closed,
	/// Queue is at capacity.
	Full,
}

struct MailboxState<T> {
	queue: VecDeque<T>,
	closed: bool,
}

/// Per-actor FIFO of pending jobs.
///
/// Fresh submissions honor the capacity policy and the closed flag. Resumed
/// work always re-enters at the tail, since refusing it would strand a job
/// that already started.
pub(crate) struct Mailbox<T> {
	policy: MailboxPolicy,
	state: Mutex<MailboxState<T>>,
}

impl<T> Mailbox<T> {
	/// Creates an empty mailbox.
	///
	/// # Panics
	///
	/// Panics if the policy is `Bounded(0)`.
	pub fn new(policy: MailboxPolicy) -> Self {
		if let MailboxPolicy::Bounded(capacity) = policy {
			assert!(capacity > 0, "mailbox capacity must be > 0");
		}
		Self {
			policy,
			state: Mutex::new(MailboxState {
				queue: VecDeque::new(),
				closed: false,
			}),
		}
	}

	/// Enqueues a fresh submission. Returns the item on rejection.
	pub fn push(&self, item: T) -> Result<(), (MailboxSendError, T)> {
		let mut state = self.state.lock();
		if state.closed {
			return Err((MailboxSendError::Closed, item));
		}
		if let MailboxPolicy::Bounded(capacity) = self.policy
			&& state.queue.len() >= capacity
		{
			return Err((MailboxSendError::Full, item));
		}
		state.queue.push_back(item);
		Ok(())
	}

	/// Enqueues resumed work, bypassing capacity and the closed flag.
	pub fn push_resumed(&self, item: T) {
		self.state.lock().queue.push_back(item);
	}

	/// Pops the head item.
	pub fn pop(&self) -> Option<T> {
		self.state.lock().queue.pop_front()
	}

	/// Stops accepting fresh submissions. Queued items still drain.
	pub fn close(&self) {
		self.state.lock().closed = true;
	}

	/// Closes the mailbox and removes everything queued.
	///
	/// Items are returned so the caller drops them outside the lock.
	pub fn close_and_drain(&self) -> Vec<T> {
		let mut state = self.state.lock();
		state.closed = true;
		state.queue.drain(..).collect()
	}

	/// Returns whether fresh submissions are refused.
	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	/// Returns current queue length.
	pub fn len(&self) -> usize {
		self.state.lock().queue.len()
	}

	/// Returns true when nothing is queued.
	pub fn is_empty(&self) -> bool {
		self.state.lock().queue.is_empty()
	}
}
