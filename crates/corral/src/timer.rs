//! Deadline wakeups for suspended jobs, served by one dedicated thread.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::continuation::{Continuation, Suspension, continuation};
use crate::ActorError;

struct Entry {
	deadline: Instant,
	seq: u64,
	continuation: Continuation<()>,
}

impl PartialEq for Entry {
	fn eq(&self, other: &Self) -> bool {
		self.deadline == other.deadline && self.seq == other.seq
	}
}

impl Eq for Entry {}

impl PartialOrd for Entry {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

// Reversed so the max-heap pops the earliest deadline first.
impl Ord for Entry {
	fn cmp(&self, other: &Self) -> Ordering {
		other.deadline.cmp(&self.deadline).then_with(|| other.seq.cmp(&self.seq))
	}
}

struct TimerState {
	entries: BinaryHeap<Entry>,
	next_seq: u64,
	shutdown: bool,
}

pub(crate) struct Timer {
	state: Mutex<TimerState>,
	wake: Condvar,
}

impl Timer {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(TimerState {
				entries: BinaryHeap::new(),
				next_seq: 0,
				shutdown: false,
			}),
			wake: Condvar::new(),
		})
	}

	/// Returns a suspension resumed once `deadline` passes.
	///
	/// After shutdown the suspension resolves immediately with
	/// [`ActorError::Aborted`].
	pub fn schedule(&self, deadline: Instant) -> Suspension<()> {
		let (continuation, suspension) = continuation();
		let mut state = self.state.lock();
		if state.shutdown {
			drop(state);
			continuation.resume_err(ActorError::Aborted);
			return suspension;
		}
		let seq = state.next_seq;
		state.next_seq += 1;
		state.entries.push(Entry { deadline, seq, continuation });
		drop(state);
		self.wake.notify_one();
		suspension
	}

	/// Number of armed deadlines.
	pub fn pending(&self) -> usize {
		self.state.lock().entries.len()
	}

	/// Timer thread body. Returns after [`Timer::shutdown`].
	pub fn run(&self) {
		tracing::debug!("timer.start");
		let mut state = self.state.lock();
		loop {
			if state.shutdown {
				break;
			}
			let now = Instant::now();
			let mut due = Vec::new();
			while state.entries.peek().is_some_and(|entry| entry.deadline <= now) {
				if let Some(entry) = state.entries.pop() {
					due.push(entry);
				}
			}
			if !due.is_empty() {
				MutexGuard::unlocked(&mut state, || fire(due, Ok(())));
				continue;
			}
			match state.entries.peek().map(|entry| entry.deadline) {
				Some(deadline) => {
					self.wake.wait_until(&mut state, deadline);
				}
				None => self.wake.wait(&mut state),
			}
		}
		drop(state);
		tracing::debug!("timer.stop");
	}

	/// Stops the timer, failing every armed deadline with `Aborted`.
	pub fn shutdown(&self) {
		let mut state = self.state.lock();
		state.shutdown = true;
		let pending: Vec<_> = state.entries.drain().collect();
		drop(state);
		self.wake.notify_all();
		if !pending.is_empty() {
			tracing::debug!(pending = pending.len(), "timer.abort_pending");
		}
		fire(pending, Err(ActorError::Aborted));
	}
}

fn fire(entries: Vec<Entry>, result: Result<(), ActorError>) {
	for entry in entries {
		tracing::trace!(continuation = entry.continuation.id(), "timer.fire");
		entry.continuation.resume_with(result.clone());
	}
}
