//! Bounded thread pool for blocking work moved off the actor workers.
//!
//! A job that offloads work suspends on the returned [`Suspension`]; the
//! pool thread that picks the work up resumes it. Work queues while every
//! pool thread is busy, so the thread count never grows with the number of
//! suspended jobs.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::ActorError;
use crate::continuation::{Continuation, Suspension, continuation};

trait Task: Send {
	fn run(self: Box<Self>);
	fn abort(self: Box<Self>);
}

struct Blocking<F, R> {
	f: F,
	continuation: Continuation<R>,
}

impl<F, R> Task for Blocking<F, R>
where
	F: FnOnce() -> R + Send,
	R: Send,
{
	fn run(self: Box<Self>) {
		let Self { f, continuation } = *self;
		let result = panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| ActorError::Panicked(crate::panic_message(&*payload)));
		continuation.resume_with(result);
	}

	fn abort(self: Box<Self>) {
		self.continuation.resume_err(ActorError::Aborted);
	}
}

struct PoolState {
	tasks: VecDeque<Box<dyn Task>>,
	shutdown: bool,
}

pub(crate) struct OffloadPool {
	state: Mutex<PoolState>,
	ready: Condvar,
}

impl OffloadPool {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(PoolState {
				tasks: VecDeque::new(),
				shutdown: false,
			}),
			ready: Condvar::new(),
		})
	}

	/// Queues `f` for a pool thread. After shutdown the suspension resolves
	/// with [`ActorError::Aborted`] without running `f`.
	pub fn submit<F, R>(&self, f: F) -> Suspension<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		let (continuation, suspension) = continuation();
		let task: Box<dyn Task> = Box::new(Blocking { f, continuation });
		let mut state = self.state.lock();
		if state.shutdown {
			drop(state);
			task.abort();
			return suspension;
		}
		state.tasks.push_back(task);
		let depth = state.tasks.len();
		drop(state);
		tracing::trace!(depth, "offload.submit");
		self.ready.notify_one();
		suspension
	}

	fn next(&self) -> Option<Box<dyn Task>> {
		let mut state = self.state.lock();
		loop {
			if state.shutdown {
				return None;
			}
			if let Some(task) = state.tasks.pop_front() {
				return Some(task);
			}
			self.ready.wait(&mut state);
		}
	}

	/// Pool thread loop: run queued work until shutdown.
	pub fn run(&self, index: usize) {
		tracing::debug!(worker = index, "offload.start");
		while let Some(task) = self.next() {
			task.run();
		}
		tracing::debug!(worker = index, "offload.stop");
	}

	/// Stops the pool. Queued work is aborted; work already running finishes.
	pub fn shutdown(&self) {
		let mut state = self.state.lock();
		state.shutdown = true;
		let queued: Vec<_> = state.tasks.drain(..).collect();
		drop(state);
		self.ready.notify_all();
		if !queued.is_empty() {
			tracing::debug!(aborted = queued.len(), "offload.shutdown");
		}
		for task in queued {
			task.abort();
		}
	}

	/// Work waiting for a pool thread.
	pub fn depth(&self) -> usize {
		self.state.lock().tasks.len()
	}
}
