//! Ready queues and the worker loop.
//!
//! A lane is a queue of actors that have queued jobs and are not currently
//! held by a worker. An actor sits in at most one lane slot at a time (its
//! `scheduled` flag), so exactly one worker can hold it. The pool lane is
//! served by every pool worker; the affinity lane by a single dedicated
//! worker.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::actor::ActorCore;

/// Which worker set serves a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
	/// Served by the worker pool.
	Pool,
	/// Served by the single affinity worker.
	Affinity,
}

impl LaneKind {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Pool => "pool",
			Self::Affinity => "affinity",
		}
	}
}

thread_local! {
	static WORKER_LANE: Cell<Option<LaneKind>> = const { Cell::new(None) };
}

/// Returns the lane served by the calling thread, if it is a runtime worker.
pub fn current_lane() -> Option<LaneKind> {
	WORKER_LANE.with(Cell::get)
}

struct LaneState {
	actors: VecDeque<Arc<ActorCore>>,
	shutdown: bool,
}

/// Ready queue of actors with pending work.
pub(crate) struct Lane {
	kind: LaneKind,
	state: Mutex<LaneState>,
	ready: Condvar,
}

impl Lane {
	pub fn new(kind: LaneKind) -> Arc<Self> {
		Arc::new(Self {
			kind,
			state: Mutex::new(LaneState {
				actors: VecDeque::new(),
				shutdown: false,
			}),
			ready: Condvar::new(),
		})
	}

	pub fn kind(&self) -> LaneKind {
		self.kind
	}

	/// Queues an actor for a worker. Returns false once the lane is shut down.
	pub fn push(&self, actor: Arc<ActorCore>) -> bool {
		let mut state = self.state.lock();
		if state.shutdown {
			return false;
		}
		state.actors.push_back(actor);
		drop(state);
		self.ready.notify_one();
		true
	}

	/// Blocks until an actor is ready or the lane shuts down.
	fn next(&self) -> Option<Arc<ActorCore>> {
		let mut state = self.state.lock();
		loop {
			if state.shutdown {
				return None;
			}
			if let Some(actor) = state.actors.pop_front() {
				return Some(actor);
			}
			self.ready.wait(&mut state);
		}
	}

	/// Stops the lane, returning actors that were still waiting for a worker.
	pub fn shutdown(&self) -> Vec<Arc<ActorCore>> {
		let mut state = self.state.lock();
		state.shutdown = true;
		let stranded = state.actors.drain(..).collect();
		drop(state);
		self.ready.notify_all();
		stranded
	}

	/// Number of actors waiting for a worker.
	pub fn depth(&self) -> usize {
		self.state.lock().actors.len()
	}
}

/// Worker loop: run actor turns until the lane shuts down.
pub(crate) fn run_worker(lane: Arc<Lane>, index: usize, jobs_per_turn: usize) {
	WORKER_LANE.with(|current| current.set(Some(lane.kind())));
	tracing::debug!(lane = lane.kind().as_str(), worker = index, "worker.start");
	while let Some(actor) = lane.next() {
		actor.run_turn(jobs_per_turn);
	}
	tracing::debug!(lane = lane.kind().as_str(), worker = index, "worker.stop");
}
