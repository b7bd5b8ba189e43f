use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::ActorId;
use crate::actor::ActorCore;

/// Point-in-time view of one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorSnapshot {
	pub id: ActorId,
	pub name: String,
	/// Queued jobs, including resumed continuations waiting for a turn.
	pub mailbox_depth: usize,
	/// True while one of the actor's jobs is executing.
	pub active: bool,
	/// Jobs parked at a suspension point.
	pub suspended: usize,
	/// Jobs that ran to completion, including those that failed or panicked.
	pub completed: u64,
	/// Runs on the affinity worker.
	pub pinned: bool,
}

/// Weak index of a runtime's actors for introspection.
///
/// Entries do not keep actors alive; dead entries are pruned on read.
#[derive(Debug, Default, Clone)]
pub(crate) struct ActorRegistry {
	inner: Arc<RwLock<HashMap<ActorId, Weak<ActorCore>>>>,
}

impl ActorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, actor: &Arc<ActorCore>) {
		self.inner.write().insert(actor.id(), Arc::downgrade(actor));
	}

	/// Live actors, in creation order.
	pub fn live(&self) -> Vec<Arc<ActorCore>> {
		let mut guard = self.inner.write();
		guard.retain(|_, actor| actor.strong_count() > 0);
		let mut actors: Vec<_> = guard.values().filter_map(Weak::upgrade).collect();
		actors.sort_by_key(|actor| actor.id());
		actors
	}

	/// Returns snapshots sorted by actor id.
	pub fn snapshots(&self) -> Vec<ActorSnapshot> {
		self.live().iter().map(|actor| actor.snapshot()).collect()
	}
}
