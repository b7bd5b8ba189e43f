use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{StateInvariantViolation, fatal};
use crate::job::{CurrentJob, Job, RunOutcome};
use crate::mailbox::{Mailbox, MailboxPolicy, MailboxSendError};
use crate::registry::ActorSnapshot;
use crate::scheduler::{Lane, LaneKind};
use crate::token::SequenceClock;
use crate::{ActorError, JobId};

static ACTOR_IDS: SequenceClock = SequenceClock::new();

/// Process-wide actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
	fn next() -> Self {
		Self(ACTOR_IDS.next())
	}

	#[cfg(test)]
	pub(crate) const fn from_raw(id: u64) -> Self {
		Self(id)
	}

	/// Raw numeric id.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for ActorId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "actor#{}", self.0)
	}
}

/// Scheduling half of an actor, independent of its state type.
///
/// `scheduled` is held from the moment the actor enters a lane until the
/// worker that took it finishes its turn; `active` is held for the duration
/// of that turn. Only the holder of `scheduled` ever sets `active`.
///
/// Once `aborted` is set, no job of the actor is polled again: queued and
/// parked jobs are dropped, and so is any job woken later.
pub(crate) struct ActorCore {
	id: ActorId,
	name: String,
	mailbox: Mailbox<Arc<Job>>,
	active: AtomicBool,
	scheduled: AtomicBool,
	aborted: AtomicBool,
	/// Jobs parked at a suspension point. Weak, so a job nothing can wake
	/// any more is still freed.
	suspended: Mutex<HashMap<JobId, Weak<Job>>>,
	completed: AtomicU64,
	lane: Arc<Lane>,
}

impl ActorCore {
	pub fn new(name: impl Into<String>, policy: MailboxPolicy, lane: Arc<Lane>) -> Arc<Self> {
		Arc::new(Self {
			id: ActorId::next(),
			name: name.into(),
			mailbox: Mailbox::new(policy),
			active: AtomicBool::new(false),
			scheduled: AtomicBool::new(false),
			aborted: AtomicBool::new(false),
			suspended: Mutex::new(HashMap::new()),
			completed: AtomicU64::new(0),
			lane,
		})
	}

	pub fn id(&self) -> ActorId {
		self.id
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Enqueues a fresh job and wakes a worker if the actor was idle.
	pub fn submit(self: &Arc<Self>, job: Arc<Job>) -> Result<(), ActorError> {
		if let Err((err, job)) = self.mailbox.push(job) {
			tracing::debug!(actor = %self.id, job = %job.id(), error = ?err, "actor.submit_rejected");
			return Err(match err {
				MailboxSendError::Closed => ActorError::MailboxClosed,
				MailboxSendError::Full => ActorError::MailboxFull,
			});
		}
		self.notify();
		Ok(())
	}

	/// Re-enqueues a job whose suspension point completed.
	pub fn enqueue_resumed(self: &Arc<Self>, job: Arc<Job>) {
		if self.is_aborted() {
			job.abort();
			return;
		}
		self.mailbox.push_resumed(job);
		self.notify();
	}

	fn notify(self: &Arc<Self>) {
		if self.scheduled.swap(true, Ordering::AcqRel) {
			return;
		}
		if !self.lane.push(Arc::clone(self)) {
			self.scheduled.store(false, Ordering::Release);
			self.abort_pending();
		}
	}

	/// Runs up to `budget` queued jobs, each to its next suspension point or
	/// to completion, then yields the actor back to its lane.
	pub fn run_turn(self: &Arc<Self>, budget: usize) {
		if self.active.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
			fatal(StateInvariantViolation::ConcurrentActivation { actor: self.id });
		}
		for _ in 0..budget {
			let Some(job) = self.mailbox.pop() else {
				break;
			};
			if job.take_suspended() {
				self.suspended.lock().remove(&job.id());
			}
			if self.is_aborted() {
				job.abort();
				continue;
			}
			let outcome = {
				let _current = CurrentJob::enter(self.id, job.id());
				job.run()
			};
			match outcome {
				RunOutcome::Suspended => {
					self.park(&job);
					tracing::trace!(actor = %self.id, job = %job.id(), "job.suspend");
				}
				RunOutcome::Completed => {
					self.completed.fetch_add(1, Ordering::AcqRel);
				}
				RunOutcome::Stale => {}
			}
		}
		self.active.store(false, Ordering::Release);
		self.scheduled.store(false, Ordering::Release);
		// Work pushed while `scheduled` was still held found no lane slot.
		if !self.mailbox.is_empty() {
			self.notify();
		}
	}

	fn park(&self, job: &Arc<Job>) {
		{
			let mut suspended = self.suspended.lock();
			suspended.retain(|_, parked| parked.strong_count() > 0);
			suspended.insert(job.id(), Arc::downgrade(job));
		}
		// An abort that ran during the poll missed this job.
		if self.is_aborted() {
			self.suspended.lock().remove(&job.id());
			job.abort();
		}
	}

	/// Stops accepting submissions; queued jobs still run.
	pub fn close(&self) {
		self.mailbox.close();
	}

	pub fn is_closed(&self) -> bool {
		self.mailbox.is_closed()
	}

	/// Closes the mailbox and drops every queued and suspended job, resolving
	/// their handles with [`ActorError::Aborted`]. Jobs woken afterwards are
	/// dropped instead of re-queued.
	pub fn abort_pending(&self) {
		self.aborted.store(true, Ordering::SeqCst);
		let queued = self.mailbox.close_and_drain();
		let parked: Vec<_> = self.suspended.lock().drain().filter_map(|(_, job)| job.upgrade()).collect();
		let aborted = queued.iter().chain(&parked).filter(|job| job.abort()).count();
		if aborted > 0 {
			tracing::debug!(actor = %self.id, aborted, "actor.abort_pending");
		}
	}

	fn is_aborted(&self) -> bool {
		self.aborted.load(Ordering::SeqCst)
	}

	pub fn is_active(&self) -> bool {
		self.active.load(Ordering::Acquire)
	}

	pub fn mailbox_depth(&self) -> usize {
		self.mailbox.len()
	}

	pub fn snapshot(&self) -> ActorSnapshot {
		ActorSnapshot {
			id: self.id,
			name: self.name.clone(),
			mailbox_depth: self.mailbox.len(),
			active: self.is_active(),
			suspended: self.suspended.lock().values().filter(|job| job.strong_count() > 0).count(),
			completed: self.completed.load(Ordering::Acquire),
			pinned: self.lane.kind() == LaneKind::Affinity,
		}
	}
}

impl fmt::Debug for ActorCore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActorCore").field("id", &self.id).field("name", &self.name).finish_non_exhaustive()
	}
}
