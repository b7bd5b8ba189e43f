//! Jobs, job handles and the per-thread record of the running job.
//!
//! A job is a boxed future: the compiler-generated state machine holds the
//! job's saved locals across suspension points. While suspended, the job is
//! owned only by the wakers handed to whatever it awaits; waking it pushes it
//! back into its actor's mailbox at the tail.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Wake, Waker};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::actor::ActorCore;
use crate::token::SequenceClock;
use crate::{ActorError, ActorId, CancelToken};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

static JOB_IDS: SequenceClock = SequenceClock::new();

/// Identity of one submitted job. Ids grow with submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
	pub(crate) fn next() -> Self {
		Self(JOB_IDS.next())
	}

	/// Raw numeric id.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for JobId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "job#{}", self.0)
	}
}

thread_local! {
	/// The actor and job currently being polled on this thread.
	static CURRENT: Cell<Option<(ActorId, JobId)>> = const { Cell::new(None) };
}

/// Returns the actor and job being run on the calling thread, if any.
pub fn current() -> Option<(ActorId, JobId)> {
	CURRENT.with(Cell::get)
}

/// Restores the previous running-job record on drop.
pub(crate) struct CurrentJob {
	prev: Option<(ActorId, JobId)>,
}

impl CurrentJob {
	pub fn enter(actor: ActorId, job: JobId) -> Self {
		let prev = CURRENT.with(|current| current.replace(Some((actor, job))));
		Self { prev }
	}
}

impl Drop for CurrentJob {
	fn drop(&mut self) {
		CURRENT.with(|current| current.set(self.prev));
	}
}

/// Result of polling a job once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
	/// The job reached a suspension point.
	Suspended,
	/// The job finished, successfully or by panicking.
	Completed,
	/// The job had already finished; a late wakeup re-queued it.
	Stale,
}

/// One schedulable unit of work targeting one actor.
pub(crate) struct Job {
	id: JobId,
	actor: Arc<ActorCore>,
	submitted_at: Instant,
	future: Mutex<Option<BoxFuture>>,
	/// Set while the job sits in a mailbox; guards against duplicate wakeups.
	queued: AtomicBool,
	/// Set between a `Pending` poll and the next time the job is popped.
	suspended: AtomicBool,
	finished: AtomicBool,
}

impl Job {
	pub fn new(id: JobId, actor: Arc<ActorCore>, future: BoxFuture) -> Arc<Self> {
		Arc::new(Self {
			id,
			actor,
			submitted_at: Instant::now(),
			future: Mutex::new(Some(future)),
			queued: AtomicBool::new(true),
			suspended: AtomicBool::new(false),
			finished: AtomicBool::new(false),
		})
	}

	pub fn id(&self) -> JobId {
		self.id
	}

	/// Clears the suspended flag, returning whether it was set.
	pub fn take_suspended(&self) -> bool {
		self.suspended.swap(false, Ordering::AcqRel)
	}

	/// Polls the job to its next suspension point or to completion.
	///
	/// Must only be called by the worker holding the owning actor's `active`
	/// flag, which makes the future lock uncontended.
	pub fn run(self: &Arc<Self>) -> RunOutcome {
		self.queued.store(false, Ordering::Release);
		let mut slot = self.future.lock();
		let Some(future) = slot.as_mut() else {
			return RunOutcome::Stale;
		};
		let waker = Waker::from(Arc::clone(self));
		let mut cx = Context::from_waker(&waker);
		match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
			Ok(Poll::Pending) if self.is_finished() => {
				// Aborted from inside its own poll.
				let stale = slot.take();
				drop(slot);
				drop(stale);
				RunOutcome::Stale
			}
			Ok(Poll::Pending) => {
				self.suspended.store(true, Ordering::Release);
				RunOutcome::Suspended
			}
			Ok(Poll::Ready(())) => {
				self.finished.store(true, Ordering::Release);
				*slot = None;
				tracing::trace!(job = %self.id, actor = %self.actor.id(), elapsed = ?self.submitted_at.elapsed(), "job.complete");
				RunOutcome::Completed
			}
			Err(payload) => {
				self.finished.store(true, Ordering::Release);
				*slot = None;
				tracing::error!(job = %self.id, actor = %self.actor.id(), panic = %crate::panic_message(&*payload), "job.poll_panicked");
				RunOutcome::Completed
			}
		}
	}

	/// Drops the job's future without polling it again.
	///
	/// The reply sender lives inside the future, so the handle resolves with
	/// [`ActorError::Aborted`]. Dropping the future also releases the wakers it
	/// registered, which point back at this job. Returns false if the job had
	/// already finished.
	pub fn abort(&self) -> bool {
		if self.finished.swap(true, Ordering::AcqRel) {
			return false;
		}
		if current() == Some((self.actor.id(), self.id)) {
			return true;
		}
		let future = self.future.lock().take();
		tracing::trace!(job = %self.id, actor = %self.actor.id(), "job.abort");
		drop(future);
		true
	}

	pub fn is_finished(&self) -> bool {
		self.finished.load(Ordering::Acquire)
	}

	fn resume(self: Arc<Self>) {
		if self.is_finished() || self.queued.swap(true, Ordering::AcqRel) {
			return;
		}
		tracing::trace!(job = %self.id, actor = %self.actor.id(), "job.resume");
		let actor = Arc::clone(&self.actor);
		actor.enqueue_resumed(self);
	}
}

impl Wake for Job {
	fn wake(self: Arc<Self>) {
		self.resume();
	}

	fn wake_by_ref(self: &Arc<Self>) {
		Arc::clone(self).resume();
	}
}

/// Converts panics in the wrapped future into an error carrying the message.
pub(crate) struct CatchUnwind<F> {
	inner: Pin<Box<F>>,
}

impl<F: Future> CatchUnwind<F> {
	pub fn new(inner: F) -> Self {
		Self { inner: Box::pin(inner) }
	}
}

impl<F: Future> Future for CatchUnwind<F> {
	type Output = Result<F::Output, String>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let inner = self.inner.as_mut();
		match panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx))) {
			Ok(Poll::Pending) => Poll::Pending,
			Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
			Err(payload) => Poll::Ready(Err(crate::panic_message(&*payload))),
		}
	}
}

/// Pending result of a submitted job.
///
/// Await it from async code (including other actors' jobs, where awaiting is
/// a suspension point), or block on it with [`JobHandle::wait`] from outside
/// the runtime. Dropping the handle does not cancel the job.
#[must_use = "dropping a JobHandle discards the job's result"]
pub struct JobHandle<T> {
	id: JobId,
	actor: ActorId,
	token: CancelToken,
	rx: oneshot::Receiver<Result<T, ActorError>>,
}

impl<T> JobHandle<T> {
	pub(crate) fn new(id: JobId, actor: ActorId, token: CancelToken, rx: oneshot::Receiver<Result<T, ActorError>>) -> Self {
		Self { id, actor, token, rx }
	}

	/// Id of the job.
	pub fn id(&self) -> JobId {
		self.id
	}

	/// Actor the job targets.
	pub fn actor(&self) -> ActorId {
		self.actor
	}

	/// The job's cancellation token.
	pub fn token(&self) -> &CancelToken {
		&self.token
	}

	/// Requests cooperative cancellation of the job.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Blocks the calling thread until the job finishes.
	///
	/// Returns [`ActorError::WouldBlock`] when called from inside a job, since
	/// jobs must never block a worker. Must not be called from inside an async
	/// executor either.
	pub fn wait(self) -> Result<T, ActorError> {
		if current().is_some() {
			return Err(ActorError::WouldBlock);
		}
		self.rx.blocking_recv().unwrap_or(Err(ActorError::Aborted))
	}
}

impl<T> Future for JobHandle<T> {
	type Output = Result<T, ActorError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx).poll(cx).map(|received| received.unwrap_or(Err(ActorError::Aborted)))
	}
}

impl<T> fmt::Debug for JobHandle<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("JobHandle").field("id", &self.id).field("actor", &self.actor).finish_non_exhaustive()
	}
}
