//! One-shot continuations bridging callback-style operations into jobs.
//!
//! [`continuation`] returns a [`Continuation`], handed to the foreign API,
//! and a [`Suspension`], awaited by the job. Awaiting suspends the job and
//! frees its worker; resuming the continuation wakes the job, which re-enters
//! its actor's mailbox at the tail.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

use crate::capability::{Capability, Crossable};
use crate::error::{DoubleResumeError, fatal};
use crate::token::SequenceClock;
use crate::{ActorError, job};

static CONTINUATION_IDS: SequenceClock = SequenceClock::new();
static ORPHANED: AtomicU64 = AtomicU64::new(0);

/// Number of continuations dropped without being resumed in this process.
pub fn orphaned_count() -> u64 {
	ORPHANED.load(Ordering::Acquire)
}

enum SlotState<T> {
	Waiting(Option<Waker>),
	Ready(Result<T, ActorError>),
	/// The awaiter took the result or was dropped.
	Taken,
}

struct Slot<T> {
	state: Mutex<SlotState<T>>,
}

impl<T> Slot<T> {
	/// Stores `result` unless the awaiter is gone, returning the waker to notify.
	fn fill(&self, result: Result<T, ActorError>) -> Option<Waker> {
		let mut state = self.state.lock();
		match &mut *state {
			SlotState::Waiting(waker) => {
				let waker = waker.take();
				*state = SlotState::Ready(result);
				waker
			}
			SlotState::Ready(_) | SlotState::Taken => None,
		}
	}

	/// Fails a still-waiting awaiter with [`ActorError::OrphanedContinuation`].
	///
	/// Returns `None` when nobody is waiting, otherwise the waker to notify.
	fn orphan(&self) -> Option<Option<Waker>> {
		let mut state = self.state.lock();
		match &mut *state {
			SlotState::Waiting(waker) => {
				let waker = waker.take();
				*state = SlotState::Ready(Err(ActorError::OrphanedContinuation));
				Some(waker)
			}
			SlotState::Ready(_) | SlotState::Taken => None,
		}
	}
}

/// Creates a linked continuation and suspension.
pub fn continuation<T>() -> (Continuation<T>, Suspension<T>) {
	let id = CONTINUATION_IDS.next();
	let slot = Arc::new(Slot {
		state: Mutex::new(SlotState::Waiting(None)),
	});
	let origin = job::current();
	let continuation = Continuation {
		id,
		slot: Arc::clone(&slot),
		resumed: AtomicBool::new(false),
		origin,
	};
	(continuation, Suspension { id, slot })
}

/// Wraps one callback-style operation as a suspension point.
///
/// `register` receives the continuation and must arrange for it to be
/// resumed exactly once, typically by moving it into the foreign callback.
pub fn bridge<T>(register: impl FnOnce(Continuation<T>)) -> Suspension<T> {
	let (continuation, suspension) = continuation();
	register(continuation);
	suspension
}

/// One-shot resumption handle for a suspended job.
///
/// Resuming twice is fatal: [`resume`](Self::resume) and its siblings log and
/// panic, while the `try_` variants return [`DoubleResumeError`] and never
/// deliver the second value. Dropping a continuation that was never resumed
/// is reported as an orphan and fails the awaiter with
/// [`ActorError::OrphanedContinuation`].
pub struct Continuation<T> {
	id: u64,
	slot: Arc<Slot<T>>,
	resumed: AtomicBool,
	origin: Option<(crate::ActorId, crate::JobId)>,
}

impl<T> Continuation<T> {
	/// Id shared with the linked suspension.
	pub fn id(&self) -> u64 {
		self.id
	}

	/// Returns whether this continuation was already resumed.
	pub fn is_resumed(&self) -> bool {
		self.resumed.load(Ordering::Acquire)
	}

	/// Resumes with a value or an error.
	pub fn try_resume_with(&self, result: Result<T, ActorError>) -> Result<(), DoubleResumeError> {
		if self.resumed.swap(true, Ordering::AcqRel) {
			tracing::error!(continuation = self.id, "continuation.double_resume");
			return Err(DoubleResumeError { id: self.id });
		}
		tracing::trace!(continuation = self.id, ok = result.is_ok(), "continuation.resume");
		if let Some(waker) = self.slot.fill(result) {
			waker.wake();
		}
		Ok(())
	}

	/// Resumes with a value.
	pub fn try_resume(&self, value: T) -> Result<(), DoubleResumeError> {
		self.try_resume_with(Ok(value))
	}

	/// Resumes with a value or an error. A second resume is fatal.
	pub fn resume_with(&self, result: Result<T, ActorError>) {
		if let Err(err) = self.try_resume_with(result) {
			fatal(err);
		}
	}

	/// Resumes with a value. A second resume is fatal.
	pub fn resume(&self, value: T) {
		self.resume_with(Ok(value));
	}

	/// Resumes with an error. A second resume is fatal.
	pub fn resume_err(&self, err: ActorError) {
		self.resume_with(Err(err));
	}

	/// Adapts the continuation into a callback for foreign APIs.
	///
	/// The callback may be invoked from any thread; invoking it twice is
	/// fatal, exposing double-delivery bugs in the wrapped API.
	pub fn into_callback(self) -> impl Fn(Result<T, ActorError>) + Send + Sync + 'static
	where
		T: Send + 'static,
	{
		move |result| self.resume_with(result)
	}

	/// Gives up on the continuation without resuming it.
	///
	/// Counts and reports an orphan only while the awaiter is still waiting;
	/// an awaiter that was cancelled or dropped first has nothing to lose.
	/// Returns whether an orphan was reported.
	fn abandon(&self) -> bool {
		if self.resumed.swap(true, Ordering::AcqRel) {
			return false;
		}
		let Some(waker) = self.slot.orphan() else {
			tracing::trace!(continuation = self.id, "continuation.discarded");
			return false;
		};
		ORPHANED.fetch_add(1, Ordering::AcqRel);
		match self.origin {
			Some((actor, job)) => tracing::warn!(continuation = self.id, %actor, %job, "continuation.orphaned"),
			None => tracing::warn!(continuation = self.id, "continuation.orphaned"),
		}
		if let Some(waker) = waker {
			waker.wake();
		}
		true
	}
}

impl<T> Drop for Continuation<T> {
	fn drop(&mut self) {
		self.abandon();
	}
}

impl<T> Crossable for Continuation<T> {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

impl<T> fmt::Debug for Continuation<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Continuation")
			.field("id", &self.id)
			.field("resumed", &self.is_resumed())
			.finish_non_exhaustive()
	}
}

/// Awaiter half of a continuation.
///
/// Resolves to the resumed value, or to
/// [`ActorError::OrphanedContinuation`] when the continuation is dropped
/// unresumed. Dropping the suspension discards any later resume.
#[must_use = "a suspension does nothing unless awaited"]
pub struct Suspension<T> {
	id: u64,
	slot: Arc<Slot<T>>,
}

impl<T> Suspension<T> {
	/// Id shared with the linked continuation.
	pub fn id(&self) -> u64 {
		self.id
	}
}

impl<T> Future for Suspension<T> {
	type Output = Result<T, ActorError>;

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let mut state = self.slot.state.lock();
		match std::mem::replace(&mut *state, SlotState::Taken) {
			SlotState::Ready(result) => Poll::Ready(result),
			SlotState::Waiting(_) => {
				*state = SlotState::Waiting(Some(cx.waker().clone()));
				Poll::Pending
			}
			SlotState::Taken => Poll::Ready(Err(ActorError::Aborted)),
		}
	}
}

impl<T> Drop for Suspension<T> {
	fn drop(&mut self) {
		*self.slot.state.lock() = SlotState::Taken;
	}
}

impl<T> Crossable for Suspension<T> {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

impl<T> fmt::Debug for Suspension<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Suspension").field("id", &self.id).finish_non_exhaustive()
	}
}

/// Suspends the current job once, re-entering its mailbox at the tail.
pub fn yield_now() -> YieldNow {
	YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[must_use = "yield_now does nothing unless awaited"]
#[derive(Debug)]
pub struct YieldNow {
	yielded: bool,
}

impl Future for YieldNow {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
		if self.yielded {
			return Poll::Ready(());
		}
		self.yielded = true;
		cx.waker().wake_by_ref();
		Poll::Pending
	}
}
