use std::fmt;
use std::future::Future;

use parking_lot::MutexGuard;

use crate::actor::{Actor, ActorId, ActorRef};
use crate::error::{StateInvariantViolation, fatal};
use crate::{ActorError, CancelToken, JobId, job};

/// Execution context handed to one job.
///
/// The only path to the actor's state. Synchronous accessors run between
/// suspension points, so nothing here can hold the state across an await.
pub struct ActorCx<A: Actor> {
	actor: ActorRef<A>,
	job: JobId,
	token: CancelToken,
}

impl<A: Actor> ActorCx<A> {
	pub(crate) fn new(actor: ActorRef<A>, job: JobId, token: CancelToken) -> Self {
		Self { actor, job, token }
	}

	/// Reference to the actor running this job.
	pub fn actor(&self) -> &ActorRef<A> {
		&self.actor
	}

	pub fn actor_id(&self) -> ActorId {
		self.actor.id()
	}

	pub fn job_id(&self) -> JobId {
		self.job
	}

	/// The job's cancellation token.
	pub fn token(&self) -> &CancelToken {
		&self.token
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Explicit cancellation check between suspension points.
	pub fn checkpoint(&self) -> Result<(), ActorError> {
		if self.token.is_cancelled() {
			tracing::trace!(actor = %self.actor_id(), job = %self.job, "job.cancelled");
			return Err(ActorError::Cancelled);
		}
		Ok(())
	}

	/// Runs `f` with exclusive access to the actor's state.
	///
	/// # Panics
	///
	/// Fatal when called outside this actor's running job or re-entrantly
	/// from inside another `with`/`read`/`commit` closure.
	pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
		let mut state = self.lock();
		f(&mut state)
	}

	/// Runs `f` with shared access to the actor's state.
	pub fn read<R>(&self, f: impl FnOnce(&A) -> R) -> R {
		let state = self.lock();
		f(&state)
	}

	/// Publishes a state-change event. Returns the number of subscribers
	/// that received it.
	pub fn emit(&self, event: A::Event) -> usize {
		self.actor.publish(event)
	}

	/// Mutates state and publishes the resulting event in one step, with no
	/// gap in which another job could observe the write unannounced.
	pub fn commit(&self, f: impl FnOnce(&mut A) -> A::Event) -> usize {
		let mut state = self.lock();
		let event = f(&mut state);
		let delivered = self.actor.publish(event);
		drop(state);
		delivered
	}

	/// Awaits `fut` as a cancellation-checked suspension point.
	///
	/// The token is checked before suspending, raced against `fut` while
	/// suspended, and checked again on resumption, so a cancelled job runs
	/// no code past this call.
	pub async fn suspend<F: Future>(&self, fut: F) -> Result<F::Output, ActorError> {
		self.checkpoint()?;
		let output = tokio::select! {
			biased;
			() = self.token.cancelled() => return Err(ActorError::Cancelled),
			output = fut => output,
		};
		self.checkpoint()?;
		Ok(output)
	}

	fn lock(&self) -> MutexGuard<'_, A> {
		let actor = self.actor_id();
		match job::current() {
			Some((running, _)) if running == actor => {}
			_ => fatal(StateInvariantViolation::AccessOutsideJob { actor }),
		}
		match self.actor.state().try_lock() {
			Some(guard) => guard,
			None => fatal(StateInvariantViolation::NestedAccess { actor }),
		}
	}
}

impl<A: Actor> fmt::Debug for ActorCx<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActorCx")
			.field("actor", &self.actor_id())
			.field("job", &self.job)
			.field("cancelled", &self.is_cancelled())
			.finish()
	}
}
