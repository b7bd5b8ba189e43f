use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};

use crate::actor::{Actor, ActorCore, ActorCx, ActorId, EventReceiver, Handler};
use crate::capability::{self, Boundary, Capability, Crossable};
use crate::job::{self, CatchUnwind, Job};
use crate::registry::ActorSnapshot;
use crate::{ActorError, CancelToken, JobHandle, JobId};

struct ActorShared<A: Actor> {
	core: Arc<ActorCore>,
	state: Mutex<A>,
	events: broadcast::Sender<A::Event>,
}

/// Handle for submitting jobs to one actor.
///
/// Cheap to clone and crossable between actors. Holding a reference keeps
/// the actor alive; the state itself is only reachable from the actor's jobs.
pub struct ActorRef<A: Actor> {
	shared: Arc<ActorShared<A>>,
}

impl<A: Actor> Clone for ActorRef<A> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<A: Actor> ActorRef<A> {
	pub(crate) fn new(core: Arc<ActorCore>, state: A, event_buffer: usize) -> Self {
		let (events, _) = broadcast::channel(event_buffer);
		Self {
			shared: Arc::new(ActorShared {
				core,
				state: Mutex::new(state),
				events,
			}),
		}
	}

	pub(crate) fn state(&self) -> &Mutex<A> {
		&self.shared.state
	}

	pub(crate) fn publish(&self, event: A::Event) -> usize {
		self.shared.events.send(event).unwrap_or(0)
	}

	pub fn id(&self) -> ActorId {
		self.shared.core.id()
	}

	pub fn name(&self) -> &str {
		self.shared.core.name()
	}

	/// Submits a job with a fresh cancellation token.
	///
	/// The job receives the actor's context; its result is checked at the
	/// outbound boundary before it reaches the handle. The entry closure is a
	/// function value crossing into the actor and must capture nothing: a
	/// closure with an environment is rejected with
	/// [`ActorError::Capability`]. Pass state with [`call`](Self::call).
	pub fn submit<T, F, Fut>(&self, job: F) -> Result<JobHandle<T>, ActorError>
	where
		T: Crossable + Send + 'static,
		F: FnOnce(ActorCx<A>) -> Fut,
		Fut: Future<Output = Result<T, ActorError>> + Send + 'static,
	{
		self.submit_with(CancelToken::new(), job)
	}

	/// Submits a job observing `token`.
	pub fn submit_with<T, F, Fut>(&self, token: CancelToken, job: F) -> Result<JobHandle<T>, ActorError>
	where
		T: Crossable + Send + 'static,
		F: FnOnce(ActorCx<A>) -> Fut,
		Fut: Future<Output = Result<T, ActorError>> + Send + 'static,
	{
		capability::check_entry::<F>(self.inbound_boundary())?;
		self.enqueue(token, job)
	}

	/// Submits a job taking `args` across the boundary.
	///
	/// `args` and the capture-free entry closure are checked before anything
	/// is enqueued; a violation leaves the mailbox untouched.
	pub fn call<Args, T, F, Fut>(&self, args: Args, job: F) -> Result<JobHandle<T>, ActorError>
	where
		Args: Crossable + Send + 'static,
		T: Crossable + Send + 'static,
		F: FnOnce(ActorCx<A>, Args) -> Fut,
		Fut: Future<Output = Result<T, ActorError>> + Send + 'static,
	{
		self.call_with(CancelToken::new(), args, job)
	}

	/// [`call`](Self::call) observing `token`.
	pub fn call_with<Args, T, F, Fut>(&self, token: CancelToken, args: Args, job: F) -> Result<JobHandle<T>, ActorError>
	where
		Args: Crossable + Send + 'static,
		T: Crossable + Send + 'static,
		F: FnOnce(ActorCx<A>, Args) -> Fut,
		Fut: Future<Output = Result<T, ActorError>> + Send + 'static,
	{
		let boundary = self.inbound_boundary();
		capability::check(boundary, &args)?;
		capability::check_entry::<F>(boundary)?;
		self.enqueue(token, move |cx| job(cx, args))
	}

	/// Sends `msg` to the actor's [`Handler`] for `M`.
	pub fn ask<M>(&self, msg: M) -> Result<JobHandle<A::Reply>, ActorError>
	where
		A: Handler<M>,
		M: Crossable + Send + 'static,
	{
		self.call(msg, |cx, msg| A::handle(cx, msg))
	}

	/// Subscribes to the actor's state-change events.
	pub fn subscribe(&self) -> EventReceiver<A::Event> {
		self.shared.events.subscribe()
	}

	pub fn snapshot(&self) -> ActorSnapshot {
		self.shared.core.snapshot()
	}

	pub fn mailbox_depth(&self) -> usize {
		self.shared.core.mailbox_depth()
	}

	/// Returns whether one of the actor's jobs is executing right now.
	pub fn is_active(&self) -> bool {
		self.shared.core.is_active()
	}

	/// Refuses further submissions. Queued and suspended jobs still finish.
	pub fn close(&self) {
		self.shared.core.close();
	}

	pub fn is_closed(&self) -> bool {
		self.shared.core.is_closed()
	}

	/// Calls from another actor's job cross the actor-to-actor boundary.
	pub(crate) fn inbound_boundary(&self) -> Boundary {
		match job::current() {
			Some((caller, _)) if caller != self.id() => Boundary::Peer,
			_ => Boundary::Inbound,
		}
	}

	/// Enqueues an already validated entry point.
	pub(crate) fn enqueue<T, F, Fut>(&self, token: CancelToken, job: F) -> Result<JobHandle<T>, ActorError>
	where
		T: Crossable + Send + 'static,
		F: FnOnce(ActorCx<A>) -> Fut,
		Fut: Future<Output = Result<T, ActorError>> + Send + 'static,
	{
		let id = JobId::next();
		let actor = self.id();
		let (tx, rx) = oneshot::channel();
		let entry = job(ActorCx::new(self.clone(), id, token.clone()));
		let cancel = token.clone();
		let future = async move {
			let outcome = CatchUnwind::new(async move {
				tokio::select! {
					biased;
					() = cancel.cancelled() => Err(ActorError::Cancelled),
					result = entry => result,
				}
			})
			.await;
			let result = match outcome {
				Ok(Ok(value)) => capability::check(Boundary::Outbound, &value).map(|()| value).map_err(ActorError::from),
				Ok(Err(err)) => Err(err),
				Err(message) => {
					tracing::warn!(%actor, job = %id, panic = %message, "job.panicked");
					Err(ActorError::Panicked(message))
				}
			};
			if let Err(err) = &result {
				tracing::debug!(%actor, job = %id, error = %err, "job.failed");
			}
			let _ = tx.send(result);
		};
		self.shared.core.submit(Job::new(id, Arc::clone(&self.shared.core), Box::pin(future)))?;
		tracing::trace!(%actor, job = %id, "actor.submit");
		Ok(JobHandle::new(id, actor, token, rx))
	}
}

impl<A: Actor> Crossable for ActorRef<A> {
	fn capability(&self) -> Capability {
		Capability::ActorRef
	}
}

impl<A: Actor> fmt::Debug for ActorRef<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActorRef").field("id", &self.id()).field("name", &self.name()).finish()
	}
}
