use std::future::Future;

use crate::actor::{ActorCx, ActorId, ActorRef};
use crate::capability::{self, Capability};
use crate::scheduler::{LaneKind, current_lane};
use crate::{ActorError, CancelToken, Crossable, JobHandle};

/// The runtime's single-thread actor.
///
/// Every job runs on one dedicated worker thread. Jobs that do not suspend
/// run in submission order; a suspending job lets the next queued job run,
/// so a state write and its notification belong in one job with no await
/// between them.
#[derive(Debug, Clone)]
pub struct AffinityActor {
	actor: ActorRef<()>,
}

impl AffinityActor {
	pub(crate) fn new(actor: ActorRef<()>) -> Self {
		Self { actor }
	}

	/// Returns true on the affinity worker thread.
	pub fn is_current_thread() -> bool {
		current_lane() == Some(LaneKind::Affinity)
	}

	pub fn id(&self) -> ActorId {
		self.actor.id()
	}

	/// Underlying actor reference.
	pub fn actor(&self) -> &ActorRef<()> {
		&self.actor
	}

	/// Submits a job to the affinity thread.
	pub fn submit<T, F, Fut>(&self, job: F) -> Result<JobHandle<T>, ActorError>
	where
		T: Crossable + Send + 'static,
		F: FnOnce(ActorCx<()>) -> Fut,
		Fut: Future<Output = Result<T, ActorError>> + Send + 'static,
	{
		self.actor.submit(job)
	}

	/// Submits a job taking `args` to the affinity thread.
	pub fn call<Args, T, F, Fut>(&self, args: Args, job: F) -> Result<JobHandle<T>, ActorError>
	where
		Args: Crossable + Send + 'static,
		T: Crossable + Send + 'static,
		F: FnOnce(ActorCx<()>, Args) -> Fut,
		Fut: Future<Output = Result<T, ActorError>> + Send + 'static,
	{
		self.actor.call(args, job)
	}

	/// Runs a synchronous, capture-free closure on the affinity thread.
	pub fn run<T, F>(&self, f: F) -> Result<JobHandle<T>, ActorError>
	where
		T: Crossable + Send + 'static,
		F: FnOnce() -> T + Send + 'static,
	{
		capability::check_entry::<F>(self.actor.inbound_boundary())?;
		self.actor.enqueue(CancelToken::new(), move |_cx| async move { Ok(f()) })
	}

	/// Runs a synchronous closure on the affinity thread with `args` checked
	/// at the boundary.
	pub fn run_with<Args, T, F>(&self, args: Args, f: F) -> Result<JobHandle<T>, ActorError>
	where
		Args: Crossable + Send + 'static,
		T: Crossable + Send + 'static,
		F: FnOnce(Args) -> T + Send + 'static,
	{
		let boundary = self.actor.inbound_boundary();
		capability::check(boundary, &args)?;
		capability::check_entry::<F>(boundary)?;
		self.actor.enqueue(CancelToken::new(), move |_cx| async move { Ok(f(args)) })
	}
}

impl Crossable for AffinityActor {
	fn capability(&self) -> Capability {
		Capability::ActorRef
	}
}
