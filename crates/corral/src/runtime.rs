use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::actor::{Actor, ActorCore, ActorRef, ActorSpec};
use crate::affinity::AffinityActor;
use crate::capability::{Capability, Crossable};
use crate::continuation::Suspension;
use crate::error::fatal;
use crate::offload::OffloadPool;
use crate::registry::{ActorRegistry, ActorSnapshot};
use crate::scheduler::{Lane, LaneKind, run_worker};
use crate::spawn::spawn_named_thread;
use crate::timer::Timer;
use crate::{RuntimeConfig, RuntimeError, ThreadClass};

/// Point-in-time runtime counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
	pub workers: usize,
	/// Actors waiting for a pool worker.
	pub pool_depth: usize,
	/// Actors waiting for the affinity worker.
	pub affinity_depth: usize,
	pub live_actors: usize,
	/// Armed timer deadlines.
	pub timers: usize,
	/// Blocking work waiting for an offload thread.
	pub offload_depth: usize,
	/// Continuations dropped unresumed, process-wide.
	pub orphaned_continuations: u64,
	pub shut_down: bool,
}

struct RuntimeInner {
	config: RuntimeConfig,
	pool: Arc<Lane>,
	pinned: Arc<Lane>,
	timer: Arc<Timer>,
	offload: Arc<OffloadPool>,
	registry: ActorRegistry,
	affinity: OnceLock<AffinityActor>,
	threads: Mutex<Vec<JoinHandle<()>>>,
	shut_down: AtomicBool,
}

impl RuntimeInner {
	fn spawn_threads(&self) -> Result<(), RuntimeError> {
		let mut threads = self.threads.lock();
		for index in 0..self.config.workers {
			let lane = Arc::clone(&self.pool);
			let budget = self.config.jobs_per_turn;
			let name = format!("{}-{index}", self.config.thread_name);
			threads.push(spawn_named_thread(ThreadClass::Worker, name, move || run_worker(lane, index, budget))?);
		}
		let lane = Arc::clone(&self.pinned);
		let budget = self.config.jobs_per_turn;
		threads.push(spawn_named_thread(ThreadClass::Affinity, "corral-affinity", move || run_worker(lane, 0, budget))?);
		let timer = Arc::clone(&self.timer);
		threads.push(spawn_named_thread(ThreadClass::Timer, "corral-timer", move || timer.run())?);
		for index in 0..self.config.offload_threads {
			let pool = Arc::clone(&self.offload);
			threads.push(spawn_named_thread(ThreadClass::Offload, format!("corral-offload-{index}"), move || pool.run(index))?);
		}
		Ok(())
	}

	fn shutdown(&self) {
		if self.shut_down.swap(true, Ordering::AcqRel) {
			return;
		}
		tracing::debug!(actors = self.registry.live().len(), "runtime.shutdown");
		for lane in [&self.pool, &self.pinned] {
			for actor in lane.shutdown() {
				actor.abort_pending();
			}
		}
		for actor in self.registry.live() {
			actor.abort_pending();
		}
		self.timer.shutdown();
		self.offload.shutdown();

		let threads = std::mem::take(&mut *self.threads.lock());
		let current = std::thread::current().id();
		for handle in threads {
			if handle.thread().id() == current {
				continue;
			}
			if handle.join().is_err() {
				tracing::error!("runtime.thread_panicked");
			}
		}
		tracing::debug!("runtime.shutdown_complete");
	}
}

impl Drop for RuntimeInner {
	fn drop(&mut self) {
		self.shutdown();
	}
}

/// Owner of the worker pool, the affinity worker and the timer thread.
///
/// Cloning shares the runtime. Dropping the last handle shuts it down.
#[derive(Clone)]
pub struct Runtime {
	inner: Arc<RuntimeInner>,
}

impl Runtime {
	/// Starts a runtime with the default configuration.
	pub fn new() -> Result<Self, RuntimeError> {
		Self::with_config(RuntimeConfig::default())
	}

	/// Starts a runtime from `config`.
	pub fn with_config(config: RuntimeConfig) -> Result<Self, RuntimeError> {
		let inner = Arc::new(RuntimeInner {
			config,
			pool: Lane::new(LaneKind::Pool),
			pinned: Lane::new(LaneKind::Affinity),
			timer: Timer::new(),
			offload: OffloadPool::new(),
			registry: ActorRegistry::new(),
			affinity: OnceLock::new(),
			threads: Mutex::new(Vec::new()),
			shut_down: AtomicBool::new(false),
		});
		inner.spawn_threads()?;
		let runtime = Self { inner };
		let affinity = runtime.actor(ActorSpec::new("affinity", ()).pinned());
		let _ = runtime.inner.affinity.set(AffinityActor::new(affinity));
		tracing::debug!(workers = runtime.inner.config.workers, jobs_per_turn = runtime.inner.config.jobs_per_turn, "runtime.start");
		Ok(runtime)
	}

	pub fn config(&self) -> &RuntimeConfig {
		&self.inner.config
	}

	/// Creates an actor from `spec`.
	pub fn actor<A: Actor>(&self, spec: ActorSpec<A>) -> ActorRef<A> {
		let ActorSpec {
			name,
			state,
			mailbox,
			event_buffer,
			pinned,
		} = spec;
		let lane = if pinned { &self.inner.pinned } else { &self.inner.pool };
		let core = ActorCore::new(name, mailbox.unwrap_or(self.inner.config.mailbox), Arc::clone(lane));
		if self.is_shut_down() {
			core.abort_pending();
		}
		self.inner.registry.register(&core);
		tracing::debug!(actor = %core.id(), name = core.name(), pinned, "actor.spawn");
		ActorRef::new(core, state, event_buffer.unwrap_or(self.inner.config.event_buffer))
	}

	/// Creates a pool actor with default options.
	pub fn spawn<A: Actor>(&self, name: impl Into<String>, state: A) -> ActorRef<A> {
		self.actor(ActorSpec::new(name, state))
	}

	/// Creates an actor whose jobs run on the affinity worker.
	pub fn spawn_pinned<A: Actor>(&self, name: impl Into<String>, state: A) -> ActorRef<A> {
		self.actor(ActorSpec::new(name, state).pinned())
	}

	/// The runtime's affinity actor.
	pub fn affinity(&self) -> &AffinityActor {
		match self.inner.affinity.get() {
			Some(affinity) => affinity,
			None => fatal("affinity actor used before runtime start"),
		}
	}

	/// Suspension resumed after `duration`.
	pub fn sleep(&self, duration: Duration) -> Suspension<()> {
		self.sleep_until(Instant::now() + duration)
	}

	/// Suspension resumed once `deadline` passes.
	pub fn sleep_until(&self, deadline: Instant) -> Suspension<()> {
		self.inner.timer.schedule(deadline)
	}

	/// Runs blocking work on the offload pool and resumes the awaiting job
	/// with its result. A panic in `f` surfaces as [`ActorError::Panicked`].
	/// Work queues while every offload thread is busy, and resolves with
	/// [`ActorError::Aborted`] if the runtime shuts down first.
	///
	/// [`ActorError::Panicked`]: crate::ActorError::Panicked
	/// [`ActorError::Aborted`]: crate::ActorError::Aborted
	pub fn offload<F, R>(&self, f: F) -> Suspension<R>
	where
		F: FnOnce() -> R + Send + 'static,
		R: Send + 'static,
	{
		self.inner.offload.submit(f)
	}

	/// Snapshots of every live actor, sorted by id.
	pub fn snapshots(&self) -> Vec<ActorSnapshot> {
		self.inner.registry.snapshots()
	}

	pub fn stats(&self) -> RuntimeStats {
		RuntimeStats {
			workers: self.inner.config.workers,
			pool_depth: self.inner.pool.depth(),
			affinity_depth: self.inner.pinned.depth(),
			live_actors: self.inner.registry.live().len(),
			timers: self.inner.timer.pending(),
			offload_depth: self.inner.offload.depth(),
			orphaned_continuations: crate::orphaned_count(),
			shut_down: self.is_shut_down(),
		}
	}

	pub fn is_shut_down(&self) -> bool {
		self.inner.shut_down.load(Ordering::Acquire)
	}

	/// Stops the runtime. Idempotent.
	///
	/// Queued and suspended jobs are aborted along with armed timers and
	/// queued offload work. Their handles resolve with
	/// [`ActorError::Aborted`], and later submissions fail with
	/// [`ActorError::MailboxClosed`]. Worker threads are joined unless this is
	/// called from one of them.
	///
	/// [`ActorError::Aborted`]: crate::ActorError::Aborted
	/// [`ActorError::MailboxClosed`]: crate::ActorError::MailboxClosed
	pub fn shutdown(&self) {
		self.inner.shutdown();
	}
}

impl std::fmt::Debug for Runtime {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Runtime")
			.field("config", &self.inner.config)
			.field("shut_down", &self.is_shut_down())
			.finish_non_exhaustive()
	}
}

impl Crossable for Runtime {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Process-wide runtime, started on first use from [`RuntimeConfig::from_env`].
///
/// # Panics
///
/// Fatal if the runtime threads cannot be spawned.
pub fn global() -> &'static Runtime {
	GLOBAL.get_or_init(|| {
		let config = RuntimeConfig::from_env().unwrap_or_else(|err| {
			tracing::warn!(error = %err, "runtime.config_fallback");
			RuntimeConfig::default()
		});
		match Runtime::with_config(config) {
			Ok(runtime) => runtime,
			Err(err) => fatal(err),
		}
	})
}

/// The global runtime's affinity actor.
pub fn main_actor() -> &'static AffinityActor {
	global().affinity()
}
