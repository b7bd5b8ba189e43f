use std::num::NonZeroUsize;

use crate::{MailboxPolicy, RuntimeError};

/// Worker count environment override.
pub const ENV_WORKERS: &str = "CORRAL_WORKERS";
/// Jobs-per-turn environment override.
pub const ENV_JOBS_PER_TURN: &str = "CORRAL_JOBS_PER_TURN";
/// Offload pool size environment override.
pub const ENV_OFFLOAD_THREADS: &str = "CORRAL_OFFLOAD_THREADS";

/// Runtime construction parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
	pub(crate) workers: usize,
	pub(crate) jobs_per_turn: usize,
	pub(crate) offload_threads: usize,
	pub(crate) thread_name: String,
	pub(crate) mailbox: MailboxPolicy,
	pub(crate) event_buffer: usize,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			workers: std::thread::available_parallelism().map_or(4, NonZeroUsize::get),
			jobs_per_turn: 32,
			offload_threads: 4,
			thread_name: "corral-worker".to_string(),
			mailbox: MailboxPolicy::Unbounded,
			event_buffer: 128,
		}
	}
}

impl RuntimeConfig {
	/// Default configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Default configuration with `CORRAL_WORKERS`, `CORRAL_JOBS_PER_TURN`
	/// and `CORRAL_OFFLOAD_THREADS` applied when set.
	pub fn from_env() -> Result<Self, RuntimeError> {
		Self::default().with_overrides(|key| std::env::var(key).ok())
	}

	fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RuntimeError> {
		if let Some(raw) = lookup(ENV_WORKERS) {
			self.workers = parse_positive(ENV_WORKERS, &raw)?;
		}
		if let Some(raw) = lookup(ENV_JOBS_PER_TURN) {
			self.jobs_per_turn = parse_positive(ENV_JOBS_PER_TURN, &raw)?;
		}
		if let Some(raw) = lookup(ENV_OFFLOAD_THREADS) {
			self.offload_threads = parse_positive(ENV_OFFLOAD_THREADS, &raw)?;
		}
		Ok(self)
	}

	/// Sets the pool worker count.
	///
	/// # Panics
	///
	/// Panics if `workers` is zero.
	#[must_use]
	pub fn workers(mut self, workers: usize) -> Self {
		assert!(workers > 0, "worker count must be > 0");
		self.workers = workers;
		self
	}

	/// Sets how many jobs of one actor a worker runs before moving on.
	///
	/// # Panics
	///
	/// Panics if `jobs` is zero.
	#[must_use]
	pub fn jobs_per_turn(mut self, jobs: usize) -> Self {
		assert!(jobs > 0, "jobs per turn must be > 0");
		self.jobs_per_turn = jobs;
		self
	}

	/// Sets how many threads run offloaded blocking work. Offloads beyond
	/// this many queue until a thread frees up.
	///
	/// # Panics
	///
	/// Panics if `threads` is zero.
	#[must_use]
	pub fn offload_threads(mut self, threads: usize) -> Self {
		assert!(threads > 0, "offload thread count must be > 0");
		self.offload_threads = threads;
		self
	}

	/// Sets the worker thread name prefix.
	#[must_use]
	pub fn thread_name(mut self, name: impl Into<String>) -> Self {
		self.thread_name = name.into();
		self
	}

	/// Sets the default mailbox policy for actors that do not choose one.
	///
	/// # Panics
	///
	/// Panics if the policy is `Bounded(0)`.
	#[must_use]
	pub fn mailbox(mut self, policy: MailboxPolicy) -> Self {
		if let MailboxPolicy::Bounded(capacity) = policy {
			assert!(capacity > 0, "mailbox capacity must be > 0");
		}
		self.mailbox = policy;
		self
	}

	/// Sets the default event broadcast buffer.
	///
	/// # Panics
	///
	/// Panics if `size` is zero.
	#[must_use]
	pub fn event_buffer(mut self, size: usize) -> Self {
		assert!(size > 0, "event buffer size must be > 0");
		self.event_buffer = size;
		self
	}

	pub fn worker_count(&self) -> usize {
		self.workers
	}

	pub fn turn_budget(&self) -> usize {
		self.jobs_per_turn
	}

	pub fn offload_thread_count(&self) -> usize {
		self.offload_threads
	}
}

fn parse_positive(key: &str, raw: &str) -> Result<usize, RuntimeError> {
	let invalid = |reason: String| RuntimeError::InvalidConfig {
		key: key.to_string(),
		reason,
	};
	match raw.trim().parse::<usize>() {
		Ok(0) => Err(invalid("must be > 0".to_string())),
		Ok(value) => Ok(value),
		Err(err) => Err(invalid(format!("{raw:?}: {err}"))),
	}
}
