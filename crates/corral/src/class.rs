/// Thread classes spawned by the runtime, used for naming and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadClass {
	/// Pool worker multiplexing jobs of unpinned actors.
	Worker,
	/// The single worker serving the affinity lane.
	Affinity,
	/// Deadline wakeups for suspended jobs.
	Timer,
	/// Blocking work moved off the worker pool.
	Offload,
}

impl ThreadClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Worker => "worker",
			Self::Affinity => "affinity",
			Self::Timer => "timer",
			Self::Offload => "offload",
		}
	}
}
