//! Common utilities for runtime integration tests.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use corral::{ActorError, JobHandle, Runtime, RuntimeConfig};

/// Starts a small runtime with test logging enabled.
pub fn runtime() -> Runtime {
	runtime_with(RuntimeConfig::new().workers(4))
}

pub fn runtime_with(config: RuntimeConfig) -> Runtime {
	let _ = tracing_subscriber::fmt::try_init();
	Runtime::with_config(config).expect("runtime should start")
}

/// Polls `cond` until it holds, failing the test after five seconds.
pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(5);
	while !cond() {
		assert!(Instant::now() < deadline, "timed out waiting for {what}");
		std::thread::sleep(Duration::from_millis(1));
	}
}

/// Blocks on `handle` from a side thread, failing the test after five
/// seconds instead of hanging.
pub fn wait_for<T: Send + 'static>(what: &str, handle: JobHandle<T>) -> Result<T, ActorError> {
	let (tx, rx) = mpsc::channel();
	std::thread::spawn(move || {
		let _ = tx.send(handle.wait());
	});
	match rx.recv_timeout(Duration::from_secs(5)) {
		Ok(result) => result,
		Err(_) => panic!("timed out waiting for {what}"),
	}
}
