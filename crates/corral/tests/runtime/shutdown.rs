use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use corral::{ActorError, continuation};

use crate::common::{runtime, wait_for, wait_until};

/// Sets its flag when the job holding it is dropped.
struct Released(Arc<AtomicBool>);

impl Drop for Released {
	fn drop(&mut self) {
		self.0.store(true, Ordering::SeqCst);
	}
}

#[test]
fn shutdown_aborts_suspended_and_queued_work() {
	let rt = runtime();
	let worker = rt.spawn("worker", ());
	let (external, pending) = continuation::<u32>();

	let napping = worker
		.call(rt.clone(), |cx, rt| async move { cx.suspend(rt.sleep(Duration::from_secs(60))).await? })
		.unwrap();
	let waiting = worker.call(pending, |cx, pending| async move { cx.suspend(pending).await? }).unwrap();
	wait_until("both jobs to suspend", || worker.snapshot().suspended == 2);
	assert_eq!(rt.stats().timers, 1);

	rt.shutdown();
	assert_eq!(wait_for("timer job", napping), Err(ActorError::Aborted));
	assert_eq!(wait_for("continuation job", waiting), Err(ActorError::Aborted));
	assert_eq!(worker.snapshot().suspended, 0);

	// The awaiter is gone; the late resume is discarded.
	external.resume(7);

	assert!(matches!(worker.submit(|_cx| async { Ok(()) }), Err(ActorError::MailboxClosed)));
	let stats = rt.stats();
	assert!(stats.shut_down);
	assert_eq!(stats.timers, 0);
}

#[test]
fn shutdown_releases_jobs_of_dropped_actors() {
	let rt = runtime();
	let worker = rt.spawn("worker", ());
	let released = Arc::new(AtomicBool::new(false));

	let handle = worker
		.call(Arc::clone(&released), |cx, released| async move {
			let _guard = Released(released);
			cx.suspend(std::future::pending::<()>()).await?;
			Ok(())
		})
		.unwrap();
	wait_until("job to suspend", || worker.snapshot().suspended == 1);
	drop(worker);

	drop(rt);
	assert!(released.load(Ordering::SeqCst), "suspended job must be dropped by shutdown");
	assert_eq!(wait_for("abandoned job", handle), Err(ActorError::Aborted));
}

#[test]
fn dropping_the_last_handle_shuts_down() {
	let rt = runtime();
	let worker = rt.spawn("worker", ());
	let done = worker.submit(|_cx| async { Ok(1u32) }).unwrap();
	assert_eq!(done.wait(), Ok(1));

	drop(rt);
	assert!(worker.is_closed());
	assert!(matches!(worker.submit(|_cx| async { Ok(()) }), Err(ActorError::MailboxClosed)));
}
