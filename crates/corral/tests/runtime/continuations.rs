use std::time::Duration;

use corral::{ActorError, DoubleResumeError, bridge, orphaned_count};

use crate::common::runtime;

/// Foreign completion API that may fire its callback more than once.
fn flaky_read(deliveries: usize, done: impl Fn(Result<u32, ActorError>) -> bool + Send + 'static) -> std::thread::JoinHandle<Vec<bool>> {
	std::thread::spawn(move || {
		std::thread::sleep(Duration::from_millis(5));
		(0..deliveries).map(|n| done(Ok(n as u32))).collect()
	})
}

#[test]
fn second_delivery_is_rejected_and_first_value_wins() {
	let rt = runtime();
	let reader = rt.spawn("reader", ());

	let handle = reader
		.submit(|cx| async move {
			let mut foreign = None;
			let suspension = bridge(|continuation| {
				foreign = Some(flaky_read(2, move |result| {
					match continuation.try_resume_with(result) {
						Ok(()) => true,
						Err(DoubleResumeError { .. }) => false,
					}
				}));
			});
			let value = cx.suspend(suspension).await??;
			let accepted = match foreign.map(std::thread::JoinHandle::join) {
				Some(Ok(accepted)) => accepted,
				_ => return Err(ActorError::failed("foreign thread failed")),
			};
			Ok((value, accepted))
		})
		.unwrap();
	assert_eq!(handle.wait(), Ok((0, vec![true, false])));
}

#[test]
fn fatal_double_resume_fails_the_job() {
	let rt = runtime();
	let reader = rt.spawn("reader", ());

	let handle = reader
		.submit(|cx| async move {
			let suspension = bridge(|continuation| {
				continuation.resume(1u32);
				continuation.resume(2u32);
			});
			cx.suspend(suspension).await?
		})
		.unwrap();
	match handle.wait() {
		Err(ActorError::Panicked(message)) => assert!(message.contains("resumed twice"), "{message}"),
		other => panic!("expected a fatal double resume, got {other:?}"),
	}

	let after = reader.submit(|_cx| async { Ok("worker survived") }).unwrap();
	assert_eq!(after.wait(), Ok("worker survived"));
}

#[test]
fn dropped_continuation_is_reported_and_fails_the_awaiter() {
	let rt = runtime();
	let reader = rt.spawn("reader", ());
	let before = orphaned_count();

	let handle = reader
		.submit(|cx| async move {
			let suspension = bridge::<u32>(|continuation| {
				std::thread::spawn(move || drop(continuation));
			});
			cx.suspend(suspension).await?
		})
		.unwrap();
	assert_eq!(handle.wait(), Err(ActorError::OrphanedContinuation));
	assert!(orphaned_count() > before);
	assert!(rt.stats().orphaned_continuations > before);
}
