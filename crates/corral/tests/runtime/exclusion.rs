use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use corral::{Actor, ActorRef, Capability, Crossable, JobHandle, RuntimeConfig, yield_now};
use proptest::prelude::*;

use crate::common::{runtime, runtime_with, wait_until};

#[derive(Default)]
struct Tally {
	count: u64,
	order: Vec<u32>,
}

impl Actor for Tally {
	type Event = ();
}

/// Tracks how many jobs of one actor are between suspension points at once.
#[derive(Default)]
struct Occupancy {
	inside: AtomicUsize,
	peak: AtomicUsize,
}

impl Occupancy {
	fn enter(&self) {
		let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
		self.peak.fetch_max(now, Ordering::SeqCst);
	}

	fn leave(&self) {
		self.inside.fetch_sub(1, Ordering::SeqCst);
	}
}

impl Crossable for Occupancy {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

fn submit_steps(tally: &ActorRef<Tally>, occupancy: &Arc<Occupancy>, id: u32, yields: usize) -> JobHandle<()> {
	tally
		.call((Arc::clone(occupancy), id, yields), |cx, (occupancy, id, yields)| async move {
			for _ in 0..=yields {
				occupancy.enter();
				cx.with(|tally| {
					tally.count += 1;
					tally.order.push(id);
				});
				occupancy.leave();
				yield_now().await;
			}
			Ok(())
		})
		.unwrap()
}

#[test]
fn concurrent_submitters_never_overlap_within_one_actor() {
	let rt = runtime();
	let tally = rt.spawn("tally", Tally::default());
	let occupancy = Arc::new(Occupancy::default());

	let submitters: Vec<_> = (0..4u32)
		.map(|thread| {
			let tally = tally.clone();
			let occupancy = Arc::clone(&occupancy);
			std::thread::spawn(move || (0..25u32).map(|n| submit_steps(&tally, &occupancy, thread * 100 + n, 2)).collect::<Vec<_>>())
		})
		.collect();
	for submitter in submitters {
		for handle in submitter.join().unwrap() {
			assert_eq!(handle.wait(), Ok(()));
		}
	}

	assert_eq!(occupancy.peak.load(Ordering::SeqCst), 1);
	let count = tally.submit(|cx| async move { Ok(cx.read(|tally| tally.count)) }).unwrap();
	assert_eq!(count.wait(), Ok(300));
	wait_until("tally to go idle", || !tally.is_active());
}

#[test]
fn separate_actors_run_in_parallel_without_sharing_state() {
	let rt = runtime();
	let actors: Vec<_> = (0..4).map(|n| rt.spawn(format!("tally-{n}"), Tally::default())).collect();
	let occupancy: Vec<_> = actors.iter().map(|_| Arc::new(Occupancy::default())).collect();

	let handles: Vec<_> = (0..50u32)
		.flat_map(|n| actors.iter().zip(&occupancy).map(move |(actor, occupancy)| submit_steps(actor, occupancy, n, 1)))
		.collect();
	for handle in handles {
		assert_eq!(handle.wait(), Ok(()));
	}
	for (actor, occupancy) in actors.iter().zip(&occupancy) {
		assert_eq!(occupancy.peak.load(Ordering::SeqCst), 1);
		let count = actor.submit(|cx| async move { Ok(cx.read(|tally| tally.count)) }).unwrap();
		assert_eq!(count.wait(), Ok(100));
	}
}

#[test]
fn nested_state_access_is_fatal() {
	let rt = runtime();
	let tally = rt.spawn("tally", Tally::default());
	let handle = tally
		.submit(|cx| async move { Ok(cx.with(|outer| outer.count + cx.read(|inner| inner.count))) })
		.unwrap();
	match handle.wait() {
		Err(corral::ActorError::Panicked(message)) => assert!(message.contains("re-entrantly"), "{message}"),
		other => panic!("expected fatal nested access, got {other:?}"),
	}
}

#[test]
fn state_access_from_a_foreign_thread_is_fatal() {
	let rt = runtime();
	let tally = rt.spawn("tally", Tally::default());
	let handle = tally
		.submit(|cx| async move {
			let escaped = std::thread::spawn(move || cx.with(|tally| tally.count)).join();
			Ok(escaped.is_err())
		})
		.unwrap();
	assert_eq!(handle.wait(), Ok(true));
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(16))]

	#[test]
	fn at_most_one_job_active_per_actor(
		workers in 1usize..4,
		budget in 1usize..4,
		plan in proptest::collection::vec(0usize..4, 1..24),
	) {
		let rt = runtime_with(RuntimeConfig::new().workers(workers).jobs_per_turn(budget));
		let tally = rt.spawn("tally", Tally::default());
		let occupancy = Arc::new(Occupancy::default());

		let handles: Vec<_> = plan
			.iter()
			.enumerate()
			.map(|(id, yields)| submit_steps(&tally, &occupancy, id as u32, *yields))
			.collect();
		for handle in handles {
			prop_assert_eq!(handle.wait(), Ok(()));
		}

		prop_assert_eq!(occupancy.peak.load(Ordering::SeqCst), 1);
		let order = tally.submit(|cx| async move { Ok(cx.read(|tally| tally.order.clone())) }).unwrap().wait().unwrap();
		prop_assert_eq!(order.len(), plan.iter().map(|yields| yields + 1).sum::<usize>());
		// Each job's first step runs in submission order.
		let mut firsts = Vec::new();
		for id in order {
			if !firsts.contains(&id) {
				firsts.push(id);
			}
		}
		prop_assert_eq!(firsts, (0..plan.len() as u32).collect::<Vec<_>>());
	}
}
