use std::sync::Arc;

use corral::{Actor, ActorError, Boundary, Capability, SharedMut};

use crate::common::runtime;

#[derive(Default)]
struct Ledger {
	entries: Vec<u32>,
}

impl Actor for Ledger {
	type Event = ();
}

#[test]
fn unsynchronized_reference_is_rejected_before_enqueue() {
	let rt = runtime();
	let ledger = rt.spawn("ledger", Ledger::default());
	let scratch = SharedMut::new(vec![1u32, 2, 3]);

	let rejected = ledger.call(scratch.clone(), |cx, scratch| async move {
		cx.with(|ledger| ledger.entries.extend(scratch.get()));
		Ok(())
	});
	match rejected {
		Err(ActorError::Capability(violation)) => {
			assert_eq!(violation.boundary, Boundary::Inbound);
			assert_eq!(violation.capability, Capability::Unsynchronized);
		}
		other => panic!("expected a capability violation, got {other:?}"),
	}
	assert_eq!(ledger.mailbox_depth(), 0);
	assert_eq!(ledger.snapshot().completed, 0, "rejected job must never run");
}

#[test]
fn entry_closure_capturing_shared_state_is_rejected_before_enqueue() {
	let rt = runtime();
	let ledger = rt.spawn("ledger", Ledger::default());
	let alias = SharedMut::new(0u32);

	let leaked = alias.clone();
	let rejected = ledger.submit(move |_cx| async move {
		leaked.with(|value| *value += 1);
		Ok(())
	});
	match rejected {
		Err(ActorError::Capability(violation)) => {
			assert_eq!(violation.boundary, Boundary::Inbound);
			assert!(!violation.capability.is_crossable());
		}
		other => panic!("expected a capability violation, got {other:?}"),
	}
	assert_eq!(ledger.mailbox_depth(), 0);
	assert_eq!(alias.get(), 0, "rejected job must never touch the alias");

	let entries = alias.clone();
	let rejected = ledger.call(5u32, move |cx, amount| async move {
		cx.with(|ledger| ledger.entries.push(amount));
		entries.with(|value| *value = amount);
		Ok(())
	});
	assert!(matches!(rejected, Err(ActorError::Capability(_))));
	assert_eq!(ledger.mailbox_depth(), 0);
	assert_eq!(alias.get(), 0);
}

#[test]
fn affinity_closures_cross_only_through_checked_args() {
	let rt = runtime();
	let alias = SharedMut::new(Vec::<u32>::new());

	let leaked = alias.clone();
	let rejected = rt.affinity().run(move || leaked.with(|values| values.push(1)));
	assert!(matches!(rejected, Err(ActorError::Capability(_))));
	assert!(matches!(rt.affinity().run_with(alias.clone(), |alias| alias.get()), Err(ActorError::Capability(_))));
	assert!(alias.get().is_empty());

	let collected = Arc::new(parking_lot::Mutex::new(Vec::new()));
	let handle = rt
		.affinity()
		.run_with((Arc::clone(&collected), 3u32), |(collected, value)| {
			collected.lock().push(value);
			collected.lock().len()
		})
		.unwrap();
	assert_eq!(handle.wait(), Ok(1));
	assert_eq!(*collected.lock(), vec![3]);
}

#[test]
fn values_and_actor_references_cross() {
	let rt = runtime();
	let ledger = rt.spawn("ledger", Ledger::default());
	let audit = rt.spawn("audit", Ledger::default());

	let handle = ledger
		.call((7u32, audit.clone()), |cx, (amount, audit)| async move {
			cx.with(|ledger| ledger.entries.push(amount));
			let copied = cx.suspend(audit.call(amount, |cx, amount| async move {
				cx.with(|audit| audit.entries.push(amount));
				Ok(amount)
			})?)
			.await??;
			Ok(copied)
		})
		.unwrap();
	assert_eq!(handle.wait(), Ok(7));

	let frozen = Arc::new(vec![1u32, 2]);
	let sum = ledger.call(frozen, |_cx, frozen| async move { Ok(frozen.iter().sum::<u32>()) }).unwrap();
	assert_eq!(sum.wait(), Ok(3));
}

#[test]
fn actor_to_actor_calls_are_checked_as_peer_crossings() {
	let rt = runtime();
	let ledger = rt.spawn("ledger", Ledger::default());
	let audit = rt.spawn("audit", Ledger::default());

	let handle = ledger
		.call(audit, |_cx, audit| async move {
			let leaked = SharedMut::new(0u32);
			match audit.call(leaked, |_cx, _leaked| async move { Ok(()) }) {
				Err(ActorError::Capability(violation)) => Ok(violation.boundary),
				Err(err) => Err(err),
				Ok(_) => Err(ActorError::failed("peer call accepted an unsynchronized value")),
			}
		})
		.unwrap();
	assert_eq!(handle.wait(), Ok(Boundary::Peer));
}

#[test]
fn unsynchronized_results_are_rejected_outbound() {
	let rt = runtime();
	let ledger = rt.spawn("ledger", Ledger::default());

	let handle = ledger.submit(|_cx| async move { Ok(SharedMut::new(5u32)) }).unwrap();
	match handle.wait() {
		Err(ActorError::Capability(violation)) => assert_eq!(violation.boundary, Boundary::Outbound),
		other => panic!("expected an outbound violation, got {:?}", other.map(|shared| shared.get())),
	}
}
