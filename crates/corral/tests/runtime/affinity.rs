use std::sync::Arc;

use corral::{Actor, AffinityActor, JobHandle, LaneKind, current_lane};
use parking_lot::Mutex;

use crate::common::runtime;

#[test]
fn non_suspending_jobs_run_in_submission_order() {
	let rt = runtime();
	let order = Arc::new(Mutex::new(Vec::new()));

	let mut handles: Vec<JobHandle<bool>> = Vec::new();
	for label in ["J1", "J2", "J3"] {
		let affinity = rt.affinity().clone();
		let order = Arc::clone(&order);
		let submitter = std::thread::spawn(move || {
			affinity
				.run_with((order, label), |(order, label)| {
					order.lock().push(label);
					AffinityActor::is_current_thread()
				})
				.unwrap()
		});
		handles.push(submitter.join().unwrap());
	}
	for handle in handles {
		assert_eq!(handle.wait(), Ok(true));
	}
	assert_eq!(*order.lock(), vec!["J1", "J2", "J3"]);
}

#[derive(Default)]
struct Screen {
	title: String,
	renders: u32,
}

#[derive(Debug, Clone, PartialEq)]
struct Retitled {
	title: String,
	render: u32,
}

impl Actor for Screen {
	type Event = Retitled;
}

#[test]
fn pinned_actor_commits_state_and_notification_together() {
	let rt = runtime();
	let screen = rt.spawn_pinned("screen", Screen::default());
	let mut events = screen.subscribe();
	assert!(screen.snapshot().pinned);

	for title in ["home", "settings"] {
		let handle = screen
			.call(title.to_string(), |cx, title| async move {
				let lane = current_lane();
				cx.commit(|screen| {
					screen.title = title.clone();
					screen.renders += 1;
					Retitled {
						title,
						render: screen.renders,
					}
				});
				Ok(lane == Some(LaneKind::Affinity))
			})
			.unwrap();
		assert_eq!(handle.wait(), Ok(true));
	}

	assert_eq!(
		events.try_recv(),
		Ok(Retitled {
			title: "home".to_string(),
			render: 1
		})
	);
	assert_eq!(
		events.try_recv(),
		Ok(Retitled {
			title: "settings".to_string(),
			render: 2
		})
	);
	let title = screen.submit(|cx| async move { Ok(cx.read(|screen| screen.title.clone())) }).unwrap();
	assert_eq!(title.wait(), Ok("settings".to_string()));
}
