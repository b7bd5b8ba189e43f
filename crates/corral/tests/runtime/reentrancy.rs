use std::collections::HashMap;
use std::time::Duration;

use corral::{Actor, ActorError, ActorRef, Capability, Crossable, JobHandle, Runtime, Suspension, continuation};

use crate::common::{runtime, wait_until};

#[derive(Default)]
struct Cache {
	entries: HashMap<String, String>,
}

impl Actor for Cache {
	type Event = String;
}

/// Where a lookup gets its value on a miss.
enum Fetch {
	Pending(Suspension<String>),
	After(Runtime, Duration, String),
}

impl Crossable for Fetch {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

impl Fetch {
	async fn run(self) -> Result<String, ActorError> {
		match self {
			Self::Pending(suspension) => suspension.await,
			Self::After(rt, delay, value) => {
				rt.sleep(delay).await?;
				Ok(value)
			}
		}
	}
}

/// Cache lookup that fetches on a miss and re-checks after the fetch, since
/// another job may have filled the key while this one was suspended.
fn lookup(cache: &ActorRef<Cache>, key: &str, fetch: Fetch) -> JobHandle<String> {
	cache
		.call((key.to_string(), fetch), |cx, (key, fetch)| async move {
			if let Some(hit) = cx.read(|cache| cache.entries.get(&key).cloned()) {
				return Ok(hit);
			}
			let fetched = cx.suspend(fetch.run()).await??;
			Ok(cx.with(|cache| cache.entries.entry(key).or_insert(fetched).clone()))
		})
		.unwrap()
}

fn stored(cache: &ActorRef<Cache>, key: &str) -> Option<String> {
	cache
		.call(key.to_string(), |cx, key| async move { Ok(cx.read(|cache| cache.entries.get(&key).cloned())) })
		.unwrap()
		.wait()
		.unwrap()
}

#[test]
fn later_fetch_wins_and_earlier_job_revalidates() {
	let rt = runtime();
	let cache = rt.spawn("cache", Cache::default());
	let (slow, slow_fetch) = continuation::<String>();
	let (fast, fast_fetch) = continuation::<String>();

	let j1 = lookup(&cache, "k", Fetch::Pending(slow_fetch));
	let j2 = lookup(&cache, "k", Fetch::Pending(fast_fetch));
	wait_until("both lookups to suspend", || cache.snapshot().suspended == 2);
	wait_until("suspended jobs to release the actor", || !cache.is_active());

	fast.resume("V2".to_string());
	assert_eq!(j2.wait(), Ok("V2".to_string()));
	slow.resume("V1".to_string());
	assert_eq!(j1.wait(), Ok("V2".to_string()), "J1 must not overwrite the value written while it was suspended");
	assert_eq!(stored(&cache, "k"), Some("V2".to_string()));
}

#[test]
fn reentrant_lookups_over_timer_suspensions() {
	let rt = runtime();
	let cache = rt.spawn("cache", Cache::default());

	let j1 = lookup(&cache, "k", Fetch::After(rt.clone(), Duration::from_millis(100), "V1".to_string()));
	let j2 = lookup(&cache, "k", Fetch::After(rt.clone(), Duration::from_millis(50), "V2".to_string()));

	assert_eq!(j2.wait(), Ok("V2".to_string()));
	assert_eq!(j1.wait(), Ok("V2".to_string()));
	assert_eq!(stored(&cache, "k"), Some("V2".to_string()));
	assert_eq!(cache.snapshot().suspended, 0);
}

#[test]
fn hit_does_not_suspend() {
	let rt = runtime();
	let cache = rt.spawn("cache", Cache::default());
	let (fill, fetch) = continuation::<String>();
	fill.resume("cached".to_string());
	assert_eq!(lookup(&cache, "k", Fetch::Pending(fetch)).wait(), Ok("cached".to_string()));

	let (unused, never) = continuation::<String>();
	assert_eq!(lookup(&cache, "k", Fetch::Pending(never)).wait(), Ok("cached".to_string()));
	unused.resume("never delivered".to_string());
}
