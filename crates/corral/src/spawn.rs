use crate::ThreadClass;

/// Spawns a dedicated named OS thread with shared runtime classification metadata.
pub(crate) fn spawn_named_thread<F, R>(class: ThreadClass, name: impl Into<String>, f: F) -> std::io::Result<std::thread::JoinHandle<R>>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	let name = name.into();
	tracing::trace!(thread_class = class.as_str(), thread = %name, "runtime.spawn_thread");
	std::thread::Builder::new().name(name).spawn(f)
}
