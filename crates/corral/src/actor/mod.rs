//! Actor definitions, references and job contexts.
//!
//! An actor's state is reachable only through the [`ActorCx`] handed to its
//! jobs. [`ActorRef`] is the submission surface; it never exposes the state
//! itself.

mod cell;
mod context;
mod handler;
mod reference;
mod spec;

pub(crate) use cell::ActorCore;
pub use cell::ActorId;
pub use context::ActorCx;
pub use handler::Handler;
pub use reference::ActorRef;
pub use spec::ActorSpec;

/// Receiver for an actor's state-change events.
pub type EventReceiver<E> = tokio::sync::broadcast::Receiver<E>;

/// Private state owned by one actor.
pub trait Actor: Sized + Send + 'static {
	/// State-change notification published to subscribers.
	type Event: Clone + Send + 'static;
}

/// Stateless actors, such as the affinity actor.
impl Actor for () {
	type Event = ();
}
