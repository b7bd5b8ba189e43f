use async_trait::async_trait;

use crate::actor::{Actor, ActorCx};
use crate::{ActorError, Crossable};

/// Typed entry point: an actor that accepts messages of type `M`.
///
/// Submitted through [`ActorRef::ask`](crate::ActorRef::ask), which checks the
/// message at the boundary before it is enqueued.
#[async_trait]
pub trait Handler<M>: Actor
where
	M: Crossable + Send + 'static,
{
	/// Reply returned to the asker; checked on the way out.
	type Reply: Crossable + Send + 'static;

	async fn handle(cx: ActorCx<Self>, msg: M) -> Result<Self::Reply, ActorError>;
}
