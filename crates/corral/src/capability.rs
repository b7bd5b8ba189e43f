//! Capability tags and the boundary validator.
//!
//! Every value entering an actor, leaving it, or travelling between two
//! actors is checked against its [`Capability`]. The check is default-deny:
//! only values whose tag is crossable pass, and the rejection happens
//! synchronously at the call site, before any job exists.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Sharing classification of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
	/// Copied on crossing, so no aliasing is possible.
	Value,
	/// A reference to an actor, which serializes its own access.
	ActorRef,
	/// Shared data that cannot be mutated through any alias.
	Immutable,
	/// Mutable data that opted in to internal synchronization.
	Synchronized,
	/// A function value, described by what it captures.
	Closure {
		/// Whether any capture is mutated by the closure.
		mutable_captures: bool,
		/// Whether every capture is itself crossable.
		captures_crossable: bool,
	},
	/// A plain shared mutable reference with no synchronization contract.
	Unsynchronized,
}

impl Capability {
	/// Returns true when values with this tag may cross an isolation boundary.
	pub const fn is_crossable(self) -> bool {
		match self {
			Self::Value | Self::ActorRef | Self::Immutable | Self::Synchronized => true,
			Self::Closure {
				mutable_captures,
				captures_crossable,
			} => !mutable_captures && captures_crossable,
			Self::Unsynchronized => false,
		}
	}

	/// Combines the tags of two parts of one aggregate.
	///
	/// The aggregate keeps the first non-crossable part's tag, otherwise the
	/// left-hand tag.
	#[must_use]
	pub const fn join(self, other: Capability) -> Capability {
		if !self.is_crossable() || other.is_crossable() { self } else { other }
	}

	/// Tag of a value reached through shared ownership (`Arc`).
	const fn shared(self) -> Capability {
		match self {
			Self::Value => Self::Immutable,
			other => other,
		}
	}
}

impl fmt::Display for Capability {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Value => f.write_str("a value type"),
			Self::ActorRef => f.write_str("an actor reference"),
			Self::Immutable => f.write_str("immutable shared data"),
			Self::Synchronized => f.write_str("internally synchronized data"),
			Self::Closure { mutable_captures: true, .. } => f.write_str("a closure with mutable captures"),
			Self::Closure {
				captures_crossable: false, ..
			} => f.write_str("a closure capturing non-crossable or undeclared values"),
			Self::Closure { .. } => f.write_str("a closure"),
			Self::Unsynchronized => f.write_str("an unsynchronized mutable reference"),
		}
	}
}

/// Which isolation boundary a value is crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
	/// From an external caller into an actor.
	Inbound,
	/// From an actor back out to its caller.
	Outbound,
	/// From a job of one actor into a different actor.
	Peer,
}

impl fmt::Display for Boundary {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Inbound => "inbound",
			Self::Outbound => "outbound",
			Self::Peer => "actor-to-actor",
		})
	}
}

/// A value was rejected at an isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{type_name} is {capability} and may not cross the {boundary} boundary")]
pub struct CapabilityViolation {
	/// Boundary at which the check ran.
	pub boundary: Boundary,
	/// Rust type name of the rejected value.
	pub type_name: &'static str,
	/// Tag that caused the rejection.
	pub capability: Capability,
}

/// Values that carry a capability tag.
///
/// Implemented structurally for standard value types and aggregates. Types
/// with interior mutability are crossable only through an explicit
/// synchronization primitive (`Mutex`, `RwLock`, atomics) or their own
/// implementation returning [`Capability::Synchronized`].
pub trait Crossable {
	/// Returns this value's capability tag.
	fn capability(&self) -> Capability;
}

/// Returns true when `value` may cross an isolation boundary.
pub fn is_crossable<T: Crossable + ?Sized>(value: &T) -> bool {
	value.capability().is_crossable()
}

/// Validates `value` at `boundary`.
pub fn check<T: Crossable + ?Sized>(boundary: Boundary, value: &T) -> Result<(), CapabilityViolation> {
	verdict(boundary, std::any::type_name::<T>(), value.capability())
}

/// Validates a job entry point of type `F` at `boundary`.
///
/// Entry closures are function values entering the actor. Their captures
/// cannot be inspected, so an entry point with any environment is rejected;
/// state reaches a job through checked call arguments instead.
pub(crate) fn check_entry<F>(boundary: Boundary) -> Result<(), CapabilityViolation> {
	verdict(boundary, std::any::type_name::<F>(), Closure::<F>::undeclared())
}

fn verdict(boundary: Boundary, type_name: &'static str, capability: Capability) -> Result<(), CapabilityViolation> {
	if capability.is_crossable() {
		return Ok(());
	}
	tracing::warn!(%boundary, type_name, %capability, "capability.violation");
	Err(CapabilityViolation {
		boundary,
		type_name,
		capability,
	})
}

/// Implements [`Crossable`] as [`Capability::Value`] for plain value types.
///
/// ```
/// #[derive(Clone)]
/// struct Point {
/// 	x: i32,
/// 	y: i32,
/// }
/// corral::crossable_value!(Point);
/// assert!(corral::is_crossable(&Point { x: 1, y: 2 }));
/// ```
#[macro_export]
macro_rules! crossable_value {
	($($ty:ty),* $(,)?) => {
		$(
			impl $crate::Crossable for $ty {
				fn capability(&self) -> $crate::Capability {
					$crate::Capability::Value
				}
			}
		)*
	};
}

crossable_value!(
	(),
	bool,
	char,
	u8,
	u16,
	u32,
	u64,
	u128,
	usize,
	i8,
	i16,
	i32,
	i64,
	i128,
	isize,
	f32,
	f64,
	String,
	&'static str,
	Duration,
	Instant,
	Boundary,
	Capability,
	CapabilityViolation,
	crate::ActorError,
	crate::ActorId,
	crate::ActorSnapshot,
	crate::JobId,
);

macro_rules! crossable_synchronized {
	($($ty:ty),* $(,)?) => {
		$(
			impl Crossable for $ty {
				fn capability(&self) -> Capability {
					Capability::Synchronized
				}
			}
		)*
	};
}

crossable_synchronized!(AtomicBool, AtomicI32, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, crate::CancelToken);

impl<T> Crossable for std::sync::Mutex<T> {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

impl<T> Crossable for std::sync::RwLock<T> {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

impl<T> Crossable for parking_lot::Mutex<T> {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

impl<T> Crossable for parking_lot::RwLock<T> {
	fn capability(&self) -> Capability {
		Capability::Synchronized
	}
}

impl<T: Crossable + ?Sized> Crossable for Arc<T> {
	fn capability(&self) -> Capability {
		(**self).capability().shared()
	}
}

impl Crossable for str {
	fn capability(&self) -> Capability {
		Capability::Value
	}
}

impl<T: Crossable + ?Sized> Crossable for Box<T> {
	fn capability(&self) -> Capability {
		(**self).capability()
	}
}

impl<T: Crossable> Crossable for Option<T> {
	fn capability(&self) -> Capability {
		self.as_ref().map_or(Capability::Value, Crossable::capability)
	}
}

impl<T: Crossable, E: Crossable> Crossable for Result<T, E> {
	fn capability(&self) -> Capability {
		match self {
			Ok(value) => value.capability(),
			Err(err) => err.capability(),
		}
	}
}

fn aggregate<'a, T: Crossable + 'a>(items: impl IntoIterator<Item = &'a T>) -> Capability {
	items.into_iter().map(Crossable::capability).fold(Capability::Value, Capability::join)
}

impl<T: Crossable> Crossable for [T] {
	fn capability(&self) -> Capability {
		aggregate(self)
	}
}

impl<T: Crossable, const N: usize> Crossable for [T; N] {
	fn capability(&self) -> Capability {
		aggregate(self)
	}
}

impl<T: Crossable> Crossable for Vec<T> {
	fn capability(&self) -> Capability {
		aggregate(self)
	}
}

impl<T: Crossable> Crossable for VecDeque<T> {
	fn capability(&self) -> Capability {
		aggregate(self)
	}
}

impl<T: Crossable, S> Crossable for HashSet<T, S> {
	fn capability(&self) -> Capability {
		aggregate(self)
	}
}

impl<T: Crossable> Crossable for BTreeSet<T> {
	fn capability(&self) -> Capability {
		aggregate(self)
	}
}

impl<K: Crossable, V: Crossable, S> Crossable for HashMap<K, V, S> {
	fn capability(&self) -> Capability {
		self.iter()
			.fold(Capability::Value, |acc, (k, v)| acc.join(k.capability()).join(v.capability()))
	}
}

impl<K: Crossable, V: Crossable> Crossable for BTreeMap<K, V> {
	fn capability(&self) -> Capability {
		self.iter()
			.fold(Capability::Value, |acc, (k, v)| acc.join(k.capability()).join(v.capability()))
	}
}

macro_rules! crossable_tuple {
	($($name:ident),+) => {
		impl<$($name: Crossable),+> Crossable for ($($name,)+) {
			#[allow(non_snake_case)]
			fn capability(&self) -> Capability {
				let ($($name,)+) = self;
				Capability::Value$(.join($name.capability()))+
			}
		}
	};
}

crossable_tuple!(A);
crossable_tuple!(A, B);
crossable_tuple!(A, B, C);
crossable_tuple!(A, B, C, D);
crossable_tuple!(A, B, C, D, E);

/// Shared mutable reference with no isolation contract.
///
/// Every clone aliases the same value and may mutate it in place. Accesses
/// are memory safe, but they are not ordered with respect to any actor, so a
/// multi-step update inside a job can interleave with writes from outside it.
/// Values of this type never cross an isolation boundary.
pub struct SharedMut<T> {
	inner: Arc<parking_lot::Mutex<T>>,
}

impl<T> Clone for SharedMut<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> SharedMut<T> {
	/// Wraps `value` in a new shared mutable cell.
	pub fn new(value: T) -> Self {
		Self {
			inner: Arc::new(parking_lot::Mutex::new(value)),
		}
	}

	/// Mutates the shared value in place.
	pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
		f(&mut self.inner.lock())
	}

	/// Returns a copy of the shared value.
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.inner.lock().clone()
	}
}

impl<T> Crossable for SharedMut<T> {
	fn capability(&self) -> Capability {
		Capability::Unsynchronized
	}
}

/// A function value tagged with what it captures.
///
/// Rust closures do not expose their captures, so callers describe them at
/// construction with [`Closure::capturing`]. A closure wrapped with
/// [`Closure::new`] declares no captures; if it has an environment anyway,
/// those captures are unknown and the closure does not cross.
pub struct Closure<F> {
	f: F,
	capability: Capability,
}

impl<F> Closure<F> {
	/// Wraps a closure declaring no captures.
	pub fn new(f: F) -> Self {
		Self {
			f,
			capability: Self::undeclared(),
		}
	}

	/// Tag of an `F` whose captures were not declared. Only an empty
	/// environment is known to hold nothing.
	const fn undeclared() -> Capability {
		Capability::Closure {
			mutable_captures: false,
			captures_crossable: std::mem::size_of::<F>() == 0,
		}
	}

	/// Wraps a closure capturing `captures` by value or shared reference.
	pub fn capturing(f: F, captures: &[&dyn Crossable]) -> Self {
		let captures_crossable = captures.iter().all(|capture| capture.capability().is_crossable());
		Self {
			f,
			capability: Capability::Closure {
				mutable_captures: false,
				captures_crossable,
			},
		}
	}

	/// Marks the closure as mutating at least one capture.
	#[must_use]
	pub fn with_mutable_capture(mut self) -> Self {
		if let Capability::Closure { captures_crossable, .. } = self.capability {
			self.capability = Capability::Closure {
				mutable_captures: true,
				captures_crossable,
			};
		}
		self
	}

	/// Borrows the wrapped closure.
	pub fn get(&self) -> &F {
		&self.f
	}

	/// Unwraps the closure.
	pub fn into_inner(self) -> F {
		self.f
	}
}

impl<F> Crossable for Closure<F> {
	fn capability(&self) -> Capability {
		self.capability
	}
}
