//! Minimal publish-subscribe registry used for cache invalidation and session lifecycle events.
//!
//! Publishing iterates a snapshot of the registered handlers, so handlers may subscribe or
//! unsubscribe (including themselves) while an event is being delivered. Delivery order is not
//! part of the contract.

// std
use std::sync::Weak;
// self
use crate::_prelude::*;

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
	next_id: u64,
	handlers: Vec<(u64, Handler<E>)>,
}

/// Set of handlers notified synchronously on [`publish`](Self::publish).
pub struct Subscribers<E> {
	registry: Arc<Mutex<Registry<E>>>,
}
impl<E> Subscribers<E>
where
	E: 'static,
{
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self { registry: Arc::new(Mutex::new(Registry { next_id: 0, handlers: Vec::new() })) }
	}

	/// Registers `handler`; it stays registered until the returned [`Subscription`] is dropped
	/// or explicitly unsubscribed.
	pub fn subscribe<F>(&self, handler: F) -> Subscription
	where
		F: 'static + Fn(&E) + Send + Sync,
	{
		let id = {
			let mut registry = self.registry.lock();
			let id = registry.next_id;

			registry.next_id += 1;
			registry.handlers.push((id, Arc::new(handler)));

			id
		};
		let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);

		Subscription {
			cancel: Some(Box::new(move || {
				if let Some(registry) = weak.upgrade() {
					registry.lock().handlers.retain(|(handler_id, _)| *handler_id != id);
				}
			})),
		}
	}

	/// Delivers `event` to every handler registered at the time of the call and returns how many
	/// were notified.
	pub fn publish(&self, event: &E) -> usize {
		let snapshot: Vec<Handler<E>> =
			self.registry.lock().handlers.iter().map(|(_, handler)| handler.clone()).collect();

		for handler in &snapshot {
			handler(event);
		}

		snapshot.len()
	}

	/// Returns the number of registered handlers.
	pub fn len(&self) -> usize {
		self.registry.lock().handlers.len()
	}

	/// Returns `true` when no handler is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl<E> Default for Subscribers<E>
where
	E: 'static,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<E> Debug for Subscribers<E> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscribers").field("handlers", &self.registry.lock().handlers.len()).finish()
	}
}

/// Handle returned by [`Subscribers::subscribe`]; dropping it unsubscribes the handler.
#[must_use = "dropping a Subscription immediately unsubscribes its handler"]
pub struct Subscription {
	cancel: Option<Box<dyn FnOnce() + Send>>,
}
impl Subscription {
	/// Removes the handler now.
	pub fn unsubscribe(mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}

	/// Keeps the handler registered for the lifetime of the registry.
	pub fn detach(mut self) {
		self.cancel = None;
	}
}
impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(cancel) = self.cancel.take() {
			cancel();
		}
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("Subscription(..)")
	}
}
