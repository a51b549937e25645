//! Event bus implementation for broadcasting approval-flow events.
//!
//! Each chain the coordinator serves gets its own broadcast channel: a
//! subscriber on chain 1 never sees chain 5's events, and a slow subscriber
//! on one chain cannot starve another chain's subscribers. Channels are
//! created lazily on first subscribe or publish so a chain with no listeners
//! yet costs nothing.

use coordinator_types::events::CoordinatorEvent;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Per-chain multicast bus for [`CoordinatorEvent`]s.
///
/// Cheaply cloneable: clones share the same underlying channel map, so every
/// request-handling task can hold its own handle.
#[derive(Clone)]
pub struct EventBus {
	capacity: usize,
	channels: Arc<DashMap<u64, broadcast::Sender<CoordinatorEvent>>>,
}

impl EventBus {
	/// Creates a new bus. `capacity` bounds each chain's channel; a
	/// subscriber that falls more than `capacity` events behind starts
	/// missing the oldest ones rather than blocking publishers.
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			channels: Arc::new(DashMap::new()),
		}
	}

	fn sender_for(&self, chain_id: u64) -> broadcast::Sender<CoordinatorEvent> {
		self.channels
			.entry(chain_id)
			.or_insert_with(|| broadcast::channel(self.capacity).0)
			.clone()
	}

	/// Subscribes to a chain's events. Only events published after this call
	/// are received; there is no replay of history.
	pub fn subscribe(&self, chain_id: u64) -> broadcast::Receiver<CoordinatorEvent> {
		self.sender_for(chain_id).subscribe()
	}

	/// Publishes an event to a chain's subscribers. A `SendError` here just
	/// means nobody is currently listening on that chain, which is not a
	/// failure of the approval flow that produced the event.
	pub fn publish(
		&self,
		chain_id: u64,
		event: CoordinatorEvent,
	) -> Result<(), broadcast::error::SendError<CoordinatorEvent>> {
		self.sender_for(chain_id).send(event)?;
		Ok(())
	}
}
