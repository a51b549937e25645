//! The Order store: persists soft-cancellation flags keyed by order hash.
//!
//! Wraps a [`StorageService`] with the typed, namespaced operations the
//! approval state machine needs, rather than having callers talk to
//! [`crate::StorageInterface`] directly.

use crate::{StorageError, StorageService};
use coordinator_types::address::Digest32;
use coordinator_types::order::{Order, OrderRecord};
use coordinator_types::StorageNamespace;

/// Persists soft-cancel flags. Creates records lazily on first mutation and
/// never deletes them.
pub struct OrderStore {
	storage: StorageService,
}

impl OrderStore {
	/// Wraps the given storage backend.
	pub fn new(storage: StorageService) -> Self {
		Self { storage }
	}

	/// Computes an order's canonical hash. Deterministic over the order's
	/// fields, its exchange address, and its chain id (the latter two are
	/// already populated on the `Order` by the time it reaches this layer).
	pub fn hash_of(order: &Order) -> Digest32 {
		coordinator_types::utils::hash_order(order)
	}

	/// Whether the maker has soft-cancelled this order off-chain.
	pub async fn is_soft_cancelled(&self, order_hash: &Digest32) -> Result<bool, StorageError> {
		match self
			.storage
			.retrieve::<OrderRecord>(StorageNamespace::Orders.as_str(), order_hash.as_str())
			.await
		{
			Ok(record) => Ok(record.soft_cancelled),
			Err(StorageError::NotFound) => Ok(false),
			Err(e) => Err(e),
		}
	}

	/// Returns the subset of `order_hashes` that are soft-cancelled.
	pub async fn find_soft_cancelled(
		&self,
		order_hashes: &[Digest32],
	) -> Result<Vec<Digest32>, StorageError> {
		let mut cancelled = Vec::new();
		for hash in order_hashes {
			if self.is_soft_cancelled(hash).await? {
				cancelled.push(hash.clone());
			}
		}
		Ok(cancelled)
	}

	/// Sets the soft-cancel flag. Idempotent: repeated calls on an
	/// already-cancelled order are no-ops. Creates the record if it does not
	/// yet exist.
	pub async fn soft_cancel(&self, order_hash: &Digest32) -> Result<(), StorageError> {
		match self
			.storage
			.retrieve::<OrderRecord>(StorageNamespace::Orders.as_str(), order_hash.as_str())
			.await
		{
			Ok(record) if record.soft_cancelled => Ok(()),
			Ok(mut record) => {
				record.soft_cancelled = true;
				self.storage
					.store(StorageNamespace::Orders.as_str(), order_hash.as_str(), &record, None)
					.await
			}
			Err(StorageError::NotFound) => {
				let record = OrderRecord {
					order_hash: order_hash.clone(),
					soft_cancelled: true,
				};
				self.storage
					.store(StorageNamespace::Orders.as_str(), order_hash.as_str(), &record, None)
					.await
			}
			Err(e) => Err(e),
		}
	}
}
