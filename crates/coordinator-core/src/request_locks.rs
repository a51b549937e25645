//! Per-`(chainId, takerKey)` mutex discipline.
//!
//! The Transaction store's check-then-insert (pre-delay validation through
//! persisting the granted record) is not race-free against concurrent
//! requests for the same taker on its own; the simple sufficient fix is a
//! mutex taken around that whole span and released once the response is
//! produced. Entries are never removed — a long-lived process accumulates
//! one entry per distinct `(chainId, takerKey)` it has ever served, which is
//! bounded by the number of distinct takers, not the number of requests.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Holds one mutex per `(chainId, takerKey)` pair seen so far.
#[derive(Default)]
pub struct RequestLocks {
	locks: DashMap<(u64, String), Arc<Mutex<()>>>,
}

impl RequestLocks {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the mutex for a `(chainId, takerKey)` pair, creating it if
	/// this is the first time the pair has been seen.
	pub fn mutex_for(&self, chain_id: u64, taker_key: &str) -> Arc<Mutex<()>> {
		self.locks
			.entry((chain_id, taker_key.to_string()))
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone()
	}
}
