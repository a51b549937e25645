//! The Transaction store: persists granted approvals and cancel
//! acknowledgements.
//!
//! Exclusively owned by the approval state machine (spec data model,
//! "Ownership"). Every lookup resolves through a small order-hash-to-
//! transaction-hash index so that "find records touching any of these
//! orders" does not require a full namespace scan.

use crate::{StorageError, StorageService};
use alloy_primitives::U256;
use coordinator_types::address::Digest32;
use coordinator_types::order::TransactionRecord;
use coordinator_types::{Address, StorageNamespace};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors specific to creating a transaction record.
#[derive(Debug, Error)]
pub enum TransactionStoreError {
	/// A record with this transaction hash already exists (I2).
	#[error("transaction already exists")]
	AlreadyExists,
	#[error(transparent)]
	Storage(#[from] StorageError),
}

/// Filter options shared by the lookup operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
	/// Restrict to records unexpired as of the caller-supplied `now`.
	pub unexpired_only: bool,
}

/// Which address a fill-sum or lookup groups by: the taker directly, or
/// the transaction's declared origin for allowlisted smart-contract takers.
#[derive(Debug, Clone, Copy)]
pub enum FillKey<'a> {
	Taker(&'a Address),
	TxOrigin(&'a Address),
}

/// Persists `TransactionRecord`s: granted fill approvals and cancel
/// acknowledgements.
pub struct TransactionStore {
	storage: StorageService,
}

impl TransactionStore {
	/// Wraps the given storage backend.
	pub fn new(storage: StorageService) -> Self {
		Self { storage }
	}

	/// Looks up a record by its transaction hash.
	pub async fn find_by_hash(
		&self,
		transaction_hash: &Digest32,
	) -> Result<Option<TransactionRecord>, StorageError> {
		match self
			.storage
			.retrieve::<TransactionRecord>(
				StorageNamespace::Transactions.as_str(),
				transaction_hash.as_str(),
			)
			.await
		{
			Ok(record) => Ok(Some(record)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	/// Records touching any of `order_hashes`, optionally restricted to a
	/// specific taker address. `taker_address = None` returns records from
	/// any taker, used when collecting outstanding approvals for a cancel
	/// acknowledgement.
	pub async fn find_by_orders_and_taker(
		&self,
		order_hashes: &[Digest32],
		taker_address: Option<&Address>,
		opts: FindOptions,
		now: u64,
	) -> Result<Vec<TransactionRecord>, StorageError> {
		self.find_by_orders(
			order_hashes,
			|record| taker_address.map(|t| &record.taker_address == t).unwrap_or(true),
			opts,
			now,
		)
		.await
	}

	/// Records touching any of `order_hashes`, restricted to a specific
	/// declared transaction origin. Used for allowlisted smart-contract
	/// takers, who share accounting across the senders that relay for them.
	pub async fn find_by_orders_and_tx_origin(
		&self,
		order_hashes: &[Digest32],
		tx_origin: &Address,
		opts: FindOptions,
		now: u64,
	) -> Result<Vec<TransactionRecord>, StorageError> {
		self.find_by_orders(order_hashes, |record| &record.tx_origin == tx_origin, opts, now)
			.await
	}

	async fn find_by_orders(
		&self,
		order_hashes: &[Digest32],
		matches: impl Fn(&TransactionRecord) -> bool,
		opts: FindOptions,
		now: u64,
	) -> Result<Vec<TransactionRecord>, StorageError> {
		let mut seen = HashSet::new();
		let mut results = Vec::new();
		for order_hash in order_hashes {
			for tx_hash in self.fill_index_for(order_hash).await? {
				if !seen.insert(tx_hash.clone()) {
					continue;
				}
				let Some(record) = self.find_by_hash(&tx_hash).await? else {
					continue;
				};
				if opts.unexpired_only && !record.is_unexpired(now) {
					continue;
				}
				if matches(&record) {
					results.push(record);
				}
			}
		}
		Ok(results)
	}

	/// Atomically creates a new record. Fails with `AlreadyExists` on a
	/// duplicate transaction hash (I2). Callers that need this check-and-
	/// insert to be race-free across concurrent requests for the same
	/// taker must hold their own per-taker lock around the call; this store
	/// does not serialize writes on its own.
	pub async fn create(&self, record: &TransactionRecord) -> Result<(), TransactionStoreError> {
		let key = record.transaction_hash.as_str();
		if self
			.storage
			.exists(StorageNamespace::Transactions.as_str(), key)
			.await?
		{
			return Err(TransactionStoreError::AlreadyExists);
		}
		self.storage
			.store(StorageNamespace::Transactions.as_str(), key, record, None)
			.await?;
		for fill in &record.order_fills {
			self.append_to_fill_index(&fill.order_hash, &record.transaction_hash)
				.await?;
		}
		Ok(())
	}

	/// Sums `takerAssetFillAmount` across matching records, grouped by
	/// order hash.
	pub async fn per_order_fill_sum(
		&self,
		order_hashes: &[Digest32],
		key: FillKey<'_>,
		opts: FindOptions,
		now: u64,
	) -> Result<HashMap<Digest32, U256>, StorageError> {
		let mut sums = HashMap::new();
		for order_hash in order_hashes {
			let mut sum = U256::ZERO;
			for tx_hash in self.fill_index_for(order_hash).await? {
				let Some(record) = self.find_by_hash(&tx_hash).await? else {
					continue;
				};
				if opts.unexpired_only && !record.is_unexpired(now) {
					continue;
				}
				let matches = match key {
					FillKey::Taker(addr) => &record.taker_address == addr,
					FillKey::TxOrigin(addr) => &record.tx_origin == addr,
				};
				if !matches {
					continue;
				}
				if let Some(amount) = record.fill_amount_for(order_hash) {
					sum += amount;
				}
			}
			sums.insert(order_hash.clone(), sum);
		}
		Ok(sums)
	}

	async fn fill_index_for(&self, order_hash: &Digest32) -> Result<Vec<Digest32>, StorageError> {
		match self
			.storage
			.retrieve::<Vec<String>>(StorageNamespace::OrderFillIndex.as_str(), order_hash.as_str())
			.await
		{
			Ok(hashes) => Ok(hashes.into_iter().map(Digest32).collect()),
			Err(StorageError::NotFound) => Ok(Vec::new()),
			Err(e) => Err(e),
		}
	}

	async fn append_to_fill_index(
		&self,
		order_hash: &Digest32,
		transaction_hash: &Digest32,
	) -> Result<(), StorageError> {
		let mut hashes = self.fill_index_for(order_hash).await?;
		if !hashes.contains(transaction_hash) {
			hashes.push(transaction_hash.clone());
		}
		let raw: Vec<String> = hashes.into_iter().map(|h| h.0).collect();
		self.storage
			.store(
				StorageNamespace::OrderFillIndex.as_str(),
				order_hash.as_str(),
				&raw,
				None,
			)
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::implementations::memory::MemoryStorage;
	use coordinator_types::order::OrderFill;

	fn store() -> TransactionStore {
		TransactionStore::new(StorageService::new(Box::new(MemoryStorage::new())))
	}

	fn hash(s: &str) -> Digest32 {
		Digest32(s.to_string())
	}

	fn record(tx_hash: &str, taker: &str, tx_origin: &str, order_hash: &str, amount: u64, expiration: u64) -> TransactionRecord {
		TransactionRecord {
			transaction_hash: hash(tx_hash),
			tx_origin: Address::new(tx_origin),
			taker_address: Address::new(taker),
			signatures: vec!["0xsig".to_string()],
			expiration_time_seconds: expiration,
			order_fills: vec![OrderFill {
				order_hash: hash(order_hash),
				taker_asset_fill_amount: U256::from(amount),
			}],
			created_at: 0,
		}
	}

	#[tokio::test]
	async fn create_rejects_duplicate_hash() {
		let store = store();
		let r = record("0xtx1", "0xtaker", "0xorigin", "0xorder1", 50, 1_000);
		store.create(&r).await.unwrap();
		let err = store.create(&r).await.unwrap_err();
		assert!(matches!(err, TransactionStoreError::AlreadyExists));
	}

	#[tokio::test]
	async fn find_by_hash_round_trips() {
		let store = store();
		let r = record("0xtx1", "0xtaker", "0xorigin", "0xorder1", 50, 1_000);
		store.create(&r).await.unwrap();
		let found = store.find_by_hash(&hash("0xtx1")).await.unwrap().unwrap();
		assert_eq!(found.transaction_hash, hash("0xtx1"));
	}

	#[tokio::test]
	async fn find_by_orders_and_taker_filters_by_taker() {
		let store = store();
		store
			.create(&record("0xtx1", "0xtaker1", "0xorigin1", "0xorder1", 50, 1_000))
			.await
			.unwrap();
		store
			.create(&record("0xtx2", "0xtaker2", "0xorigin2", "0xorder1", 30, 1_000))
			.await
			.unwrap();

		let taker1 = Address::new("0xtaker1");
		let results = store
			.find_by_orders_and_taker(&[hash("0xorder1")], Some(&taker1), FindOptions::default(), 0)
			.await
			.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].transaction_hash, hash("0xtx1"));

		let all = store
			.find_by_orders_and_taker(&[hash("0xorder1")], None, FindOptions::default(), 0)
			.await
			.unwrap();
		assert_eq!(all.len(), 2);
	}

	#[tokio::test]
	async fn unexpired_only_filters_out_expired_records() {
		let store = store();
		store
			.create(&record("0xtx1", "0xtaker1", "0xorigin1", "0xorder1", 50, 100))
			.await
			.unwrap();

		let taker1 = Address::new("0xtaker1");
		let opts = FindOptions { unexpired_only: true };
		let results = store
			.find_by_orders_and_taker(&[hash("0xorder1")], Some(&taker1), opts, 1_000)
			.await
			.unwrap();
		assert!(results.is_empty());
	}

	#[tokio::test]
	async fn per_order_fill_sum_aggregates_by_taker() {
		let store = store();
		store
			.create(&record("0xtx1", "0xtaker1", "0xorigin1", "0xorder1", 50, 1_000))
			.await
			.unwrap();
		store
			.create(&record("0xtx2", "0xtaker1", "0xorigin1", "0xorder1", 20, 1_000))
			.await
			.unwrap();

		let taker1 = Address::new("0xtaker1");
		let sums = store
			.per_order_fill_sum(
				&[hash("0xorder1")],
				FillKey::Taker(&taker1),
				FindOptions::default(),
				0,
			)
			.await
			.unwrap();
		assert_eq!(sums.get(&hash("0xorder1")), Some(&U256::from(70u64)));
	}

	#[tokio::test]
	async fn per_order_fill_sum_partitions_by_tx_origin_for_allowlisted_takers() {
		let store = store();
		store
			.create(&record("0xtx1", "0xcontract", "0xoriginA", "0xorder1", 50, 1_000))
			.await
			.unwrap();
		store
			.create(&record("0xtx2", "0xcontract", "0xoriginB", "0xorder1", 20, 1_000))
			.await
			.unwrap();

		let origin_a = Address::new("0xoriginA");
		let sums = store
			.per_order_fill_sum(
				&[hash("0xorder1")],
				FillKey::TxOrigin(&origin_a),
				FindOptions::default(),
				0,
			)
			.await
			.unwrap();
		assert_eq!(sums.get(&hash("0xorder1")), Some(&U256::from(50u64)));
	}
}
