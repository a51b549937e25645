//! Event types for inter-service communication.
//!
//! This module defines the event system used by the coordinator for
//! asynchronous communication with connected listeners. Events flow through
//! a per-chain event bus, allowing WebSocket subscribers to observe the
//! lifecycle of a request without blocking the response path.

use crate::address::Digest32;
use crate::api::SignedMetaTx;
use crate::order::Order;
use crate::Address;
use serde::{Deserialize, Serialize};

/// Main event type broadcast on the event bus.
///
/// Serializes as `{"type": ..., "data": ...}` for WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CoordinatorEvent {
	/// A fill-family request has passed signature verification and entered
	/// the selective delay.
	FillRequestReceived {
		/// Hash of the signed meta-transaction.
		transaction_hash: Digest32,
	},
	/// A fill-family request has been signed and persisted.
	FillRequestAccepted {
		/// The decoded exchange function name.
		function_name: String,
		/// The in-scope orders this approval covers.
		orders: Vec<Order>,
		/// The transaction's declared origin.
		tx_origin: Address,
		/// The original signed meta-transaction, echoed back in full.
		signed_transaction: SignedMetaTx,
		/// The approval signatures, one per distinct fee-recipient.
		approval_signatures: Vec<String>,
		/// Shared expiration of the approval signatures.
		approval_expiration_time_seconds: u64,
	},
	/// A cancel-family request has been acknowledged and the soft-cancel
	/// flags applied.
	CancelRequestAccepted {
		/// The orders that were soft-cancelled by this request.
		order_hashes: Vec<Digest32>,
		/// The transaction's declared origin.
		tx_origin: Address,
		/// Hash of the signed meta-transaction.
		transaction_hash: Digest32,
	},
}
