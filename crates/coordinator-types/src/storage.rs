//! Storage-related types for the coordinator.

use std::str::FromStr;

/// Namespaces for the two tables the coordinator owns.
///
/// This enum provides type safety for storage operations by replacing
/// string literals with strongly typed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageNamespace {
	/// Soft-cancel records, keyed by order hash.
	Orders,
	/// Granted approvals and cancel acknowledgements, keyed by transaction
	/// hash.
	Transactions,
	/// Index from an order hash to the transaction hashes that allocate a
	/// fill to it, used to compute per-order fill sums without a full scan.
	OrderFillIndex,
}

impl StorageNamespace {
	/// Returns the string representation of the namespace.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageNamespace::Orders => "orders",
			StorageNamespace::Transactions => "transactions",
			StorageNamespace::OrderFillIndex => "order_fill_index",
		}
	}

	/// Returns every namespace, for iterating when building TTL configuration.
	pub fn all() -> Vec<StorageNamespace> {
		vec![
			StorageNamespace::Orders,
			StorageNamespace::Transactions,
			StorageNamespace::OrderFillIndex,
		]
	}
}

/// Error returned when a string does not match a known namespace.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown storage namespace: {0}")]
pub struct UnknownNamespace(String);

impl FromStr for StorageNamespace {
	type Err = UnknownNamespace;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"orders" => Ok(StorageNamespace::Orders),
			"transactions" => Ok(StorageNamespace::Transactions),
			"order_fill_index" => Ok(StorageNamespace::OrderFillIndex),
			other => Err(UnknownNamespace(other.to_string())),
		}
	}
}
