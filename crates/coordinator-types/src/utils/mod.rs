//! EIP-712 digest helpers used when building and verifying approvals, and
//! the canonical order-hash function derived from the same machinery.

pub mod eip712;
pub mod meta_tx_hash;
pub mod order_hash;

pub use eip712::{
	compute_coordinator_approval_struct_hash, compute_domain_hash, compute_final_digest,
	Eip712AbiEncoder, COORDINATOR_APPROVAL_DOMAIN_NAME, COORDINATOR_APPROVAL_TYPE, DOMAIN_TYPE,
};
pub use meta_tx_hash::hash_meta_transaction;
pub use order_hash::hash_order;
