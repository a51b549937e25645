//! Meta-transaction hash computation.
//!
//! The digest a [`SignedMetaTx`] is identified and replay-guarded by (I2),
//! and the value the approval signer's `CoordinatorApproval.transactionHash`
//! field commits to. Built with the same EIP-712 machinery as the order hash
//! and the approval struct hash, scoped to the meta-transaction's own domain
//! and type.

use crate::address::Digest32;
use crate::api::SignedMetaTx;
use crate::utils::eip712::{compute_domain_hash, compute_final_digest, Eip712AbiEncoder};
use alloy_primitives::{keccak256, Address as AlloyAddress};
use std::str::FromStr;

pub const META_TRANSACTION_DOMAIN_NAME: &str = "0x Protocol Meta Transaction";

pub const META_TRANSACTION_TYPE: &str = "MetaTransaction(uint256 salt,uint256 expirationTimeSeconds,uint256 gasPrice,address signerAddress,bytes data)";

fn alloy_address(addr: &crate::Address) -> AlloyAddress {
	AlloyAddress::from_str(addr.as_str()).unwrap_or(AlloyAddress::ZERO)
}

/// Computes the deterministic digest of a signed meta-transaction.
pub fn hash_meta_transaction(meta_tx: &SignedMetaTx) -> Digest32 {
	let verifying_contract = alloy_address(&meta_tx.domain.verifying_contract);
	let domain_hash =
		compute_domain_hash(META_TRANSACTION_DOMAIN_NAME, meta_tx.domain.chain_id, &verifying_contract);

	let type_hash = keccak256(META_TRANSACTION_TYPE.as_bytes());
	let stripped = meta_tx.data.strip_prefix("0x").unwrap_or(&meta_tx.data);
	let data_bytes = hex::decode(stripped).unwrap_or_default();
	let data_hash = keccak256(data_bytes);

	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&type_hash);
	enc.push_u256(meta_tx.salt);
	enc.push_u256(meta_tx.expiration_time_seconds);
	enc.push_u256(meta_tx.gas_price);
	enc.push_address(&alloy_address(&meta_tx.signer_address));
	enc.push_b256(&data_hash);
	let struct_hash = keccak256(enc.finish());

	let digest = compute_final_digest(&domain_hash, &struct_hash);
	Digest32::from_bytes(digest.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::api::SignedMetaTxDomain;
	use alloy_primitives::U256;

	fn sample() -> SignedMetaTx {
		SignedMetaTx {
			signer_address: crate::Address::new("0x1111111111111111111111111111111111111111"),
			salt: U256::from(1u64),
			expiration_time_seconds: U256::from(1_000u64),
			gas_price: U256::from(1u64),
			data: "0xabcdef".to_string(),
			domain: SignedMetaTxDomain {
				chain_id: 1,
				verifying_contract: crate::Address::new("0x2222222222222222222222222222222222222222"),
			},
			signature: "0xsig".to_string(),
		}
	}

	#[test]
	fn hash_is_deterministic() {
		let a = hash_meta_transaction(&sample());
		let b = hash_meta_transaction(&sample());
		assert_eq!(a, b);
	}

	#[test]
	fn hash_varies_with_data() {
		let mut tx = sample();
		let a = hash_meta_transaction(&tx);
		tx.data = "0xabcdff".to_string();
		let b = hash_meta_transaction(&tx);
		assert_ne!(a, b);
	}

	#[test]
	fn hash_varies_with_salt() {
		let mut tx = sample();
		let a = hash_meta_transaction(&tx);
		tx.salt = U256::from(2u64);
		let b = hash_meta_transaction(&tx);
		assert_ne!(a, b);
	}
}
