//! Canonical order-hash computation.
//!
//! An order's hash is what the Order store keys its soft-cancel flag by. It
//! is computed the same way as an approval digest: an EIP-712 domain scoped
//! to the order's exchange contract and chain id, and a struct hash over
//! every order field, with the two `bytes`-typed asset-data fields hashed
//! rather than encoded inline per the EIP-712 dynamic-type rule.

use crate::address::Digest32;
use crate::order::Order;
use crate::utils::eip712::{compute_domain_hash, compute_final_digest, Eip712AbiEncoder};
use alloy_primitives::{keccak256, Address as AlloyAddress};
use std::str::FromStr;

/// Name used for the order's EIP-712 domain separator.
pub const ORDER_DOMAIN_NAME: &str = "0x Protocol";

pub const ORDER_TYPE: &str = "Order(address makerAddress,address takerAddress,address feeRecipientAddress,address senderAddress,uint256 makerAssetAmount,uint256 takerAssetAmount,uint256 makerFee,uint256 takerFee,uint256 expirationTimeSeconds,uint256 salt,bytes makerAssetData,bytes takerAssetData,bytes makerFeeAssetData,bytes takerFeeAssetData)";

fn alloy_address(addr: &crate::Address) -> AlloyAddress {
	AlloyAddress::from_str(addr.as_str()).unwrap_or(AlloyAddress::ZERO)
}

/// keccak256 of the raw bytes an asset-data hex string decodes to. Malformed
/// hex hashes as an empty byte string rather than panicking; callers further
/// up the stack reject malformed calldata before an order ever reaches here.
fn hash_asset_data(data: &str) -> alloy_primitives::B256 {
	let stripped = data.strip_prefix("0x").unwrap_or(data);
	let bytes = hex::decode(stripped).unwrap_or_default();
	keccak256(bytes)
}

/// Computes an order's canonical hash, deterministic over its fields, its
/// exchange address, and its chain id.
pub fn hash_order(order: &Order) -> Digest32 {
	let exchange = alloy_address(&order.exchange_address);
	let domain_hash = compute_domain_hash(ORDER_DOMAIN_NAME, order.chain_id, &exchange);
	let type_hash = keccak256(ORDER_TYPE.as_bytes());

	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&type_hash);
	enc.push_address(&alloy_address(&order.maker_address));
	enc.push_address(&alloy_address(&order.taker_address));
	enc.push_address(&alloy_address(&order.fee_recipient_address));
	enc.push_address(&alloy_address(&order.sender_address));
	enc.push_u256(order.maker_asset_amount);
	enc.push_u256(order.taker_asset_amount);
	enc.push_u256(order.maker_fee);
	enc.push_u256(order.taker_fee);
	enc.push_u256(order.expiration_time_seconds);
	enc.push_u256(order.salt);
	enc.push_b256(&hash_asset_data(&order.maker_asset_data));
	enc.push_b256(&hash_asset_data(&order.taker_asset_data));
	enc.push_b256(&hash_asset_data(&order.maker_fee_asset_data));
	enc.push_b256(&hash_asset_data(&order.taker_fee_asset_data));
	let struct_hash = keccak256(enc.finish());

	let digest = compute_final_digest(&domain_hash, &struct_hash);
	Digest32::from_bytes(digest.0)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Address;
	use alloy_primitives::U256;

	fn sample_order() -> Order {
		Order {
			sender_address: Address::new("0xcccccccccccccccccccccccccccccccccccccccc"),
			maker_address: Address::new("0x1111111111111111111111111111111111111111"),
			taker_address: Address::new("0x0000000000000000000000000000000000000000"),
			fee_recipient_address: Address::new("0x2222222222222222222222222222222222222222"),
			maker_asset_data: "0xf47261b0".to_string(),
			taker_asset_data: "0xf47261b0".to_string(),
			maker_fee_asset_data: "0x".to_string(),
			taker_fee_asset_data: "0x".to_string(),
			maker_asset_amount: U256::from(1_000u64),
			taker_asset_amount: U256::from(2_000u64),
			maker_fee: U256::ZERO,
			taker_fee: U256::ZERO,
			salt: U256::from(1u64),
			expiration_time_seconds: U256::from(9_999_999_999u64),
			exchange_address: Address::new("0x3333333333333333333333333333333333333333"),
			chain_id: 1,
		}
	}

	#[test]
	fn hash_is_deterministic() {
		let order = sample_order();
		assert_eq!(hash_order(&order), hash_order(&order));
	}

	#[test]
	fn hash_varies_with_salt() {
		let mut order = sample_order();
		let a = hash_order(&order);
		order.salt = U256::from(2u64);
		let b = hash_order(&order);
		assert_ne!(a, b);
	}

	#[test]
	fn hash_varies_with_chain_id() {
		let mut order = sample_order();
		let a = hash_order(&order);
		order.chain_id = 137;
		let b = hash_order(&order);
		assert_ne!(a, b);
	}
}
