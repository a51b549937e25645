//! EIP-712 digest helpers shared across the coordinator.
//!
//! These provide domain-hash computation, the final digest
//! (0x1901 || domainHash || structHash), a minimal ABI encoder for static
//! field types, and the struct hash for the coordinator's own approval type.

use alloy_primitives::{keccak256, Address as AlloyAddress, B256, U256};

pub const DOMAIN_TYPE: &str = "EIP712Domain(string name,uint256 chainId,address verifyingContract)";

/// Domain name the coordinator signs `CoordinatorApproval` structs under.
pub const COORDINATOR_APPROVAL_DOMAIN_NAME: &str = "0x Protocol Coordinator Server";

/// Type string for the struct the coordinator signs over: a commitment to
/// the meta-transaction hash, its declared origin, the coordinator's own
/// address, and the approval's expiration.
pub const COORDINATOR_APPROVAL_TYPE: &str =
	"CoordinatorApproval(bytes32 transactionHash,address txOrigin,address coordinator,uint256 approvalExpirationTimeSeconds)";

/// Computes the EIP-712 domain hash:
/// `keccak256(abi.encode(typeHash, nameHash, chainId, verifyingContract))`.
pub fn compute_domain_hash(name: &str, chain_id: u64, verifying_contract: &AlloyAddress) -> B256 {
	let domain_type_hash = keccak256(DOMAIN_TYPE.as_bytes());
	let name_hash = keccak256(name.as_bytes());
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&domain_type_hash);
	enc.push_b256(&name_hash);
	enc.push_u256(U256::from(chain_id));
	enc.push_address(verifying_contract);
	keccak256(enc.finish())
}

/// Computes the final EIP-712 digest: `keccak256(0x1901 || domainHash || structHash)`.
pub fn compute_final_digest(domain_hash: &B256, struct_hash: &B256) -> B256 {
	let mut out = Vec::with_capacity(2 + 32 + 32);
	out.push(0x19);
	out.push(0x01);
	out.extend_from_slice(domain_hash.as_slice());
	out.extend_from_slice(struct_hash.as_slice());
	keccak256(out)
}

/// Computes the struct hash for a `CoordinatorApproval`, the value every
/// fee-recipient key signs over to produce an approval signature.
pub fn compute_coordinator_approval_struct_hash(
	transaction_hash: &B256,
	tx_origin: &AlloyAddress,
	coordinator: &AlloyAddress,
	approval_expiration_time_seconds: u64,
) -> B256 {
	let type_hash = keccak256(COORDINATOR_APPROVAL_TYPE.as_bytes());
	let mut enc = Eip712AbiEncoder::new();
	enc.push_b256(&type_hash);
	enc.push_b256(transaction_hash);
	enc.push_address(tx_origin);
	enc.push_address(coordinator);
	enc.push_u256(U256::from(approval_expiration_time_seconds));
	keccak256(enc.finish())
}

/// Minimal ABI encoder for the static types used in EIP-712 struct hashing.
pub struct Eip712AbiEncoder {
	buf: Vec<u8>,
}

impl Default for Eip712AbiEncoder {
	fn default() -> Self {
		Self::new()
	}
}

impl Eip712AbiEncoder {
	pub fn new() -> Self {
		Self { buf: Vec::new() }
	}

	pub fn push_b256(&mut self, v: &B256) {
		self.buf.extend_from_slice(v.as_slice());
	}

	pub fn push_address(&mut self, addr: &AlloyAddress) {
		let mut word = [0u8; 32];
		word[12..].copy_from_slice(addr.as_slice());
		self.buf.extend_from_slice(&word);
	}

	pub fn push_u256(&mut self, v: U256) {
		let word: [u8; 32] = v.to_be_bytes::<32>();
		self.buf.extend_from_slice(&word);
	}

	pub fn finish(self) -> Vec<u8> {
		self.buf
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn domain_hash_is_deterministic() {
		let addr = AlloyAddress::ZERO;
		let a = compute_domain_hash("Coordinator", 1, &addr);
		let b = compute_domain_hash("Coordinator", 1, &addr);
		assert_eq!(a, b);
	}

	#[test]
	fn domain_hash_varies_with_chain_id() {
		let addr = AlloyAddress::ZERO;
		let a = compute_domain_hash("Coordinator", 1, &addr);
		let b = compute_domain_hash("Coordinator", 2, &addr);
		assert_ne!(a, b);
	}

	#[test]
	fn approval_struct_hash_varies_with_expiration() {
		let tx_hash = B256::repeat_byte(0x11);
		let origin = AlloyAddress::repeat_byte(0x22);
		let coordinator = AlloyAddress::repeat_byte(0x33);
		let a = compute_coordinator_approval_struct_hash(&tx_hash, &origin, &coordinator, 100);
		let b = compute_coordinator_approval_struct_hash(&tx_hash, &origin, &coordinator, 200);
		assert_ne!(a, b);
	}
}
