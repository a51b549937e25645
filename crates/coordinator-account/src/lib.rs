//! Account management for the coordinator server.
//!
//! A chain's fee-recipient keyring holds the private keys the coordinator
//! signs approvals with. Unlike a solver, which signs and broadcasts its own
//! transactions, the coordinator never sends a transaction of its own: every
//! identity here only ever signs a 32-byte EIP-712 digest handed to it by
//! the approval signer.

use alloy_primitives::Address as AlloyAddress;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use coordinator_types::{Address, SecretString};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

/// The one-byte 0x-protocol signature-type marker appended to every
/// approval signature, identifying it as an EIP-712 signature.
const SIGNATURE_TYPE_EIP712: u8 = 0x02;

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// A configured private key does not parse as a valid secp256k1 key.
	#[error("invalid key: {0}")]
	InvalidKey(String),
	/// A configured private key's derived address does not match the
	/// address it was declared under.
	#[error("fee recipient {declared} does not match key-derived address {derived}")]
	AddressMismatch { declared: String, derived: String },
	/// No fee recipient with this address is held by the keyring.
	#[error("unknown fee recipient: {0}")]
	UnknownFeeRecipient(String),
	/// The underlying signer rejected the signing request.
	#[error("signing failed: {0}")]
	SigningFailed(String),
}

/// A single fee-recipient identity: an address and the key that signs on
/// its behalf.
#[async_trait]
pub trait FeeRecipientSigner: Send + Sync {
	/// The address this identity signs for.
	fn address(&self) -> &Address;

	/// Signs a 32-byte digest, returning a hex-encoded `r||s||v||type`
	/// signature with the EIP-712 type marker appended.
	async fn sign_digest(&self, digest: &[u8; 32]) -> Result<String, AccountError>;
}

/// Local private-key implementation of [`FeeRecipientSigner`].
pub struct LocalFeeRecipient {
	address: Address,
	signer: PrivateKeySigner,
}

impl LocalFeeRecipient {
	/// Builds an identity from a hex-encoded private key, validating that
	/// the key derives the declared address (spec data model, "for every
	/// recipient, the address must equal the address derived from the
	/// private key").
	pub fn new(declared_address: &str, private_key_hex: &SecretString) -> Result<Self, AccountError> {
		let signer = private_key_hex
			.expose_secret()
			.parse::<PrivateKeySigner>()
			.map_err(|e| AccountError::InvalidKey(e.to_string()))?;

		let declared = Address::new(declared_address);
		let derived = Address::new(signer.address().to_string());
		if !declared.eq_ignore_case(&derived) {
			return Err(AccountError::AddressMismatch {
				declared: declared.as_str().to_string(),
				derived: derived.as_str().to_string(),
			});
		}

		Ok(Self {
			address: declared,
			signer,
		})
	}
}

#[async_trait]
impl FeeRecipientSigner for LocalFeeRecipient {
	fn address(&self) -> &Address {
		&self.address
	}

	async fn sign_digest(&self, digest: &[u8; 32]) -> Result<String, AccountError> {
		let hash = alloy_primitives::B256::from(*digest);
		let signature = self
			.signer
			.sign_hash(&hash)
			.await
			.map_err(|e| AccountError::SigningFailed(e.to_string()))?;

		let mut bytes = signature.as_bytes().to_vec();
		bytes.push(SIGNATURE_TYPE_EIP712);
		Ok(format!("0x{}", hex::encode(bytes)))
	}
}

/// A chain's set of fee-recipient identities, keyed by address.
///
/// Immutable after construction; safe to share across concurrent request
/// tasks via `Arc`.
pub struct FeeRecipientKeyring {
	recipients: HashMap<Address, Box<dyn FeeRecipientSigner>>,
}

impl FeeRecipientKeyring {
	/// Builds a keyring from `(address, private_key)` pairs, rejecting the
	/// whole chain's configuration if any identity fails the
	/// address-matches-private-key check.
	pub fn from_configs(
		entries: impl IntoIterator<Item = (String, SecretString)>,
	) -> Result<Self, AccountError> {
		let mut recipients: HashMap<Address, Box<dyn FeeRecipientSigner>> = HashMap::new();
		for (address, private_key) in entries {
			let recipient = LocalFeeRecipient::new(&address, &private_key)?;
			recipients.insert(recipient.address().clone(), Box::new(recipient));
		}
		Ok(Self { recipients })
	}

	/// Whether this keyring holds the given address.
	pub fn holds(&self, address: &Address) -> bool {
		self.recipients.contains_key(address)
	}

	/// Signs a digest with the named fee recipient's key.
	pub async fn sign(&self, address: &Address, digest: &[u8; 32]) -> Result<String, AccountError> {
		let recipient = self
			.recipients
			.get(address)
			.ok_or_else(|| AccountError::UnknownFeeRecipient(address.as_str().to_string()))?;
		recipient.sign_digest(digest).await
	}

	/// The number of identities held.
	pub fn len(&self) -> usize {
		self.recipients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.recipients.is_empty()
	}
}

/// Parses a hex address string into `alloy_primitives::Address`, used only
/// where the signer crate's own address type is required.
pub fn alloy_address(address: &Address) -> Result<AlloyAddress, AccountError> {
	AlloyAddress::from_str(address.as_str())
		.map_err(|e| AccountError::InvalidKey(format!("bad address: {}", e)))
}

#[cfg(test)]
mod tests {
	use super::*;

	// Arbitrary 32-byte secp256k1 scalar used only to exercise key parsing;
	// not tied to any real funded account.
	const SOME_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690";

	fn derived_address(key: &str) -> String {
		key.parse::<PrivateKeySigner>().unwrap().address().to_string()
	}

	#[test]
	fn valid_key_matches_derived_address() {
		let address = derived_address(SOME_KEY);
		assert!(LocalFeeRecipient::new(&address, &SecretString::from(SOME_KEY)).is_ok());
	}

	#[test]
	fn mismatched_declared_address_is_rejected() {
		let wrong_address = "0x0000000000000000000000000000000000000001";
		let err =
			LocalFeeRecipient::new(wrong_address, &SecretString::from(SOME_KEY)).unwrap_err();
		assert!(matches!(err, AccountError::AddressMismatch { .. }));
	}

	#[test]
	fn malformed_key_is_rejected() {
		let address = "0x0000000000000000000000000000000000000001";
		let err =
			LocalFeeRecipient::new(address, &SecretString::from("0xnotavalidkey")).unwrap_err();
		assert!(matches!(err, AccountError::InvalidKey(_)));
	}

	#[tokio::test]
	async fn keyring_rejects_unknown_recipient() {
		let keyring = FeeRecipientKeyring::from_configs(std::iter::empty()).unwrap();
		let addr = Address::new("0x0000000000000000000000000000000000000001");
		let err = keyring.sign(&addr, &[0u8; 32]).await.unwrap_err();
		assert!(matches!(err, AccountError::UnknownFeeRecipient(_)));
	}

	#[tokio::test]
	async fn keyring_signs_with_matching_recipient() {
		let address = derived_address(SOME_KEY);
		let keyring = FeeRecipientKeyring::from_configs([(
			address.clone(),
			SecretString::from(SOME_KEY),
		)])
		.unwrap();
		let addr = Address::new(&address);
		assert!(keyring.holds(&addr));
		let sig = keyring.sign(&addr, &[7u8; 32]).await.unwrap();
		assert!(sig.starts_with("0x"));
		// r(32) + s(32) + v(1) + type(1) = 66 bytes = 132 hex chars + 0x
		assert_eq!(sig.len(), 2 + 132);
	}
}
