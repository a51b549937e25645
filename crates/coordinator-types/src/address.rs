//! Address and digest newtypes used throughout the coordinator.
//!
//! Addresses and hashes arrive over the wire as `0x`-prefixed hex strings
//! and are mostly compared, hashed, and echoed back rather than
//! arithmetically manipulated, so they are kept as validated hex strings
//! rather than converted to `alloy`'s fixed-size byte types at the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 20-byte Ethereum address, stored as a lowercase `0x`-prefixed hex string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub String);

impl Address {
	/// Creates an `Address` from any string, normalizing to lowercase with a
	/// `0x` prefix. Does not validate length; callers that need strict
	/// 20-byte validation should use [`Address::parse`].
	pub fn new(s: impl Into<String>) -> Self {
		let s = s.into();
		let lower = s.to_lowercase();
		Self(if lower.starts_with("0x") {
			lower
		} else {
			format!("0x{}", lower)
		})
	}

	/// Parses and validates a 20-byte hex address.
	pub fn parse(s: &str) -> Result<Self, AddressError> {
		let stripped = s.strip_prefix("0x").unwrap_or(s);
		let bytes = hex::decode(stripped).map_err(|_| AddressError::InvalidHex)?;
		if bytes.len() != 20 {
			return Err(AddressError::WrongLength(bytes.len()));
		}
		Ok(Self::new(s))
	}

	/// Returns the hex string, including its `0x` prefix.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Case-insensitive equality, since on-chain addresses are not checksum
	/// sensitive for our purposes.
	pub fn eq_ignore_case(&self, other: &Address) -> bool {
		self.0.eq_ignore_ascii_case(&other.0)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for Address {
	fn from(s: &str) -> Self {
		Address::new(s)
	}
}

/// Errors from parsing an [`Address`].
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
	#[error("address is not valid hex")]
	InvalidHex,
	#[error("address must decode to 20 bytes, got {0}")]
	WrongLength(usize),
}

/// A 32-byte digest, stored as a lowercase `0x`-prefixed hex string.
///
/// Used both for order hashes (deterministic over an order's fields, its
/// exchange address, and its chain id) and meta-transaction hashes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest32(pub String);

impl Digest32 {
	/// Builds a digest from raw bytes, typically the output of keccak256.
	pub fn from_bytes(bytes: [u8; 32]) -> Self {
		Self(format!("0x{}", hex::encode(bytes)))
	}

	/// Returns the hex string, including its `0x` prefix.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Decodes back to raw bytes; fails on malformed input.
	pub fn to_bytes(&self) -> Result<[u8; 32], AddressError> {
		let stripped = self.0.strip_prefix("0x").unwrap_or(&self.0);
		let bytes = hex::decode(stripped).map_err(|_| AddressError::InvalidHex)?;
		bytes
			.try_into()
			.map_err(|v: Vec<u8>| AddressError::WrongLength(v.len()))
	}
}

impl fmt::Display for Digest32 {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// An order hash: the deterministic digest identifying an order.
pub type OrderHash = Digest32;
/// A transaction hash: the digest of a signed meta-transaction.
pub type TxHash = Digest32;
