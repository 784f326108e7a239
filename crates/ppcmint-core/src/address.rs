//! Base58Check addresses.
//!
//! An address is `version || pubkey_hash (32 bytes) || checksum (4 bytes)`,
//! Base58-encoded. The checksum is the first four bytes of the double
//! SHA-256 of the version and hash. The version byte selects the network.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::constants::Network;
use crate::crypto::PublicKey;
use crate::error::AddressError;
use crate::types::Hash256;

const PAYLOAD_LEN: usize = 1 + 32 + 4;

/// A wallet address identifying a public key by its hash.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    network: Network,
    pubkey_hash: Hash256,
}

impl Address {
    pub fn from_pubkey_hash(pubkey_hash: Hash256, network: Network) -> Self {
        Self {
            network,
            pubkey_hash,
        }
    }

    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_pubkey_hash(public_key.pubkey_hash(), network)
    }

    pub fn pubkey_hash(&self) -> Hash256 {
        self.pubkey_hash
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Encode as a Base58Check string.
    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.push(self.network.address_version());
        payload.extend_from_slice(self.pubkey_hash.as_bytes());
        let check = checksum(&payload);
        payload.extend_from_slice(&check);
        bs58::encode(payload).into_string()
    }

    /// Decode a Base58Check string.
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressError::InvalidBase58(e.to_string()))?;
        if bytes.len() != PAYLOAD_LEN {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let (body, check) = bytes.split_at(PAYLOAD_LEN - 4);
        if checksum(body) != check {
            return Err(AddressError::InvalidChecksum);
        }
        let network = Network::from_address_version(body[0])
            .ok_or(AddressError::UnknownVersion(body[0]))?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&body[1..]);
        Ok(Self::from_pubkey_hash(Hash256(hash), network))
    }
}

fn checksum(data: &[u8]) -> [u8; 4] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}
