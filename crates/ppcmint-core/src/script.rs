//! Output scripts and their standard classification.
//!
//! Scripts are kept in a typed form rather than raw opcodes. Classification
//! and address extraction follow the standard template names so callers can
//! decide whether an output is spendable or signable by a single key.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::constants::Network;
use crate::crypto::pubkey_hash;
use crate::types::Hash256;

/// Locking script attached to a transaction output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default,
)]
pub enum Script {
    /// Empty script. The first output of a coin-stake transaction carries one.
    #[default]
    Empty,
    /// Pay to a raw 32-byte Ed25519 public key.
    PayToPubKey([u8; 32]),
    /// Pay to the BLAKE3 hash of a public key.
    PayToPubKeyHash(Hash256),
    /// `required`-of-`keys.len()` multisignature.
    MultiSig { required: u8, keys: Vec<[u8; 32]> },
    /// Provably unspendable data carrier.
    NullData(Vec<u8>),
    /// Anything that does not match a standard template.
    NonStandard(Vec<u8>),
}

/// Standard script template classes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptClass {
    NonStandard,
    PubKey,
    PubKeyHash,
    MultiSig,
    NullData,
}

impl fmt::Display for ScriptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NonStandard => "nonstandard",
            Self::PubKey => "pubkey",
            Self::PubKeyHash => "pubkeyhash",
            Self::MultiSig => "multisig",
            Self::NullData => "nulldata",
        };
        f.write_str(name)
    }
}

impl Script {
    pub fn class(&self) -> ScriptClass {
        match self {
            Self::PayToPubKey(_) => ScriptClass::PubKey,
            Self::PayToPubKeyHash(_) => ScriptClass::PubKeyHash,
            Self::MultiSig { .. } => ScriptClass::MultiSig,
            Self::NullData(_) => ScriptClass::NullData,
            Self::Empty | Self::NonStandard(_) => ScriptClass::NonStandard,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Classify the script and extract the addresses it pays to.
    ///
    /// Returns `(class, addresses, required_signatures)`.
    pub fn extract_addresses(&self, network: Network) -> (ScriptClass, Vec<Address>, usize) {
        match self {
            Self::PayToPubKey(key) => (
                ScriptClass::PubKey,
                vec![Address::from_pubkey_hash(pubkey_hash(key), network)],
                1,
            ),
            Self::PayToPubKeyHash(hash) => (
                ScriptClass::PubKeyHash,
                vec![Address::from_pubkey_hash(*hash, network)],
                1,
            ),
            Self::MultiSig { required, keys } => (
                ScriptClass::MultiSig,
                keys.iter()
                    .map(|k| Address::from_pubkey_hash(pubkey_hash(k), network))
                    .collect(),
                usize::from(*required),
            ),
            Self::NullData(_) => (ScriptClass::NullData, Vec::new(), 0),
            Self::Empty | Self::NonStandard(_) => (ScriptClass::NonStandard, Vec::new(), 0),
        }
    }

    /// The public key of a pay-to-pubkey script.
    pub fn pay_to_pubkey_key(&self) -> Option<&[u8; 32]> {
        match self {
            Self::PayToPubKey(key) => Some(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pubkey_script_has_one_address() {
        let script = Script::PayToPubKey([3u8; 32]);
        let (class, addrs, req) = script.extract_addresses(Network::Mainnet);
        assert_eq!(class, ScriptClass::PubKey);
        assert_eq!(req, 1);
        assert_eq!(addrs, vec![Address::from_pubkey_hash(pubkey_hash(&[3u8; 32]), Network::Mainnet)]);
    }

    #[test]
    fn pubkey_hash_script_keeps_hash() {
        let script = Script::PayToPubKeyHash(Hash256([9; 32]));
        let (class, addrs, _) = script.extract_addresses(Network::Testnet);
        assert_eq!(class, ScriptClass::PubKeyHash);
        assert_eq!(addrs[0].pubkey_hash(), Hash256([9; 32]));
    }

    #[test]
    fn multisig_lists_every_key() {
        let script = Script::MultiSig {
            required: 2,
            keys: vec![[1; 32], [2; 32], [3; 32]],
        };
        let (class, addrs, req) = script.extract_addresses(Network::Mainnet);
        assert_eq!(class, ScriptClass::MultiSig);
        assert_eq!(addrs.len(), 3);
        assert_eq!(req, 2);
    }

    #[test]
    fn empty_and_nonstandard_have_no_addresses() {
        for script in [Script::Empty, Script::NonStandard(vec![0x6a, 0x00])] {
            let (class, addrs, req) = script.extract_addresses(Network::Mainnet);
            assert_eq!(class, ScriptClass::NonStandard);
            assert!(addrs.is_empty());
            assert_eq!(req, 0);
        }
    }

    #[test]
    fn class_display_names() {
        assert_eq!(ScriptClass::PubKey.to_string(), "pubkey");
        assert_eq!(ScriptClass::MultiSig.to_string(), "multisig");
    }
}
