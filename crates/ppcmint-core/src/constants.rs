//! Protocol constants. All monetary values in base units (1 PPC = 10^6 units).

use serde::{Deserialize, Serialize};

pub const COIN: u64 = 1_000_000;

/// Seconds in one day, the coin-age time unit.
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Coin age stops accruing after this many seconds.
pub const STAKE_MAX_AGE: i64 = 90 * SECONDS_PER_DAY;

/// Minimum stake age on mainnet.
pub const MAINNET_STAKE_MIN_AGE: i64 = 30 * SECONDS_PER_DAY;

/// Minimum stake age on testnet.
pub const TESTNET_STAKE_MIN_AGE: i64 = SECONDS_PER_DAY;

/// Proof-of-work limit in compact form. Difficulty 1 corresponds to this target.
pub const POW_LIMIT_BITS: u32 = 0x1d00ffff;

/// Confirmations an output needs before it may stake.
pub const MIN_STAKE_CONFIRMATIONS: u64 = 6;

/// Seconds of slack between an output's minimum age and the search anchor.
pub const MAX_STAKE_SEARCH_INTERVAL: i64 = 60;

/// Timestamps tried per output by the real-time minter (`anchor - 0 ..= anchor - 59`).
pub const MINT_SEARCH_ATTEMPTS: i64 = 60;

/// Default diagnostic horizon when no max time is given (30 days).
pub const FIND_STAKE_DEFAULT_HORIZON: i64 = 30 * SECONDS_PER_DAY;

/// Default port for the minter's JSON-RPC server.
pub const DEFAULT_RPC_PORT: u16 = 9904;

/// Network selector: decides address prefixes and stake parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network with a one-day minimum stake age.
    Testnet,
}

impl Network {
    /// Base58 version byte for pay-to-pubkey-hash style addresses.
    pub fn address_version(&self) -> u8 {
        match self {
            Self::Mainnet => 55,
            Self::Testnet => 111,
        }
    }

    /// Look up a network from an address version byte.
    pub fn from_address_version(version: u8) -> Option<Self> {
        match version {
            55 => Some(Self::Mainnet),
            111 => Some(Self::Testnet),
            _ => None,
        }
    }

    /// Default minimum stake age for this network.
    pub fn stake_min_age(&self) -> i64 {
        match self {
            Self::Mainnet => MAINNET_STAKE_MIN_AGE,
            Self::Testnet => TESTNET_STAKE_MIN_AGE,
        }
    }

    /// Data directory suffix for this network.
    pub fn data_dir_suffix(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

/// Consensus parameters consumed by the minting engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetParams {
    pub network: Network,
    /// Minimum seconds an output must age before it can stake.
    pub stake_min_age: i64,
    /// Seconds after which coin age stops accruing.
    pub stake_max_age: i64,
    /// Base units per coin.
    pub coin: u64,
    /// Compact proof-of-work limit (difficulty 1).
    pub pow_limit_bits: u32,
}

impl NetParams {
    /// Parameters for the given network with its default stake ages.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            stake_min_age: network.stake_min_age(),
            stake_max_age: STAKE_MAX_AGE,
            coin: COIN,
            pow_limit_bits: POW_LIMIT_BITS,
        }
    }
}
