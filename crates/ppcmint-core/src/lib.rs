//! # ppcmint-core
//! Protocol types, codecs, and collaborator traits for the ppcmint minter.

pub mod address;
pub mod constants;
pub mod crypto;
pub mod difficulty;
pub mod error;
pub mod script;
pub mod traits;
pub mod types;
