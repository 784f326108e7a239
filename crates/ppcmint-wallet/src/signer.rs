//! Block signing with the key that owns the block's reward output.
//!
//! The reward output is transaction 1 output 1 of a proof-of-stake block
//! (the coin-stake's first paying output), and transaction 0 output 0 of any
//! other block. Only single-key pay-to-pubkey outputs can be signed.

use ppcmint_core::constants::NetParams;
use ppcmint_core::crypto::PublicKey;
use ppcmint_core::script::ScriptClass;
use ppcmint_core::traits::Keystore;
use ppcmint_core::types::{Block, TxOutput};
use tracing::debug;

use crate::error::MintError;

fn reward_output(block: &Block) -> Result<&TxOutput, MintError> {
    let (tx_index, out_index) = if block.is_proof_of_stake() { (1, 1) } else { (0, 0) };
    block
        .transactions
        .get(tx_index)
        .and_then(|tx| tx.outputs.get(out_index))
        .ok_or(MintError::MissingRewardOutput { tx_index, out_index })
}

/// Sign the block hash with the reward output's key.
///
/// Only `block.signature` is written, and only on success.
pub fn sign_block(
    block: &mut Block,
    params: &NetParams,
    keystore: &dyn Keystore,
) -> Result<(), MintError> {
    let output = reward_output(block)?;
    let (class, addresses, _) = output.script.extract_addresses(params.network);
    if class != ScriptClass::PubKey {
        return Err(MintError::UnsupportedTransaction(class));
    }
    let address = addresses.into_iter().next().ok_or(MintError::NoAddress)?;

    let key = keystore.lookup(&address)?.private_key()?;
    let hash = block.hash();
    block.signature = key.sign(hash.as_bytes()).to_vec();
    debug!(block = %hash, %address, "block signed");
    Ok(())
}

/// Check `block.signature` against the reward output's public key.
pub fn verify_block_signature(block: &Block, params: &NetParams) -> Result<(), MintError> {
    let output = reward_output(block)?;
    let key = output
        .script
        .pay_to_pubkey_key()
        .ok_or_else(|| MintError::UnsupportedTransaction(output.script.extract_addresses(params.network).0))?;
    let public_key = PublicKey::from_bytes(key)?;
    public_key.verify(block.hash().as_bytes(), &block.signature)?;
    Ok(())
}
