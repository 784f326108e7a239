//! Eligible-output selection.
//!
//! Confirmation accounting and spent tracking belong to the [`TxStore`]; this
//! module only adds the stake-age gate the searches apply per anchor time.

use ppcmint_core::traits::TxStore;
use ppcmint_core::types::{BlockStamp, EligibleOutput};

use crate::error::MintError;

/// Spendable wallet outputs with at least `min_confirmations` confirmations
/// at `stamp`, in store iteration order. Empty when nothing qualifies.
pub fn find_eligible_outputs(
    store: &dyn TxStore,
    min_confirmations: u64,
    stamp: &BlockStamp,
) -> Result<Vec<EligibleOutput>, MintError> {
    Ok(store.eligible_outputs(min_confirmations, stamp)?)
}

/// Whether an output confirmed at `block_time` is old enough to stake at
/// `anchor`: `block_time + stake_min_age <= anchor - max_search_interval`.
pub fn stake_age_eligible(
    block_time: i64,
    stake_min_age: i64,
    anchor: i64,
    max_search_interval: i64,
) -> bool {
    block_time + stake_min_age <= anchor - max_search_interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppcmint_core::error::StoreError;
    use ppcmint_core::script::Script;
    use ppcmint_core::types::{BlockRef, Hash256, OutPoint};
    use proptest::prelude::*;

    struct FixedStore(Result<Vec<EligibleOutput>, StoreError>);

    impl TxStore for FixedStore {
        fn eligible_outputs(&self, _: u64, _: &BlockStamp) -> Result<Vec<EligibleOutput>, StoreError> {
            self.0.clone()
        }
        fn set_kernel_stake_modifier(&self, _: &Hash256, _: u64) -> Result<(), StoreError> {
            Ok(())
        }
        fn block(&self, _: &Hash256) -> Result<Option<BlockRef>, StoreError> {
            Ok(None)
        }
        fn mark_dirty(&self) {}
        fn balance(&self, _: u64, _: &BlockStamp) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    fn stamp() -> BlockStamp {
        BlockStamp { height: 100, hash: Hash256::ZERO }
    }

    #[test]
    fn empty_wallet_is_not_an_error() {
        let store = FixedStore(Ok(vec![]));
        assert!(find_eligible_outputs(&store, 6, &stamp()).unwrap().is_empty());
    }

    #[test]
    fn store_failure_propagates() {
        let store = FixedStore(Err(StoreError::Io("disk gone".into())));
        assert_eq!(
            find_eligible_outputs(&store, 6, &stamp()),
            Err(MintError::Store(StoreError::Io("disk gone".into())))
        );
    }

    #[test]
    fn store_order_is_kept() {
        let out = |i: u32| EligibleOutput {
            outpoint: OutPoint { txid: Hash256([i as u8; 32]), index: i },
            amount: 1,
            block: BlockRef { height: 1, hash: Hash256::ZERO, time: 0, kernel_stake_modifier: None },
            tx_offset: 0,
            tx_time: 0,
            script: Script::Empty,
        };
        let store = FixedStore(Ok(vec![out(3), out(1), out(2)]));
        let indices: Vec<u32> = find_eligible_outputs(&store, 6, &stamp())
            .unwrap()
            .iter()
            .map(|o| o.outpoint.index)
            .collect();
        assert_eq!(indices, vec![3, 1, 2]);
    }

    #[test]
    fn age_gate_boundary() {
        // min age 500, interval 60, anchor 1000: qualifies iff block time <= 440.
        assert!(stake_age_eligible(440, 500, 1_000, 60));
        assert!(stake_age_eligible(0, 500, 1_000, 60));
        assert!(!stake_age_eligible(441, 500, 1_000, 60));
    }

    proptest! {
        #[test]
        fn age_gate_matches_inequality(
            block_time in 0i64..2_000_000_000,
            min_age in 0i64..10_000_000,
            anchor in 0i64..2_000_000_000,
            interval in 0i64..3_600,
        ) {
            let eligible = stake_age_eligible(block_time, min_age, anchor, interval);
            prop_assert_eq!(eligible, block_time <= anchor - interval - min_age);
        }
    }
}
