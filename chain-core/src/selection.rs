//! Stake-weighted validator selection
//!
//! The draw must produce the identical result on every node: the seed
//! material (the previous block's content hash) is digested, the digest
//! seeds a ChaCha PRNG, and the stake table is walked in the order the
//! caller supplies: ascending node id, network-wide. Any node sealing a
//! block must be the selection result for the current tip; every receiver
//! re-runs the same draw and rejects a block whose claimed validator
//! differs.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::types::{Hash256, PublicKey};

/// Stakes are weighted in millionths so the draw stays in integer space
const UNITS_PER_COIN: u32 = 1_000_000;

fn to_units(stake: Decimal) -> u128 {
    (stake * Decimal::from(UNITS_PER_COIN))
        .trunc()
        .to_u128()
        .unwrap_or(0)
}

/// Pick the validator for the next block
///
/// `stakes` must already be in the network-agreed order (ascending node
/// id). Returns `None` when the total stake is zero: no one can mint.
pub fn select_validator(
    seed: &Hash256,
    stakes: &[(PublicKey, Decimal)],
) -> Option<PublicKey> {
    let total: u128 = stakes.iter().map(|(_, stake)| to_units(*stake)).sum();
    if total == 0 {
        return None;
    }

    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();

    let mut rng = ChaCha8Rng::from_seed(digest);
    let target = rng.gen_range(0..total);

    let mut cumulative: u128 = 0;
    for (key, stake) in stakes {
        cumulative += to_units(*stake);
        if cumulative > target {
            return Some(*key);
        }
    }
    // total > 0 guarantees the walk terminates above
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use rust_decimal_macros::dec;

    fn key(seed: u8) -> PublicKey {
        KeyPair::from_seed(&[seed; 32]).public_key()
    }

    #[test]
    fn test_zero_total_stake_selects_nobody() {
        let stakes = vec![(key(1), dec!(0)), (key(2), dec!(0))];
        assert_eq!(select_validator(&Hash256::zero(), &stakes), None);
        assert_eq!(select_validator(&Hash256::zero(), &[]), None);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let stakes = vec![
            (key(1), dec!(10)),
            (key(2), dec!(25)),
            (key(3), dec!(10)),
        ];
        let seed = Hash256::from_bytes([42u8; 32]);

        let first = select_validator(&seed, &stakes);
        assert!(first.is_some());
        for _ in 0..50 {
            assert_eq!(select_validator(&seed, &stakes), first);
        }
    }

    #[test]
    fn test_sole_staker_always_wins() {
        let stakes = vec![
            (key(1), dec!(0)),
            (key(2), dec!(40)),
            (key(3), dec!(0)),
        ];
        for byte in 0..32u8 {
            let seed = Hash256::from_bytes([byte; 32]);
            assert_eq!(select_validator(&seed, &stakes), Some(key(2)));
        }
    }

    #[test]
    fn test_zero_stake_entry_never_selected() {
        let stakes = vec![(key(1), dec!(10)), (key(2), dec!(0)), (key(3), dec!(10))];
        for byte in 0..64u8 {
            let seed = Hash256::from_bytes([byte; 32]);
            let picked = select_validator(&seed, &stakes).unwrap();
            assert_ne!(picked, key(2));
        }
    }

    #[test]
    fn test_different_seeds_spread_selection() {
        let stakes = vec![
            (key(1), dec!(10)),
            (key(2), dec!(10)),
            (key(3), dec!(10)),
            (key(4), dec!(10)),
        ];
        let mut seen = std::collections::HashSet::new();
        for byte in 0..255u8 {
            let seed = Hash256::from_bytes([byte; 32]);
            seen.insert(select_validator(&seed, &stakes).unwrap());
        }
        // With 255 seeds over 4 equal stakes, every validator gets picked
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_fractional_stakes_participate() {
        let stakes = vec![(key(1), dec!(0.5)), (key(2), dec!(0.5))];
        let seed = Hash256::from_bytes([7u8; 32]);
        assert!(select_validator(&seed, &stakes).is_some());
    }
}
