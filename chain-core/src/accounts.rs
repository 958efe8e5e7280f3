//! Balance and stake accounting
//!
//! State is never stored: every query replays the sealed chain and the
//! pending pool. One source of truth means balances can never diverge from
//! the ledger that produced them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{Block, Party, PublicKey, Transaction, TxKind};
use crate::{Error, Result};

/// Network fee multiplier applied to coin transfers
pub const FEE_RATE: Decimal = dec!(1.03);

/// Baseline stake for any key with no stake deposit on record
///
/// Keeps brand-new peers out of zero-stake lockout.
pub const DEFAULT_STAKE: Decimal = dec!(10);

/// A message costs its character count (an anti-spam fee)
fn message_cost(message: &str) -> Decimal {
    Decimal::from(message.chars().count() as u64)
}

fn apply(tx: &Transaction, key: &PublicKey, balance: &mut Decimal) {
    if tx.receiver == Party::Key(*key) {
        *balance += tx.amount;
    }
    // Stake deposits move funds to the sink, not to another party, and a
    // depleted sender cannot be debited further
    if tx.sender == Party::Key(*key) && !tx.receiver.is_network() && *balance > Decimal::ZERO {
        match tx.kind {
            TxKind::Welcome => *balance -= tx.amount,
            TxKind::Coin => *balance -= FEE_RATE * tx.amount,
            TxKind::Message => *balance -= message_cost(&tx.message),
            _ => {}
        }
    }
}

/// Replay chain order then pool order into a balance for `key`
///
/// Never negative: the result is clamped to zero.
pub fn balance_of(chain: &[Block], pool: &[Transaction], key: &PublicKey) -> Decimal {
    let mut balance = Decimal::ZERO;
    for tx in chain
        .iter()
        .flat_map(|block| block.transactions.iter())
        .chain(pool.iter())
    {
        apply(tx, key, &mut balance);
    }
    balance.max(Decimal::ZERO)
}

/// Most recent stake deposit for `key`
///
/// Last value wins; the mempool shadows the chain. Falls back to
/// [`DEFAULT_STAKE`] when no deposit exists anywhere.
pub fn stake_of(chain: &[Block], pool: &[Transaction], key: &PublicKey) -> Decimal {
    for tx in pool.iter().rev() {
        if tx.kind == TxKind::Stake && tx.sender == Party::Key(*key) {
            return tx.amount;
        }
    }
    for block in chain.iter().rev() {
        for tx in block.transactions.iter().rev() {
            if tx.kind == TxKind::Stake && tx.sender == Party::Key(*key) {
                return tx.amount;
            }
        }
    }
    DEFAULT_STAKE
}

/// 1 + the highest nonce `key` has used across chain and pool
pub fn next_nonce(chain: &[Block], pool: &[Transaction], key: &PublicKey) -> u64 {
    let mut max_nonce = 0;
    for tx in chain
        .iter()
        .flat_map(|block| block.transactions.iter())
        .chain(pool.iter())
    {
        if tx.sender == Party::Key(*key) {
            max_nonce = max_nonce.max(tx.nonce);
        }
    }
    max_nonce + 1
}

/// Validate a transaction against the current (chain, pool) state
///
/// Checks, in order: non-negative amount, signature, nonce monotonicity,
/// and that the spendable balance (balance minus locked stake) covers the
/// kind's cost. Bootstrap kinds pass unconditionally.
pub fn validate_transaction(
    chain: &[Block],
    pool: &[Transaction],
    tx: &Transaction,
) -> Result<()> {
    if tx.amount < Decimal::ZERO {
        return Err(Error::InsufficientFunds(
            "amount must be non-negative".to_string(),
        ));
    }
    if !tx.verify() {
        return Err(Error::Signature(
            "transaction signature does not verify".to_string(),
        ));
    }
    if tx.is_bootstrap_exempt() {
        return Ok(());
    }

    let Party::Key(sender) = &tx.sender else {
        return Err(Error::Signature(
            "non-system transaction from the network sentinel".to_string(),
        ));
    };

    let expected = next_nonce(chain, pool, sender);
    if tx.nonce < expected {
        return Err(Error::NonceReplay {
            got: tx.nonce,
            expected,
        });
    }

    // Staked funds are locked, not spendable
    let available = balance_of(chain, pool, sender) - stake_of(chain, pool, sender);
    let required = match tx.kind {
        TxKind::Coin => FEE_RATE * tx.amount,
        TxKind::Message => message_cost(&tx.message),
        TxKind::Stake => tx.amount,
        // Exempt kinds returned above
        TxKind::Genesis | TxKind::Welcome => Decimal::ZERO,
    };
    if available < required {
        return Err(Error::InsufficientFunds(format!(
            "available {} cannot cover {}",
            available, required
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::types::{Block, Hash256};

    fn keypair(seed: u8) -> KeyPair {
        KeyPair::from_seed(&[seed; 32])
    }

    fn genesis_chain(kp: &KeyPair, total_nodes: u64, capacity: usize) -> Vec<Block> {
        let tx = Transaction::new(
            Party::Network,
            Party::Key(kp.public_key()),
            TxKind::Genesis,
            dec!(1000) * Decimal::from(total_nodes),
            "genesis",
            0,
        );
        vec![Block::seal(0, vec![tx], kp.public_key(), Hash256::zero(), capacity).unwrap()]
    }

    fn signed(
        from: &KeyPair,
        to: Party,
        kind: TxKind,
        amount: Decimal,
        message: &str,
        nonce: u64,
    ) -> Transaction {
        let mut tx = Transaction::new(Party::Key(from.public_key()), to, kind, amount, message, nonce);
        tx.sign(from).unwrap();
        tx
    }

    #[test]
    fn test_genesis_credits_bootstrap() {
        let kp = keypair(1);
        let chain = genesis_chain(&kp, 5, 5);
        assert_eq!(balance_of(&chain, &[], &kp.public_key()), dec!(5000));
    }

    #[test]
    fn test_coin_fee_is_three_percent() {
        // Capacity 5, five coin transfers of 10 each: 1000 - 5 * 10.30
        let a = keypair(1);
        let b = keypair(2);
        let mut chain = genesis_chain(&a, 1, 5);

        let txs: Vec<Transaction> = (1..=5)
            .map(|n| signed(&a, Party::Key(b.public_key()), TxKind::Coin, dec!(10), "", n))
            .collect();
        let tip = chain[0].current_hash;
        chain.push(Block::seal(1, txs, a.public_key(), tip, 5).unwrap());

        assert_eq!(balance_of(&chain, &[], &a.public_key()), dec!(948.5));
        assert_eq!(balance_of(&chain, &[], &b.public_key()), dec!(50));
    }

    #[test]
    fn test_message_costs_its_length() {
        let a = keypair(1);
        let b = keypair(2);
        let chain = genesis_chain(&a, 1, 5);
        let pool = vec![signed(
            &a,
            Party::Key(b.public_key()),
            TxKind::Message,
            dec!(0),
            "hello world",
            1,
        )];
        assert_eq!(balance_of(&chain, &pool, &a.public_key()), dec!(989));
    }

    #[test]
    fn test_balance_never_negative() {
        let a = keypair(1);
        let b = keypair(2);
        // No credit at all, then a welcome debit attempt
        let pool = vec![signed(
            &a,
            Party::Key(b.public_key()),
            TxKind::Welcome,
            dec!(100),
            "",
            1,
        )];
        assert_eq!(balance_of(&[], &pool, &a.public_key()), dec!(0));
    }

    #[test]
    fn test_stake_defaults_to_baseline() {
        let a = keypair(1);
        assert_eq!(stake_of(&[], &[], &a.public_key()), DEFAULT_STAKE);
    }

    #[test]
    fn test_pool_stake_shadows_chain() {
        let a = keypair(1);
        let mut chain = genesis_chain(&a, 1, 5);
        let tip = chain[0].current_hash;
        chain.push(
            Block::seal(
                1,
                vec![signed(&a, Party::Network, TxKind::Stake, dec!(40), "", 2)],
                a.public_key(),
                tip,
                5,
            )
            .unwrap(),
        );
        assert_eq!(stake_of(&chain, &[], &a.public_key()), dec!(40));

        let pool = vec![signed(&a, Party::Network, TxKind::Stake, dec!(75), "", 3)];
        assert_eq!(stake_of(&chain, &pool, &a.public_key()), dec!(75));
    }

    #[test]
    fn test_latest_chain_stake_wins() {
        let a = keypair(1);
        let mut chain = genesis_chain(&a, 1, 5);
        let tip = chain[0].current_hash;
        chain.push(
            Block::seal(
                1,
                vec![
                    signed(&a, Party::Network, TxKind::Stake, dec!(20), "", 2),
                    signed(&a, Party::Network, TxKind::Stake, dec!(35), "", 3),
                ],
                a.public_key(),
                tip,
                5,
            )
            .unwrap(),
        );
        assert_eq!(stake_of(&chain, &[], &a.public_key()), dec!(35));
    }

    #[test]
    fn test_next_nonce_spans_chain_and_pool() {
        let a = keypair(1);
        let b = keypair(2);
        let mut chain = genesis_chain(&a, 1, 5);
        let tip = chain[0].current_hash;
        chain.push(
            Block::seal(
                1,
                vec![signed(&a, Party::Key(b.public_key()), TxKind::Coin, dec!(5), "", 3)],
                a.public_key(),
                tip,
                5,
            )
            .unwrap(),
        );
        assert_eq!(next_nonce(&chain, &[], &a.public_key()), 4);

        let pool = vec![signed(&a, Party::Key(b.public_key()), TxKind::Coin, dec!(5), "", 7)];
        assert_eq!(next_nonce(&chain, &pool, &a.public_key()), 8);
        assert_eq!(next_nonce(&chain, &pool, &b.public_key()), 1);
    }

    #[test]
    fn test_validate_rejects_stale_nonce() {
        let a = keypair(1);
        let b = keypair(2);
        let chain = genesis_chain(&a, 1, 5);
        let pool = vec![signed(&a, Party::Key(b.public_key()), TxKind::Coin, dec!(5), "", 2)];

        let replay = signed(&a, Party::Key(b.public_key()), TxKind::Coin, dec!(5), "", 2);
        assert!(matches!(
            validate_transaction(&chain, &pool, &replay),
            Err(Error::NonceReplay {
                got: 2,
                expected: 3
            })
        ));
    }

    #[test]
    fn test_validate_rejects_unsigned() {
        let a = keypair(1);
        let b = keypair(2);
        let chain = genesis_chain(&a, 1, 5);
        let tx = Transaction::new(
            Party::Key(a.public_key()),
            Party::Key(b.public_key()),
            TxKind::Coin,
            dec!(5),
            "",
            1,
        );
        assert!(matches!(
            validate_transaction(&chain, &[], &tx),
            Err(Error::Signature(_))
        ));
    }

    #[test]
    fn test_validate_message_against_spendable_balance() {
        // Sender holds 15 with the default stake of 10: a 20-character
        // message cannot be afforded (neither could it with stake 0 and
        // balance 15, which is the distilled scenario)
        let a = keypair(1);
        let b = keypair(2);
        let welcome_pool = vec![{
            let mut tx = Transaction::new(
                Party::Key(b.public_key()),
                Party::Key(a.public_key()),
                TxKind::Welcome,
                dec!(15),
                "",
                1,
            );
            tx.sign(&b).unwrap();
            tx
        }];

        let message = signed(
            &a,
            Party::Key(b.public_key()),
            TxKind::Message,
            dec!(0),
            "twenty characters ok",
            1,
        );
        assert_eq!(message.message.chars().count(), 20);
        assert!(matches!(
            validate_transaction(&[], &welcome_pool, &message),
            Err(Error::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_validate_coin_includes_fee() {
        let a = keypair(1);
        let b = keypair(2);
        let chain = genesis_chain(&a, 1, 5);

        // Balance 1000, stake 10 → spendable 990; 990 / 1.03 caps the amount
        let affordable = signed(&a, Party::Key(b.public_key()), TxKind::Coin, dec!(900), "", 1);
        assert!(validate_transaction(&chain, &[], &affordable).is_ok());

        let too_much = signed(&a, Party::Key(b.public_key()), TxKind::Coin, dec!(970), "", 1);
        assert!(matches!(
            validate_transaction(&chain, &[], &too_much),
            Err(Error::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_validate_stake_against_spendable_balance() {
        let a = keypair(1);
        let chain = genesis_chain(&a, 1, 5);

        // Spendable is 1000 - 10 (default stake already locked)
        let fine = signed(&a, Party::Network, TxKind::Stake, dec!(990), "", 2);
        assert!(validate_transaction(&chain, &[], &fine).is_ok());

        let excessive = signed(&a, Party::Network, TxKind::Stake, dec!(991), "", 2);
        assert!(matches!(
            validate_transaction(&chain, &[], &excessive),
            Err(Error::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_bootstrap_kinds_always_pass() {
        let a = keypair(1);
        let b = keypair(2);
        // Welcome from an unfunded sender still validates
        let mut welcome = Transaction::new(
            Party::Key(a.public_key()),
            Party::Key(b.public_key()),
            TxKind::Welcome,
            dec!(1000),
            "",
            1,
        );
        welcome.sign(&a).unwrap();
        assert!(validate_transaction(&[], &[], &welcome).is_ok());

        let genesis = Transaction::new(
            Party::Network,
            Party::Key(a.public_key()),
            TxKind::Genesis,
            dec!(5000),
            "genesis",
            0,
        );
        assert!(validate_transaction(&[], &[], &genesis).is_ok());
    }
}
