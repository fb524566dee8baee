use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::block::Block;
use super::codec::HashDigest;
use super::crypto::Address;
use super::pool::TransactionPool;
use super::pow;
use super::transaction::{Sender, SenderProof, Transaction, TransactionError};
use crate::config::{BalancePolicy, NodeConfig};

/// The chain as exchanged between nodes
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChainEnvelope {
    pub chain: Vec<Block>,
}

/// Chain and pool, always mutated together under one lock
#[derive(Debug)]
struct Ledger {
    /// Never empty: starts at genesis and is only replaced by validated chains
    chain: Vec<Block>,
    pool: TransactionPool,
}

impl Ledger {
    fn last_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// Seals the current pool into a block and appends it
    fn create_block(&mut self, nonce: u64, previous_hash: HashDigest) -> &Block {
        let block = Block::new(nonce, previous_hash, self.pool.drain());
        self.chain.push(block);
        self.last_block()
    }

    fn balance_of(&self, address: &Address) -> f64 {
        let mut total = 0.0;
        for block in &self.chain {
            for transaction in &block.transactions {
                if &transaction.recipient == address {
                    total += transaction.value;
                }
                if transaction.sender.is(address) {
                    total -= transaction.value;
                }
            }
        }
        total
    }
}

/// Represents the blockchain
#[derive(Debug)]
pub struct Blockchain {
    ledger: Mutex<Ledger>,

    /// Recipient of mining rewards
    miner_address: Address,

    /// Mining difficulty (number of leading zero hex digits required in hash)
    difficulty: usize,

    /// Mining reward
    mining_reward: f64,

    balance_policy: BalancePolicy,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block and default settings
    #[cfg(test)]
    pub fn new(miner_address: Address) -> Self {
        Self::with_config(miner_address, &NodeConfig::default())
    }

    pub fn with_config(miner_address: Address, config: &NodeConfig) -> Self {
        let mut ledger = Ledger {
            chain: Vec::new(),
            pool: TransactionPool::new(),
        };
        ledger.chain.push(Block::new(0, Block::empty().hash(), Vec::new()));

        Blockchain {
            ledger: Mutex::new(ledger),
            miner_address,
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            balance_policy: config.balance_policy,
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        // A panic mid-mutation cannot leave a half-appended block behind
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn miner_address(&self) -> &Address {
        &self.miner_address
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Gets a copy of the entire chain
    pub fn chain(&self) -> Vec<Block> {
        self.ledger().chain.clone()
    }

    pub fn len(&self) -> usize {
        self.ledger().chain.len()
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> Block {
        self.ledger().last_block().clone()
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.ledger().pool.snapshot()
    }

    /// Admits a transaction into the pool.
    ///
    /// Shares the ledger lock with `mine`, so an admitted transaction is
    /// either sealed into the block being mined or still pending after it.
    pub fn add_transaction(
        &self,
        transaction: Transaction,
        proof: Option<&SenderProof>,
    ) -> Result<(), TransactionError> {
        transaction.check_value()?;

        if !transaction.verify(proof) {
            warn!(
                "Rejected transaction from {}: signature verification failed",
                transaction.sender.as_str()
            );
            return Err(TransactionError::InvalidSignature);
        }

        let mut ledger = self.ledger();

        if let (BalancePolicy::RequireSufficientFunds, Sender::Account(sender)) =
            (self.balance_policy, &transaction.sender)
        {
            let available = ledger.balance_of(sender);
            if available < transaction.value {
                warn!("Rejected transaction from {}: not enough balance", sender);
                return Err(TransactionError::InsufficientFunds {
                    required: transaction.value,
                    available,
                });
            }
        }

        ledger.pool.add(transaction);
        Ok(())
    }

    pub fn clear_pool(&self) {
        self.ledger().pool.clear();
    }

    /// Mines the pending transactions into a new block.
    ///
    /// Returns false without touching state when the pool is empty. The
    /// reward injection, proof of work search and append all happen under
    /// one held lock; admissions wait for the whole search.
    pub fn mine(&self) -> bool {
        let mut ledger = self.ledger();

        if ledger.pool.is_empty() {
            debug!("action=mining,status=skipped,reason=empty_pool");
            return false;
        }

        ledger
            .pool
            .add(Transaction::reward(self.miner_address.clone(), self.mining_reward));

        let transactions = ledger.pool.snapshot();
        let previous_hash = ledger.last_block().hash();
        let nonce = pow::solve(&previous_hash, &transactions, self.difficulty);

        let block = ledger.create_block(nonce, previous_hash);
        info!(
            "action=mining,status=success,nonce={},transactions={}",
            block.nonce,
            block.transactions.len()
        );

        true
    }

    /// Validates linkage and proof of work from index 1 onwards.
    ///
    /// The genesis block is taken as given; an empty chain is invalid.
    pub fn validate_chain(&self, chain: &[Block]) -> bool {
        validate_chain(chain, self.difficulty)
    }

    /// Replaces the local chain if `candidate` is strictly longer and valid
    pub fn replace_chain(&self, candidate: Vec<Block>) -> bool {
        if !self.validate_chain(&candidate) {
            return false;
        }

        let mut ledger = self.ledger();
        if candidate.len() <= ledger.chain.len() {
            return false;
        }

        ledger.chain = candidate;
        true
    }

    /// Replays every confirmed transaction to compute a balance
    pub fn total_balance(&self, address: &Address) -> f64 {
        self.ledger().balance_of(address)
    }
}

pub fn validate_chain(chain: &[Block], difficulty: usize) -> bool {
    let Some(mut previous) = chain.first() else {
        return false;
    };

    for block in &chain[1..] {
        if block.previous_hash != previous.hash() {
            return false;
        }

        if !pow::valid_proof(block.nonce, &block.previous_hash, &block.transactions, difficulty) {
            return false;
        }

        previous = block;
    }

    true
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::blockchain::{TransactionRequest, Wallet};

    fn config(difficulty: usize) -> NodeConfig {
        NodeConfig {
            difficulty,
            ..NodeConfig::default()
        }
    }

    fn submit(blockchain: &Blockchain, wallet: &Wallet, recipient: &str, value: f64) {
        let signed = TransactionRequest::signed(wallet, &Address::from(recipient), value)
            .unwrap()
            .validate()
            .unwrap();
        blockchain
            .add_transaction(signed.transaction, Some(&signed.proof))
            .unwrap();
    }

    /// A chain of `blocks` blocks including genesis
    pub(crate) fn mined_chain(blocks: usize, difficulty: usize) -> Vec<Block> {
        let blockchain = Blockchain::with_config(Address::from("miner"), &config(difficulty));
        let wallet = Wallet::new();
        while blockchain.len() < blocks {
            submit(&blockchain, &wallet, "bob", 1.0);
            assert!(blockchain.mine());
        }
        blockchain.chain()
    }

    #[test]
    fn test_new_blockchain() {
        let blockchain = Blockchain::new(Address::from("miner"));
        let chain = blockchain.chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].previous_hash, Block::empty().hash());
        assert!(chain[0].transactions.is_empty());
        assert!(blockchain.validate_chain(&chain));
    }

    #[test]
    fn test_add_transaction() {
        let blockchain = Blockchain::new(Address::from("miner"));
        let wallet = Wallet::new();

        submit(&blockchain, &wallet, "bob", 10.0);

        let pending = blockchain.pending_transactions();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].sender.is(wallet.address()));
    }

    #[test]
    fn test_rejects_bad_signature() {
        let blockchain = Blockchain::new(Address::from("miner"));
        let wallet = Wallet::new();
        let signed = TransactionRequest::signed(&wallet, &Address::from("bob"), 10.0)
            .unwrap()
            .validate()
            .unwrap();

        let mut forged = signed.transaction.clone();
        forged.value = 1000.0;

        let result = blockchain.add_transaction(forged, Some(&signed.proof));
        assert!(matches!(result, Err(TransactionError::InvalidSignature)));

        let result = blockchain.add_transaction(signed.transaction, None);
        assert!(matches!(result, Err(TransactionError::InvalidSignature)));

        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_system_transaction_bypasses_verification() {
        let blockchain = Blockchain::new(Address::from("miner"));

        blockchain
            .add_transaction(Transaction::reward(Address::from("bob"), 5.0), None)
            .unwrap();

        assert_eq!(blockchain.pending_transactions()[0].sender, Sender::System);
    }

    #[test]
    fn test_mine_block() {
        let blockchain = Blockchain::new(Address::from("miner"));
        let wallet = Wallet::new();

        submit(&blockchain, &wallet, "bob", 10.0);
        assert!(blockchain.mine());

        let chain = blockchain.chain();
        assert_eq!(chain.len(), 2);

        let block = &chain[1];
        assert_eq!(block.transactions.len(), 2); // Submitted transaction + mining reward
        assert!(block.transactions[0].sender.is(wallet.address()));

        let reward = &block.transactions[1];
        assert_eq!(reward.sender, Sender::System);
        assert_eq!(reward.recipient, Address::from("miner"));
        assert_eq!(reward.value, 1.0);

        assert_eq!(block.previous_hash, chain[0].hash());
        assert!(pow::valid_proof(block.nonce, &block.previous_hash, &block.transactions, 3));

        // Check that the pending transactions are cleared
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_mine_with_empty_pool_is_skipped() {
        let blockchain = Blockchain::new(Address::from("miner"));

        assert!(!blockchain.mine());
        assert_eq!(blockchain.len(), 1);
        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_end_to_end() {
        let blockchain = Blockchain::new(Address::from("miner"));
        let wallet = Wallet::new();
        assert_eq!(blockchain.len(), 1);

        submit(&blockchain, &wallet, "bob", 2.0);
        assert!(blockchain.mine());
        assert_eq!(blockchain.len(), 2);
        assert_eq!(blockchain.last_block().transactions.len(), 2);

        assert!(!blockchain.mine());
        assert_eq!(blockchain.len(), 2);
        assert!(blockchain.validate_chain(&blockchain.chain()));
    }

    #[test]
    fn test_validate_chain_detects_tampering() {
        let chain = mined_chain(4, 2);
        assert!(validate_chain(&chain, 2));

        for index in 1..chain.len() {
            let mut tampered = chain.clone();
            tampered[index].nonce += 1;
            // the tip has no successor, so only its own proof can break
            if index + 1 < chain.len() || !pow::valid_proof(
                tampered[index].nonce,
                &tampered[index].previous_hash,
                &tampered[index].transactions,
                2,
            ) {
                assert!(!validate_chain(&tampered, 2), "nonce change at {}", index);
            }

            let mut tampered = chain.clone();
            tampered[index].previous_hash[0] ^= 0x01;
            assert!(!validate_chain(&tampered, 2), "previous hash change at {}", index);
        }
    }

    #[test]
    fn test_validate_chain_edge_cases() {
        assert!(!validate_chain(&[], 3));
        assert!(validate_chain(&[Block::empty()], 3));

        // Genesis is not checked for proof of work
        let chain = mined_chain(2, 1);
        assert!(validate_chain(&chain, 1));
        assert!(!validate_chain(&chain, 64));
    }

    #[test]
    fn test_replace_chain_requires_longer_valid_chain() {
        let blockchain = Blockchain::with_config(Address::from("miner"), &config(1));
        let longer = mined_chain(3, 1);

        assert!(!blockchain.replace_chain(longer[..1].to_vec()));

        let mut invalid = longer.clone();
        invalid[2].previous_hash = [0u8; 32];
        assert!(!blockchain.replace_chain(invalid));

        assert!(blockchain.replace_chain(longer.clone()));
        assert_eq!(blockchain.chain(), longer);
    }

    #[test]
    fn test_total_balance() {
        let blockchain = Blockchain::with_config(Address::from("miner"), &config(1));
        let wallet = Wallet::new();

        submit(&blockchain, &wallet, "bob", 10.0);
        submit(&blockchain, &wallet, "carol", 2.5);
        assert!(blockchain.mine());

        // Pending transactions do not count
        submit(&blockchain, &wallet, "bob", 100.0);

        assert_eq!(blockchain.total_balance(&Address::from("bob")), 10.0);
        assert_eq!(blockchain.total_balance(&Address::from("carol")), 2.5);
        assert_eq!(blockchain.total_balance(wallet.address()), -12.5);
        assert_eq!(blockchain.total_balance(&Address::from("miner")), 1.0);
    }

    #[test]
    fn test_balance_policy() {
        let funded = NodeConfig {
            balance_policy: BalancePolicy::RequireSufficientFunds,
            ..config(1)
        };
        let wallet = Wallet::new();
        let blockchain = Blockchain::with_config(wallet.address().clone(), &funded);

        let signed = TransactionRequest::signed(&wallet, &Address::from("bob"), 1.0)
            .unwrap()
            .validate()
            .unwrap();
        let result = blockchain.add_transaction(signed.transaction.clone(), Some(&signed.proof));
        assert!(matches!(result, Err(TransactionError::InsufficientFunds { .. })));

        // Earn a reward, then spend it
        blockchain
            .add_transaction(Transaction::reward(Address::from("someone"), 0.0), None)
            .unwrap();
        assert!(blockchain.mine());
        assert_eq!(blockchain.total_balance(wallet.address()), 1.0);

        blockchain
            .add_transaction(signed.transaction, Some(&signed.proof))
            .unwrap();
    }

    #[test]
    fn test_negative_transfer_is_rejected_under_both_policies() {
        for balance_policy in [BalancePolicy::Unchecked, BalancePolicy::RequireSufficientFunds] {
            let config = NodeConfig {
                balance_policy,
                ..config(1)
            };
            let victim = Wallet::new();
            let blockchain = Blockchain::with_config(victim.address().clone(), &config);

            blockchain
                .add_transaction(Transaction::reward(Address::from("someone"), 0.0), None)
                .unwrap();
            assert!(blockchain.mine());
            assert_eq!(blockchain.total_balance(victim.address()), 1.0);

            // Signed by the thief, so the signature itself is valid
            let thief = Wallet::new();
            let transaction = Transaction::new(thief.address().clone(), victim.address().clone(), -1.0);
            let proof = SenderProof {
                public_key: *thief.public_key(),
                signature: thief.sign_digest(&transaction.digest()).unwrap().to_signature().unwrap(),
            };
            assert!(transaction.verify(Some(&proof)));

            let result = blockchain.add_transaction(transaction, Some(&proof));
            assert!(matches!(result, Err(TransactionError::InvalidValue(_))));
            assert!(blockchain.pending_transactions().is_empty());
            assert_eq!(blockchain.total_balance(victim.address()), 1.0);
            assert_eq!(blockchain.total_balance(thief.address()), 0.0);
        }
    }

    #[test]
    fn test_unchecked_policy_allows_overspending() {
        let blockchain = Blockchain::new(Address::from("miner"));
        let wallet = Wallet::new();

        submit(&blockchain, &wallet, "bob", 1_000_000.0);
        assert_eq!(blockchain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_concurrent_admission_is_never_lost() {
        use std::sync::Arc;
        use std::thread;

        let blockchain = Arc::new(Blockchain::with_config(Address::from("miner"), &config(2)));
        let wallet = Arc::new(Wallet::new());

        let submitters: Vec<_> = (0..4)
            .map(|_| {
                let blockchain = Arc::clone(&blockchain);
                let wallet = Arc::clone(&wallet);
                thread::spawn(move || {
                    for _ in 0..10 {
                        submit(&blockchain, &wallet, "bob", 1.0);
                    }
                })
            })
            .collect();

        let miner = {
            let blockchain = Arc::clone(&blockchain);
            thread::spawn(move || {
                for _ in 0..5 {
                    blockchain.mine();
                }
            })
        };

        for handle in submitters {
            handle.join().unwrap();
        }
        miner.join().unwrap();

        let confirmed = blockchain
            .chain()
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|t| !t.is_system())
            .count();
        let pending = blockchain.pending_transactions().len();

        assert_eq!(confirmed + pending, 40);
    }
}
