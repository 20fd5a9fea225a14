/// This file contains the definition of `Block`, the per-peer `BlockTree`
/// that stores every block a peer has accepted, and the balance-bookkeeping
/// validation rule that both block forging (mining) and block receipt run.
/// The longest path in a peer's `BlockTree` is that peer's main chain; its
/// tip is tracked by the peer itself (see `lib_peer`), not by this crate.
use crate::error::ChainError;
use crate::transaction::{PeerId, Transaction, TxId};
use crate::Time;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub type BlockId = String;

/// An immutable block: a batch of transactions applied, in order, on top of
/// a parent's balance snapshot, plus a fixed mining reward to `miner`.
/// `parent == None` identifies the genesis block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub parent: Option<BlockId>,
    pub timestamp: Time,
    /// Ordered, not a set: intra-block transaction order affects validity
    /// (see `apply`), so insertion order must be preserved.
    pub txs: Vec<Transaction>,
    pub miner: Option<PeerId>,
    pub height: u64,
    pub size_kb: u64,
    /// The balance snapshot after applying `txs` and the coinbase reward.
    /// Children derive their own balances from this map, never by re-
    /// walking the whole chain.
    pub balances: HashMap<PeerId, i64>,
}

const MINING_REWARD: i64 = 50;

impl Block {
    /// Builds the genesis block: height 0, no parent, no miner, balances
    /// seeded to zero for every peer id that will ever exist in this run.
    /// Seeding balances here, rather than mutating them after peers are
    /// constructed, keeps `Block` immutable from the moment it is created.
    pub fn genesis(peer_ids: &[PeerId]) -> Block {
        let mut hasher = Sha256::new();
        hasher.update(b"0");
        let id = hex::encode(hasher.finalize());
        let balances = peer_ids.iter().map(|&p| (p, 0i64)).collect();
        Block {
            id,
            parent: None,
            timestamp: 0.0,
            txs: Vec::new(),
            miner: None,
            height: 0,
            size_kb: 8,
            balances,
        }
    }

    fn compute_id(parent_id: &str, timestamp: Time, txs: &[Transaction], miner: PeerId) -> BlockId {
        let txs_joined = txs.iter().map(|tx| tx.id()).collect::<Vec<_>>().join(",");
        let payload = format!("{parent_id}:{timestamp}:{txs_joined}:{miner}");
        let mut hasher = Sha256::new();
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Forges a candidate block as a child of `parent`. Fails with the same
    /// `ChainError` a validating receiver would see, so a peer that loses a
    /// race against its own mempool sample (another transaction spent the
    /// balance first) can abort the attempt cleanly.
    pub fn forge(
        parent: &Block,
        timestamp: Time,
        txs: Vec<Transaction>,
        miner: PeerId,
    ) -> Result<Block, ChainError> {
        let balances = apply(&parent.balances, &txs, miner)?;
        let id = Self::compute_id(&parent.id, timestamp, &txs, miner);
        Ok(Block {
            id,
            parent: Some(parent.id.clone()),
            timestamp,
            size_kb: 8 * (txs.len() as u64 + 1),
            txs,
            miner: Some(miner),
            height: parent.height + 1,
            balances,
        })
    }

    /// Re-derives this block's balances from `parent_balances` and checks
    /// they match the balances it already carries. Used by a receiving peer
    /// to validate a block it did not itself forge. Always `false` for the
    /// genesis block, which has no miner and is never revalidated.
    pub fn revalidate(&self, parent_balances: &HashMap<PeerId, i64>) -> bool {
        match self.miner {
            None => false,
            Some(miner) => apply(parent_balances, &self.txs, miner)
                .map(|recomputed| recomputed == self.balances)
                .unwrap_or(false),
        }
    }
}

/// Applies `txs`, in order, to a copy of `parent_balances`, then credits the
/// mining reward to `miner`. This is the one balance-bookkeeping rule shared
/// by mining and validation: balance checks run against the *running* copy,
/// not the parent snapshot, so a transaction can spend funds credited
/// earlier in the same block, and a later transaction can be rejected even
/// though a different ordering of the same set would have made it valid.
fn apply(
    parent_balances: &HashMap<PeerId, i64>,
    txs: &[Transaction],
    miner: PeerId,
) -> Result<HashMap<PeerId, i64>, ChainError> {
    let mut balances = parent_balances.clone();
    for tx in txs {
        if tx.amount <= 0 {
            return Err(ChainError::NonPositiveAmount { amount: tx.amount });
        }
        let sender_balance = *balances.get(&tx.sender).unwrap_or(&0);
        if sender_balance < tx.amount {
            return Err(ChainError::InsufficientBalance {
                sender: tx.sender,
                balance: sender_balance,
                amount: tx.amount,
            });
        }
        *balances.entry(tx.sender).or_insert(0) -= tx.amount;
        *balances.entry(tx.receiver).or_insert(0) += tx.amount;
    }
    *balances.entry(miner).or_insert(0) += MINING_REWARD;
    Ok(balances)
}

/// A mutable per-peer wrapper around an immutable `Block`: when this peer
/// first accepted the block (`receive_time`) and which blocks it has seen
/// built directly on top of it. Children are stored as ids rather than
/// back-pointers, since `Block` itself has no knowledge of its descendants.
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub block: Rc<Block>,
    pub receive_time: Time,
    pub children: HashSet<BlockId>,
}

/// A peer's private view of all the blocks it has validated and accepted,
/// rooted at the genesis block. Every non-root node's parent is present in
/// `nodes`; a block whose parent is unknown is rejected by `insert` and
/// never stored (orphan blocks are dropped, not buffered, by this peer).
#[derive(Debug, Clone)]
pub struct BlockTree {
    pub root_id: BlockId,
    pub nodes: HashMap<BlockId, BlockNode>,
}

impl BlockTree {
    pub fn new(genesis: Rc<Block>, now: Time) -> BlockTree {
        let root_id = genesis.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(
            root_id.clone(),
            BlockNode {
                block: genesis,
                receive_time: now,
                children: HashSet::new(),
            },
        );
        BlockTree { root_id, nodes }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&BlockNode> {
        self.nodes.get(id)
    }

    /// Inserts `block` as a child of its (already-present) parent. Returns
    /// `Err(ChainError::OrphanBlock)` without mutating the tree if the
    /// parent is not yet known to this peer. A no-op if `block.id` is
    /// already present — gossip routinely delivers the same block twice
    /// (e.g. it bounces back from a neighbor that forwarded it before this
    /// peer's own dedup caught up), and re-inserting would otherwise reset
    /// `receive_time` and wipe out `children` already recorded against the
    /// existing node.
    pub fn insert(&mut self, block: Rc<Block>, now: Time) -> Result<(), ChainError> {
        let block_id = block.id.clone();
        if self.nodes.contains_key(&block_id) {
            return Ok(());
        }
        let parent_id = block
            .parent
            .clone()
            .expect("insert is never called with the genesis block");
        if !self.nodes.contains_key(&parent_id) {
            return Err(ChainError::OrphanBlock(parent_id));
        }
        self.nodes
            .get_mut(&parent_id)
            .expect("just checked contains_key")
            .children
            .insert(block_id.clone());
        self.nodes.insert(
            block_id,
            BlockNode {
                block,
                receive_time: now,
                children: HashSet::new(),
            },
        );
        Ok(())
    }

    /// The chain of block ids from `from` up to and including the root,
    /// walked iteratively so long chains never risk a stack overflow.
    pub fn path_to_root(&self, from: &str) -> Vec<BlockId> {
        let mut path = Vec::new();
        let mut current = Some(from.to_string());
        while let Some(id) = current {
            match self.nodes.get(&id) {
                Some(node) => {
                    path.push(id);
                    current = node.block.parent.clone();
                }
                None => break,
            }
        }
        path
    }

    /// The union of every transaction id along the path from `from` to the
    /// root. Used to filter a peer's mempool down to transactions not yet
    /// committed on its current main chain.
    pub fn tx_ids_on_path(&self, from: &str) -> HashSet<TxId> {
        let mut ids = HashSet::new();
        for block_id in self.path_to_root(from) {
            if let Some(node) = self.nodes.get(&block_id) {
                for tx in &node.block.txs {
                    ids.insert(tx.id());
                }
            }
        }
        ids
    }

    pub fn height_of(&self, id: &str) -> Option<u64> {
        self.nodes.get(id).map(|n| n.block.height)
    }
}
