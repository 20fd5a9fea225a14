/// `Peer` is the local state machine described in `examples/original_source/
/// peer.py` (`generate_transactions`, `receive_transaction`,
/// `forward_transaction`, `receive_block`, `create_block`, `broadcast_block`),
/// reimplemented against `lib_scheduler`'s cooperative processes and
/// `lib_network`'s delivery primitives instead of `simpy` generators and
/// direct object references. A peer never touches another peer directly —
/// every interaction goes through `Network`.
use lib_chain::{Block, BlockId, BlockTree, PeerId, Transaction, TxId};
use lib_network::{Network, PeerEndpoint, Speed};
use lib_scheduler::{Scheduler, Time};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use rand_pcg::Pcg32;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

/// A peer's CPU class. Recorded for status reporting; the driver folds it
/// into the `hashing_power` value a peer is actually constructed with
/// (§4.6), so `Peer` itself never re-derives hashing power from this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cpu {
    Low,
    High,
}

/// One participant in the simulated network. Despite the `RefCell`-heavy
/// field list, a `Peer` is only ever touched from the single simulation
/// thread — there is no locking here because there is nothing to lock
/// against.
pub struct Peer {
    self_ref: Weak<Peer>,
    id: PeerId,
    pub speed: Speed,
    pub cpu: Cpu,
    hashing_power: f64,
    mean_block_interarrival: Time,
    mean_tx_interarrival: Time,
    other_peer_ids: Vec<PeerId>,
    scheduler: Scheduler,
    network: RefCell<Weak<Network>>,
    rng: RefCell<Pcg32>,
    tx_nonce: Cell<u64>,

    mempool: RefCell<HashMap<TxId, Transaction>>,
    tx_routing: RefCell<HashMap<PeerId, HashSet<TxId>>>,
    blk_routing: RefCell<HashMap<PeerId, HashSet<BlockId>>>,
    tree: RefCell<BlockTree>,
    tip: RefCell<BlockId>,
    balance: Cell<i64>,
    num_generated: Cell<u64>,
}

impl Peer {
    /// Builds a peer on top of `genesis`. `seed` drives this peer's private
    /// RNG (transaction sampling, mining delays, receiver choice) — entirely
    /// independent of the network's own RNG and every other peer's, so a run
    /// is reproducible from one master seed that derives all of these (see
    /// `bin_nakamoto::config`).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: PeerId,
        speed: Speed,
        cpu: Cpu,
        hashing_power: f64,
        mean_block_interarrival: Time,
        mean_tx_interarrival: Time,
        other_peer_ids: Vec<PeerId>,
        genesis: Rc<Block>,
        scheduler: Scheduler,
        seed: u64,
    ) -> Rc<Peer> {
        let now = scheduler.now();
        Rc::new_cyclic(|self_ref| Peer {
            self_ref: self_ref.clone(),
            id,
            speed,
            cpu,
            hashing_power,
            mean_block_interarrival,
            mean_tx_interarrival,
            other_peer_ids,
            scheduler,
            network: RefCell::new(Weak::new()),
            rng: RefCell::new(Pcg32::new(seed, 0xf7c2_8d4e_9b11_5a03)),
            tx_nonce: Cell::new(0),
            mempool: RefCell::new(HashMap::new()),
            tx_routing: RefCell::new(HashMap::new()),
            blk_routing: RefCell::new(HashMap::new()),
            tip: RefCell::new(genesis.id.clone()),
            tree: RefCell::new(BlockTree::new(genesis, now)),
            balance: Cell::new(0),
            num_generated: Cell::new(0),
        })
    }

    /// Wires this peer to the network it will send through. Must be called
    /// once, after the `Network` (which itself needs every peer's
    /// `PeerEndpoint` handle) has been constructed, and before any process
    /// spawned by this peer runs.
    pub fn set_network(&self, network: Weak<Network>) {
        *self.network.borrow_mut() = network;
    }

    /// Admits this peer's two long-running processes — transaction
    /// generation and block mining — into the scheduler. Idempotent only in
    /// the sense that the driver calls it exactly once per peer at startup.
    pub fn start(self: &Rc<Peer>) {
        let generator = self.clone();
        self.scheduler.spawn(async move {
            Peer::run_transaction_generator(generator).await;
        });
        let miner = self.clone();
        self.scheduler.spawn(async move {
            Peer::create_block_once(miner).await;
        });
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn balance(&self) -> i64 {
        self.balance.get()
    }

    pub fn tip_id(&self) -> BlockId {
        self.tip.borrow().clone()
    }

    pub fn num_generated(&self) -> u64 {
        self.num_generated.get()
    }

    pub fn tree(&self) -> std::cell::Ref<'_, BlockTree> {
        self.tree.borrow()
    }

    /// Number of this peer's own blocks on the path from its current tip to
    /// genesis.
    pub fn main_chain_contrib(&self) -> u64 {
        let tree = self.tree.borrow();
        let tip = self.tip.borrow();
        tree.path_to_root(&tip)
            .iter()
            .filter(|block_id| {
                tree.get(block_id)
                    .map(|node| node.block.miner == Some(self.id))
                    .unwrap_or(false)
            })
            .count() as u64
    }

    fn network(&self) -> Rc<Network> {
        self.network
            .borrow()
            .upgrade()
            .expect("set_network is called before any process runs")
    }

    fn self_rc(&self) -> Rc<Peer> {
        self.self_ref
            .upgrade()
            .expect("a peer is always reachable through its own Rc while running")
    }

    fn next_tx_nonce(&self) -> u64 {
        let nonce = self.tx_nonce.get();
        self.tx_nonce.set(nonce + 1);
        nonce
    }

    /// An infinite cooperative process: waits `Exp(1/mean_tx_interarrival)`,
    /// then gossips a freshly minted transaction to a uniformly random other
    /// peer. A lone peer (no other ids to send to) never has anything to
    /// generate towards, so the process exits immediately rather than
    /// spinning — matching scenario 3's "zero network events" for `n=1`
    /// (the reference implementation's `while receiver == self: ...` retry
    /// loop would spin forever in this case; see DESIGN.md).
    async fn run_transaction_generator(peer: Rc<Peer>) {
        if peer.other_peer_ids.is_empty() {
            return;
        }
        loop {
            let delay = {
                let mut rng = peer.rng.borrow_mut();
                Exp::new(1.0 / peer.mean_tx_interarrival)
                    .expect("mean_tx_interarrival is always positive")
                    .sample(&mut *rng)
            };
            peer.scheduler.timeout(delay).await;

            let (receiver, amount, nonce) = {
                let mut rng = peer.rng.borrow_mut();
                let receiver = *peer
                    .other_peer_ids
                    .choose(&mut *rng)
                    .expect("checked non-empty above");
                let amount = rng.gen_range(1..=5);
                (receiver, amount, peer.next_tx_nonce())
            };
            let tx = Transaction::new(peer.id, receiver, amount, peer.scheduler.now(), nonce);
            peer.forward_transaction(tx);
        }
    }

    /// Gossips `tx` to every neighbor that has not already sent or received
    /// it, per this peer's routing table.
    fn forward_transaction(&self, tx: Transaction) {
        let tx_id = tx.id();
        let network = self.network();
        for neighbor in network.neighbors_of(self.id) {
            let should_send = {
                let mut routing = self.tx_routing.borrow_mut();
                let seen = routing.entry(neighbor).or_default();
                seen.insert(tx_id.clone())
            };
            if should_send {
                network.send_transaction(self.id, neighbor, tx.clone());
            }
        }
    }

    /// Gossips `block` to every neighbor that has not already sent or
    /// received it, per this peer's routing table.
    fn broadcast_block(&self, block: Rc<Block>) {
        let network = self.network();
        for neighbor in network.neighbors_of(self.id) {
            let should_send = {
                let mut routing = self.blk_routing.borrow_mut();
                let seen = routing.entry(neighbor).or_default();
                seen.insert(block.id.clone())
            };
            if should_send {
                network.send_block(self.id, neighbor, block.clone());
            }
        }
    }

    /// `true` if `candidate` should replace `current` as this peer's tip,
    /// under the longest-chain rule: strictly greater height wins; ties go
    /// to the earlier timestamp; further ties are broken by block id, the
    /// explicit resolution of an open question in the source (see
    /// DESIGN.md).
    fn advances_tip(current: &Block, candidate: &Block) -> bool {
        candidate.height > current.height
            || (candidate.height == current.height && candidate.timestamp < current.timestamp)
            || (candidate.height == current.height
                && candidate.timestamp == current.timestamp
                && candidate.id < current.id)
    }

    /// One iteration of mining: sample a candidate block off the current
    /// tip, wait out its synthetic proof-of-work delay, then commit it only
    /// if the tip has not moved in the meantime. Whatever the outcome
    /// (commit, discard, or an aborted candidate), a fresh iteration is
    /// spawned at the end so the peer keeps mining continuously — the
    /// spawn-based equivalent of the reference implementation's `while
    /// True` loop (§9).
    async fn create_block_once(peer: Rc<Peer>) {
        let l0_id = peer.tip.borrow().clone();
        let l0 = {
            let tree = peer.tree.borrow();
            tree.get(&l0_id)
                .expect("the tip is always present in this peer's tree")
                .block
                .clone()
        };

        let chain_tx_ids = peer.tree.borrow().tx_ids_on_path(&l0_id);
        let pool: Vec<Transaction> = {
            let mempool = peer.mempool.borrow();
            mempool
                .iter()
                .filter(|(id, _)| !chain_tx_ids.contains(*id))
                .map(|(_, tx)| tx.clone())
                .collect()
        };

        let sample: Vec<Transaction> = {
            let mut rng = peer.rng.borrow_mut();
            let max_k = pool.len().min(999);
            let k = rng.gen_range(0..=max_k);
            pool.choose_multiple(&mut *rng, k).cloned().collect()
        };

        let now = peer.scheduler.now();
        let candidate = match Block::forge(&l0, now, sample, peer.id) {
            Ok(block) => block,
            Err(_) => {
                // The sampled transactions no longer apply cleanly against
                // L0 (lost a race with conflicting transactions elsewhere in
                // the pool). Abort this attempt and try again.
                tracing::warn!(peer = peer.id, "abandoning candidate block, sample no longer valid");
                peer.scheduler.spawn(Peer::create_block_once(peer.clone()));
                return;
            }
        };

        let delay = {
            let mut rng = peer.rng.borrow_mut();
            Exp::new(peer.hashing_power / peer.mean_block_interarrival)
                .expect("hashing_power and mean_block_interarrival are both positive")
                .sample(&mut *rng)
        };
        peer.scheduler.timeout(delay).await;

        if *peer.tip.borrow() == l0_id {
            let commit_time = peer.scheduler.now();
            let block_rc = Rc::new(candidate);
            peer.tree
                .borrow_mut()
                .insert(block_rc.clone(), commit_time)
                .expect("L0 is this block's parent and is already in the tree");
            *peer.tip.borrow_mut() = block_rc.id.clone();
            peer.balance
                .set(*block_rc.balances.get(&peer.id).unwrap_or(&0));
            peer.num_generated.set(peer.num_generated.get() + 1);
            tracing::info!(peer = peer.id, block = %block_rc.id, height = block_rc.height, "mined block");
            peer.broadcast_block(block_rc);
        }
        // Otherwise a competing block already advanced the tip; discard B.

        peer.scheduler.spawn(Peer::create_block_once(peer.clone()));
    }
}

impl PeerEndpoint for Peer {
    fn receive_transaction(&self, sender: PeerId, tx: Transaction) {
        let tx_id = tx.id();
        self.mempool.borrow_mut().insert(tx_id.clone(), tx.clone());
        self.tx_routing
            .borrow_mut()
            .entry(sender)
            .or_default()
            .insert(tx_id);
        self.forward_transaction(tx);
    }

    fn receive_block(&self, _sender: PeerId, block: Rc<Block>) {
        // 1. Validate against the local view of the parent's balances.
        // Unknown parent and validation failure are both silent drops.
        let parent_balances = match &block.parent {
            None => return,
            Some(parent_id) => match self.tree.borrow().get(parent_id) {
                Some(node) => node.block.balances.clone(),
                None => {
                    tracing::warn!(peer = self.id, block = %block.id, "dropping orphan block");
                    return;
                }
            },
        };
        if !block.revalidate(&parent_balances) {
            tracing::warn!(peer = self.id, block = %block.id, "dropping invalid block");
            return;
        }

        // 2. Tree insertion.
        let now = self.scheduler.now();
        if self.tree.borrow_mut().insert(block.clone(), now).is_err() {
            return;
        }

        // 3. Tip update. `to_create` is set only on the strict
        // greater-height branch: a same-height tip switch (earlier
        // timestamp, or the id tiebreak) is "same tip switch" per spec, not
        // a trigger for racing a fresh mining attempt.
        let mut to_create = false;
        {
            let tip_id = self.tip.borrow().clone();
            let current_tip = self
                .tree
                .borrow()
                .get(&tip_id)
                .expect("tip is always present")
                .block
                .clone();
            if Self::advances_tip(&current_tip, &block) {
                *self.tip.borrow_mut() = block.id.clone();
                self.balance
                    .set(*block.balances.get(&self.id).unwrap_or(&0));
                tracing::info!(peer = self.id, block = %block.id, height = block.height, "accepted block, tip advanced");
                to_create = block.height > current_tip.height;
            }
        }

        // 4. Gossip onward.
        self.broadcast_block(block);

        // 5. Race a fresh mining attempt off the new tip.
        if to_create {
            self.scheduler.spawn(Peer::create_block_once(self.self_rc()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_network::Network;
    use std::cell::RefCell as StdRefCell;

    fn make_network(peers: Vec<Rc<Peer>>, scheduler: Scheduler) -> Rc<Network> {
        let speeds: Vec<Speed> = peers.iter().map(|p| p.speed).collect();
        let endpoints: Vec<Rc<dyn PeerEndpoint>> = peers
            .iter()
            .map(|p| p.clone() as Rc<dyn PeerEndpoint>)
            .collect();
        let network = Rc::new(Network::new(endpoints, &speeds, 50.0, scheduler, 123).unwrap());
        for peer in &peers {
            peer.set_network(Rc::downgrade(&network));
        }
        network
    }

    #[test]
    fn lone_peer_never_generates_transactions() {
        let scheduler = Scheduler::new();
        let genesis = Rc::new(Block::genesis(&[0]));
        let peer = Peer::new(
            0,
            Speed::Fast,
            Cpu::High,
            1.0,
            50.0,
            10.0,
            vec![],
            genesis,
            scheduler.clone(),
            1,
        );
        let _network = make_network(vec![peer.clone()], scheduler.clone());
        peer.start();

        scheduler.run_until(5000.0);
        assert_eq!(peer.tree().nodes.len() - 1, peer.num_generated() as usize);
        assert_eq!(peer.main_chain_contrib(), peer.num_generated());
    }

    #[test]
    fn two_peers_converge_on_a_shared_tip_height() {
        let scheduler = Scheduler::new();
        let genesis = Rc::new(Block::genesis(&[0, 1]));
        let a = Peer::new(
            0,
            Speed::Fast,
            Cpu::High,
            0.5,
            20.0,
            5.0,
            vec![1],
            genesis.clone(),
            scheduler.clone(),
            11,
        );
        let b = Peer::new(
            1,
            Speed::Fast,
            Cpu::High,
            0.5,
            20.0,
            5.0,
            vec![0],
            genesis,
            scheduler.clone(),
            22,
        );
        let _network = make_network(vec![a.clone(), b.clone()], scheduler.clone());
        a.start();
        b.start();

        scheduler.run_until(2000.0);
        let height_a = a.tree().get(&a.tip_id()).unwrap().block.height;
        let height_b = b.tree().get(&b.tip_id()).unwrap().block.height;
        assert!((height_a as i64 - height_b as i64).abs() <= 3);
    }

    #[test]
    fn duplicate_transaction_receipt_does_not_grow_mempool() {
        let scheduler = Scheduler::new();
        let genesis = Rc::new(Block::genesis(&[0, 1]));
        let peer = Peer::new(
            0,
            Speed::Fast,
            Cpu::High,
            1.0,
            50.0,
            1000.0,
            vec![1],
            genesis,
            scheduler.clone(),
            3,
        );
        let _log: Rc<StdRefCell<Vec<()>>> = Rc::new(StdRefCell::new(Vec::new()));
        let tx = Transaction::new(1, 0, 2, 0.0, 0);
        peer.receive_transaction(1, tx.clone());
        peer.receive_transaction(1, tx.clone());
        assert_eq!(peer.mempool.borrow().len(), 1);
    }
}
