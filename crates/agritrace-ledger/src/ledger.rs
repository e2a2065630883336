use agritrace_core::constants::GENESIS_BLOCK_NUMBER;
use agritrace_core::error::TraceError;
use agritrace_core::types::{Anchor, BlockNumber};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::hash::tx_hash_from_body;

/// Issues ledger positions for record bodies.
///
/// One call is one ledger write: every body in the batch lands in the same
/// block. Implementations must return exactly one anchor per body, in order,
/// or an error without consuming any ledger state the caller can observe.
pub trait Ledger: Send {
    fn anchor_batch(&mut self, bodies: &[Vec<u8>]) -> Result<Vec<Anchor>, TraceError>;

    /// Height of the most recent block written, if any.
    fn height(&self) -> Option<BlockNumber>;

    /// Told about a block height seen in externally loaded chains, so later
    /// writes land above it. Ledgers that own their numbering ignore this.
    fn observe_height(&mut self, _height: BlockNumber) {}
}

/// Offline ledger: BLAKE3-derived transaction hashes and a local block
/// counter. Hashes are unique per ledger; nothing here is globally unique.
pub struct SimulatedLedger {
    salt: [u8; 16],
    tx_count: u64,
    next_block: BlockNumber,
}

impl SimulatedLedger {
    /// Fresh ledger with a random salt.
    pub fn new(genesis_block: BlockNumber) -> Self {
        Self::from_rng(genesis_block, &mut rand::thread_rng())
    }

    /// Reproducible ledger for tests and demos.
    pub fn with_seed(genesis_block: BlockNumber, seed: u64) -> Self {
        Self::from_rng(genesis_block, &mut StdRng::seed_from_u64(seed))
    }

    fn from_rng(genesis_block: BlockNumber, rng: &mut impl Rng) -> Self {
        let mut salt = [0u8; 16];
        rng.fill(&mut salt);
        Self { salt, tx_count: 0, next_block: genesis_block }
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new(GENESIS_BLOCK_NUMBER)
    }
}

impl Ledger for SimulatedLedger {
    fn anchor_batch(&mut self, bodies: &[Vec<u8>]) -> Result<Vec<Anchor>, TraceError> {
        let block_number = self.next_block;
        let anchors: Vec<Anchor> = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| Anchor {
                tx_hash: tx_hash_from_body(&self.salt, self.tx_count + i as u64, body),
                block_number,
            })
            .collect();
        if !anchors.is_empty() {
            self.tx_count += anchors.len() as u64;
            self.next_block += 1;
            debug!(block = block_number, txs = anchors.len(), "simulated block written");
        }
        Ok(anchors)
    }

    fn height(&self) -> Option<BlockNumber> {
        self.next_block.checked_sub(1).filter(|_| self.tx_count > 0)
    }

    fn observe_height(&mut self, height: BlockNumber) {
        if height >= self.next_block {
            self.next_block = height + 1;
        }
    }
}
