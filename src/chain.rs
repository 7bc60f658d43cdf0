use crate::common::Hash;

/// Accessor for the last committed block, which is all execution needs to know about the chain.
pub trait Tip: Send + Sync {
    fn last_block_height(&self) -> u64;
    fn last_block_hash(&self) -> &Hash;
    /// Unix time (seconds) of the last block.
    fn last_block_time(&self) -> u64;
}

#[derive(Clone, Debug)]
pub struct ChainTip {
    height: u64,
    hash: Hash,
    time: u64,
}

impl ChainTip {
    pub fn new(height: u64, hash: Hash, time: u64) -> Self {
        Self { height, hash, time }
    }

    pub fn genesis(hash: Hash, time: u64) -> Self {
        Self::new(0, hash, time)
    }

    /// Move the tip onto the block that was just committed on top of it.
    pub fn commit_block(&mut self, hash: Hash, time: u64) {
        self.height += 1;
        self.hash = hash;
        self.time = time;
    }
}

impl Tip for ChainTip {
    fn last_block_height(&self) -> u64 {
        self.height
    }

    fn last_block_hash(&self) -> &Hash {
        &self.hash
    }

    fn last_block_time(&self) -> u64 {
        self.time
    }
}

#[test]
fn test_commit_block() {
    let mut tip = ChainTip::genesis(Hash::zero().clone(), 100);
    tip.commit_block(Hash::hash(b"block1"), 105);
    assert_eq!(tip.last_block_height(), 1);
    assert_eq!(tip.last_block_hash(), &Hash::hash(b"block1"));
    assert_eq!(tip.last_block_time(), 105);
}
