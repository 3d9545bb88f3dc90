//! RNG based on AES in CTR mode.
//!
//! This implementation is based on the implementation given in the
//! [scuttlebutt](https://github.com/GaloisInc/swanky/blob/4455754abadee07f168079ac45ef33535b0df27d/scuttlebutt/src/rand_aes.rs)
//! crate. Instead of using an own AES implementation, [`AesRng`](`AesRng`) uses
//! the [aes](`aes`) crate.
//!
//! OT extension seeds one [`AesRng`] per base OT and expands it into the
//! corresponding row of the extension matrix.
use std::mem;

use aes::{
    Aes128,
    cipher::{BlockCipherEncrypt, KeyInit},
};
use rand::SeedableRng;
use rand_core::{
    CryptoRng, RngCore,
    block::{BlockRng, BlockRngCore, CryptoBlockRng},
};

use crate::{AES_PAR_BLOCKS, Block};

/// This uses AES in a counter-mode to implement a PRG. The counter always
/// starts at zero for a fresh seed.
#[derive(Clone, Debug)]
pub struct AesRng(BlockRng<AesRngCore>);

impl RngCore for AesRng {
    #[inline]
    fn next_u32(&mut self) -> u32 {
        self.0.next_u32()
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let block_size = mem::size_of::<aes::Block>();
        let block_len = dest.len() / block_size * block_size;
        let (block_bytes, rest_bytes) = dest.split_at_mut(block_len);
        // fast path so we don't unnecessarily copy u32 from generate into dest
        let blocks = bytemuck::cast_slice_mut::<_, aes::Block>(block_bytes);
        for chunk in blocks.chunks_mut(AES_PAR_BLOCKS) {
            for block in chunk.iter_mut() {
                *block = aes::cipher::Array(self.0.core.state.to_le_bytes());
                self.0.core.state += 1;
            }
            self.0.core.aes.encrypt_blocks(chunk);
        }
        // handle the tail
        self.0.fill_bytes(rest_bytes);
    }
}

impl SeedableRng for AesRng {
    type Seed = Block;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        AesRng(BlockRng::new(AesRngCore::from_seed(seed)))
    }
}

impl CryptoRng for AesRng {}

/// The core of `AesRng`, used with `BlockRng`.
#[derive(Clone)]
pub struct AesRngCore {
    aes: Aes128,
    state: u128,
}

impl std::fmt::Debug for AesRngCore {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "AesRngCore {{}}")
    }
}

impl BlockRngCore for AesRngCore {
    type Item = u32;
    // This is equivalent to `[aes::Block; 8]`, but we need to use `u32` to be
    // compatible with `RngCore`.
    type Results = [u32; 32];

    // Compute `E(state)` eight times, where `state` is a counter.
    #[inline]
    fn generate(&mut self, results: &mut Self::Results) {
        let blocks = bytemuck::cast_slice_mut::<_, aes::Block>(results);
        blocks.iter_mut().for_each(|blk| {
            // aes::Block is a type alias to Array, but type aliases can't be used as
            // constructors
            *blk = aes::cipher::Array(self.state.to_le_bytes());
            self.state += 1;
        });
        self.aes.encrypt_blocks(blocks);
    }
}

impl SeedableRng for AesRngCore {
    type Seed = Block;

    #[inline]
    fn from_seed(seed: Self::Seed) -> Self {
        let aes = Aes128::new(&seed.into());
        AesRngCore {
            aes,
            state: Default::default(),
        }
    }
}

impl CryptoBlockRng for AesRngCore {}

#[cfg(test)]
mod tests {
    use rand::{Rng, RngCore, SeedableRng};

    use super::AesRng;
    use crate::Block;

    #[test]
    fn test_generate() {
        let mut rng = AesRng::seed_from_u64(1);
        let a = rng.random::<[Block; 8]>();
        let b = rng.random::<[Block; 8]>();
        assert_ne!(a, b);
    }

    #[test]
    fn seeded_is_deterministic() {
        let mut a = AesRng::seed_from_u64(42);
        let mut b = AesRng::seed_from_u64(42);
        let mut buf_a = [0_u8; 100];
        let mut buf_b = [0_u8; 100];
        a.fill_bytes(&mut buf_a);
        b.fill_bytes(&mut buf_b);
        assert_eq!(buf_a, buf_b);
        assert_eq!(a.random::<u64>(), b.random::<u64>());
    }

    #[test]
    fn different_seeds_differ() {
        let mut a = AesRng::from_seed(Block::from(7_u128));
        let mut b = AesRng::from_seed(Block::from(8_u128));
        assert_ne!(a.random::<Block>(), b.random::<Block>());
    }

    #[test]
    fn fill_bytes_matches_word_stream() {
        // the block fast path and the buffered tail produce the same stream
        let mut a = AesRng::seed_from_u64(3);
        let mut b = AesRng::seed_from_u64(3);
        let mut buf = [0_u8; 40];
        a.fill_bytes(&mut buf);
        let words: Vec<u8> = (0..10).flat_map(|_| b.next_u32().to_le_bytes()).collect();
        assert_eq!(&buf[..], &words[..]);
    }
}
