//! Core utilites for semi-honest OT extension.
//!
//! The most important type is the 128-bit [`Block`]. As we use a
//! security parameter of 128 bits, every key, pad and OT message is a
//! [`Block`]. The [`aes_hash`] module provides the correlation robust hash
//! that OT extension derives its outputs with.

pub mod aes_hash;
pub mod aes_rng;
pub mod alloc;
pub mod block;
pub mod transpose;
pub mod utils;

pub use block::Block;

/// Number of Blocks hashed by one fixed-size call to
/// [`AesHash::cr_hash_blocks_mut`](`aes_hash::AesHash::cr_hash_blocks_mut`)
/// in the OT extension post-processing.
pub const AES_BATCH_SIZE: usize = 8;

/// Number of Blocks for which hardware accelerated AES can make use of ILP.
///
/// This corresponds to `ParBlocksSize` in [`aes::cipher::ParBlocksSizeUser`]
/// for the SIMD backend on the target architecture. Do not depend on the
/// value of the constant.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub const AES_PAR_BLOCKS: usize = 9;
#[cfg(target_arch = "aarch64")]
pub const AES_PAR_BLOCKS: usize = 21;
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub const AES_PAR_BLOCKS: usize = 4;
