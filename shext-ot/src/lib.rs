#![warn(clippy::unwrap_used)]
//! Shext-OT implements semi-honest [oblivious transfer](https://en.wikipedia.org/wiki/Oblivious_transfer)
//! extension using the [[IKNP03](https://www.iacr.org/archive/crypto2003/27290145/27290145.pdf)]
//! protocol.
//!
//! Given 128 base OTs, an [`OtExtensionSender`] and [`OtExtensionReceiver`]
//! pair derives arbitrarily many OTs of the following flavours, using only
//! AES based hashing and a single message per direction:
//!
//! - plain OT: the sender inputs two messages per OT, the receiver learns the
//!   one selected by its choice bit
//!   ([`send`](OtExtensionSender::send)/[`recv`](OtExtensionReceiver::recv))
//! - correlated OT (C-OT): the sender's second message is a function of its
//!   first one ([`send_cot`](OtExtensionSender::send_cot) and friends,
//!   [`recv_cot`](OtExtensionReceiver::recv_cot))
//! - random OT (R-OT): both messages are pseudorandom and no data is
//!   exchanged after the extension
//!   ([`send_rot`](OtExtensionSender::send_rot)/[`recv_rot`](OtExtensionReceiver::recv_rot))
//!
//! Each operation consists of a pre step, which extends the base OTs into a
//! matrix of correlated blocks, and a post step, which hashes the matrix into
//! the requested outputs. Both are also available separately (e.g.
//! [`OtExtensionSender::send_pre`] and [`OtExtensionSender::cot_send_post`]).
//!
//! The implementation only offers security against semi-honest adversaries.
//!
//! ```
//! # use anyhow::Result;
//! use rand::{Rng, SeedableRng, rngs::StdRng};
//! use shext_core::Block;
//! use shext_net::testing::local_conn;
//! use shext_ot::{OtExtensionReceiver, OtExtensionSender, base, random_choices};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let mut rng = StdRng::seed_from_u64(42);
//! let (c1, c2) = local_conn().await?;
//! let (sender_base, receiver_base) = base::dealer(&mut rng);
//! let mut sender = OtExtensionSender::new(c1, sender_base);
//! let mut receiver = OtExtensionReceiver::new(c2, receiver_base);
//!
//! let delta: Block = rng.random();
//! let choices = random_choices(100, &mut rng);
//! let mut data0 = vec![Block::ZERO; 100];
//! let mut data = vec![Block::ZERO; 100];
//! tokio::try_join!(
//!     sender.send_cot(&mut data0, delta),
//!     receiver.recv_cot(&mut data, &choices)
//! )?;
//! for ((d0, d), c) in data0.iter().zip(&data).zip(&choices) {
//!     let expected = if c.unwrap_u8() == 1 { *d0 ^ delta } else { *d0 };
//!     assert_eq!(expected, *d);
//! }
//! # Ok(())
//! # }
//! ```

use rand::{CryptoRng, Rng, distr, prelude::Distribution};
use shext_net::{Connection, ConnectionError};
use subtle::Choice;

pub mod base;
pub mod correlation;
pub mod extension;
pub mod post;

pub use correlation::Correlation;
pub use extension::{
    BASE_OT_COUNT, DEFAULT_OT_BATCH_SIZE, OtExtensionReceiver, OtExtensionSender,
    ReceiverMatrix, SenderMatrix,
};

/// Trait for OT receivers/senders which hold a [`Connection`].
pub trait Connected {
    fn connection(&mut self) -> &mut Connection;
}

impl<C: Connected> Connected for &mut C {
    fn connection(&mut self) -> &mut Connection {
        (*self).connection()
    }
}

/// Error type returned by the OT extension protocols.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("connection error to peer")]
    Connection(#[from] ConnectionError),
    #[error("invalid base OTs: expected {expected} seeds/choices, got {actual}")]
    InvalidBaseOts { expected: usize, actual: usize },
    #[error("no extension matrix pending, call the pre step before the post step")]
    NoPendingMatrix,
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Returns [`Error::LengthMismatch`] unless `expected == actual`.
pub(crate) fn check_len(expected: usize, actual: usize) -> Result<(), Error> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::LengthMismatch { expected, actual })
    }
}

/// Sample `count` many [`Choice`]es using the provided rng.
pub fn random_choices<RNG: Rng + CryptoRng>(count: usize, rng: &mut RNG) -> Vec<Choice> {
    let uniform = distr::Uniform::new(0, 2).expect("correct range");
    uniform
        .sample_iter(rng)
        .take(count)
        .map(Choice::from)
        .collect()
}
