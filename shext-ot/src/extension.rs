//! Semi-honest OT extension using the optimized [[IKNP03](https://www.iacr.org/archive/crypto2003/27290145/27290145.pdf)]
//! protocol.
//!
//! This module contains the pre step of the protocol: it extends the
//! [`BASE_OT_COUNT`] base OTs into a [`SenderMatrix`] `q` and
//! [`ReceiverMatrix`] `t` with `t[j] = q[j] ^ (r[j] * delta)`, where `r` are
//! the receiver's choices and `delta` is the sender's secret. The post steps
//! in [`post`](crate::post) hash the matrices into OT outputs.
//!
//! ## Batching
//! The matrices are computed in batches of columns. Each batch is transposed
//! as soon as its rows are sent (receiver) or received (sender). The
//! [`DEFAULT_OT_BATCH_SIZE`] can be changed using the corresponding methods
//! on the sender and receiver (e.g. [`OtExtensionSender::with_batch_size`]).
use bytemuck::{cast_slice, cast_slice_mut};
use rand::{RngCore, SeedableRng};
use shext_core::{
    Block,
    aes_rng::AesRng,
    alloc::allocate_zeroed_vec,
    transpose::transpose_bitmatrix,
    utils::{and_inplace_elem, xor_inplace},
};
use shext_net::Connection;
use subtle::{Choice, ConditionallySelectable};
use tracing::{Level, warn};

use crate::{
    Connected, Error,
    base::{ReceiverBaseOts, SenderBaseOts},
};

pub const BASE_OT_COUNT: usize = 128;

pub const DEFAULT_OT_BATCH_SIZE: usize = 2_usize.pow(16);

/// The sender's extended matrix `q`, one block per OT.
///
/// Produced by [`OtExtensionSender::send_pre`] and consumed by exactly one
/// post step.
#[derive(Debug)]
pub struct SenderMatrix {
    pub(crate) q: Vec<Block>,
    pub(crate) delta: Block,
}

/// The receiver's extended matrix `t`, one block per OT.
///
/// Produced by [`OtExtensionReceiver::recv_pre`] and consumed by exactly one
/// post step.
#[derive(Debug)]
pub struct ReceiverMatrix {
    pub(crate) t: Vec<Block>,
}

impl SenderMatrix {
    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    pub fn as_blocks(&self) -> &[Block] {
        &self.q
    }

    /// The sender secret the matrix is correlated with.
    pub fn delta(&self) -> Block {
        self.delta
    }
}

impl ReceiverMatrix {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn as_blocks(&self) -> &[Block] {
        &self.t
    }
}

/// OT extension sender.
pub struct OtExtensionSender {
    pub(crate) conn: Connection,
    base_rngs: Vec<AesRng>,
    base_choices: Vec<Choice>,
    delta: Block,
    batch_size: usize,
    pub(crate) pending: Option<SenderMatrix>,
}

/// OT extension receiver.
pub struct OtExtensionReceiver {
    pub(crate) conn: Connection,
    base_rngs: Vec<[AesRng; 2]>,
    batch_size: usize,
    pub(crate) pending: Option<ReceiverMatrix>,
}

impl OtExtensionSender {
    /// Create a new sender for the given [`Connection`] and base OTs.
    ///
    /// The base OTs must not be reused for another sender.
    pub fn new(conn: Connection, base_ots: SenderBaseOts) -> Self {
        let delta = base_ots.delta();
        Self {
            conn,
            base_rngs: base_ots.seeds.into_iter().map(AesRng::from_seed).collect(),
            base_choices: base_ots.choices,
            delta,
            batch_size: DEFAULT_OT_BATCH_SIZE,
            pending: None,
        }
    }

    /// Set the OT batch size for the sender.
    ///
    /// If the sender batch size is changed, the receiver's must also be changed
    /// (see [`OtExtensionReceiver::with_batch_size`]).
    ///
    /// # Panics
    /// If `batch_size` is zero or not divisible by 128.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        check_batch_size(batch_size);
        self.batch_size = batch_size;
        self
    }

    /// The currently configured OT batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The secret `delta` of this sender. Constant for the lifetime of the
    /// sender.
    pub fn delta(&self) -> Block {
        self.delta
    }

    /// Extend the base OTs into a [`SenderMatrix`] for `count` OTs, which is
    /// kept until the next post step.
    ///
    /// An unconsumed matrix of a previous pre step is discarded.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = count))]
    pub async fn send_pre(&mut self, count: usize) -> Result<(), Error> {
        let q = self.extend(count).await?;
        let matrix = SenderMatrix {
            q,
            delta: self.delta,
        };
        if self.pending.replace(matrix).is_some() {
            warn!("discarding unconsumed sender matrix");
        }
        Ok(())
    }

    /// Take the pending matrix of the last [`OtExtensionSender::send_pre`].
    pub(crate) fn take_pending(&mut self) -> Result<SenderMatrix, Error> {
        self.pending.take().ok_or(Error::NoPendingMatrix)
    }

    async fn extend(&mut self, count: usize) -> Result<Vec<Block>, Error> {
        let padded = count.next_multiple_of(128);
        let max_batch = self.batch_size.min(padded);
        let mut q = allocate_zeroed_vec::<Block>(padded);
        let mut v_mat = allocate_zeroed_vec::<Block>(BASE_OT_COUNT * max_batch / 128);
        let mut recv_row = allocate_zeroed_vec::<Block>(max_batch / 128);

        for q_batch in q.chunks_mut(self.batch_size) {
            let row_blocks = q_batch.len() / 128;
            let v_mat = &mut v_mat[..BASE_OT_COUNT * row_blocks];
            let recv_row = &mut recv_row[..row_blocks];
            for ((v_row, base_rng), base_choice) in v_mat
                .chunks_exact_mut(row_blocks)
                .zip(&mut self.base_rngs)
                .zip(&self.base_choices)
            {
                base_rng.fill_bytes(cast_slice_mut(v_row));
                self.conn.recv_blocks_into(recv_row).await?;
                // constant time version of
                // if base_choice {
                //   v_row ^= recv_row;
                // }
                let choice_mask =
                    Block::conditional_select(&Block::ZERO, &Block::ONES, *base_choice);
                and_inplace_elem(recv_row, choice_mask);
                xor_inplace(v_row, recv_row);
            }
            transpose_bitmatrix(cast_slice(v_mat), cast_slice_mut(q_batch), BASE_OT_COUNT);
        }
        q.truncate(count);
        Ok(q)
    }
}

impl Connected for OtExtensionSender {
    fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl OtExtensionReceiver {
    /// Create a new receiver for the given [`Connection`] and base OTs.
    ///
    /// The base OTs must not be reused for another receiver.
    pub fn new(conn: Connection, base_ots: ReceiverBaseOts) -> Self {
        Self {
            conn,
            base_rngs: base_ots
                .seeds
                .into_iter()
                .map(|[s0, s1]| [AesRng::from_seed(s0), AesRng::from_seed(s1)])
                .collect(),
            batch_size: DEFAULT_OT_BATCH_SIZE,
            pending: None,
        }
    }

    /// Set the OT batch size for the receiver.
    ///
    /// If the receiver batch size is changed, the senders's must also be
    /// changed (see [`OtExtensionSender::with_batch_size`]).
    ///
    /// # Panics
    /// If `batch_size` is zero or not divisible by 128.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        check_batch_size(batch_size);
        self.batch_size = batch_size;
        self
    }

    /// The currently configured OT batch size.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Extend the base OTs into a [`ReceiverMatrix`] for `choices.len()` OTs,
    /// which is kept until the next post step.
    ///
    /// An unconsumed matrix of a previous pre step is discarded.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = choices.len()))]
    pub async fn recv_pre(&mut self, choices: &[Choice]) -> Result<(), Error> {
        let t = self.extend(choices).await?;
        if self.pending.replace(ReceiverMatrix { t }).is_some() {
            warn!("discarding unconsumed receiver matrix");
        }
        Ok(())
    }

    /// Take the pending matrix of the last [`OtExtensionReceiver::recv_pre`].
    pub(crate) fn take_pending(&mut self) -> Result<ReceiverMatrix, Error> {
        self.pending.take().ok_or(Error::NoPendingMatrix)
    }

    async fn extend(&mut self, choices: &[Choice]) -> Result<Vec<Block>, Error> {
        let count = choices.len();
        let padded = count.next_multiple_of(128);
        let choice_blocks = choices_to_blocks(choices);
        let max_batch = self.batch_size.min(padded);
        let mut t = allocate_zeroed_vec::<Block>(padded);
        let mut t_mat = allocate_zeroed_vec::<Block>(BASE_OT_COUNT * max_batch / 128);
        let mut send_row = allocate_zeroed_vec::<Block>(max_batch / 128);

        for (t_batch, choice_batch) in t
            .chunks_mut(self.batch_size)
            .zip(choice_blocks.chunks(self.batch_size / 128))
        {
            // might change for last batch
            let row_blocks = choice_batch.len();
            let t_mat = &mut t_mat[..BASE_OT_COUNT * row_blocks];
            let send_row = &mut send_row[..row_blocks];
            for (row, [rng0, rng1]) in t_mat.chunks_exact_mut(row_blocks).zip(&mut self.base_rngs)
            {
                rng0.fill_bytes(cast_slice_mut(row));
                rng1.fill_bytes(cast_slice_mut(send_row));
                xor_inplace(send_row, row);
                xor_inplace(send_row, choice_batch);
                self.conn.send_blocks(send_row).await?;
            }
            transpose_bitmatrix(cast_slice(t_mat), cast_slice_mut(t_batch), BASE_OT_COUNT);
        }
        self.conn.flush().await?;
        t.truncate(count);
        Ok(t)
    }
}

impl Connected for OtExtensionReceiver {
    fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

fn check_batch_size(batch_size: usize) {
    assert!(
        batch_size != 0 && batch_size % 128 == 0,
        "batch_size must be a non-zero multiple of 128"
    );
}

/// Pack choices into blocks, choice `i` is bit `i % 128` of block `i / 128`.
/// The last block is padded with zero choices.
fn choices_to_blocks(choices: &[Choice]) -> Vec<Block> {
    choices
        .chunks(128)
        .map(|chunk| {
            let mut bits = [Choice::from(0); 128];
            bits[..chunk.len()].copy_from_slice(chunk);
            Block::from_choices(&bits)
        })
        .collect()
}
