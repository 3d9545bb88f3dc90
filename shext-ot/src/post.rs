//! Post steps of OT extension and the combined OT operations.
//!
//! The post steps hash the pending extension matrix with the correlation
//! robust [`FIXED_KEY_HASH`] and, depending on the OT flavour, combine the
//! hashes with the sender's messages or a [`Correlation`].
//!
//! All routines process the matrix in windows whose hashes are computed with
//! one fixed size call to the AES hash. Sender routines need two hashes per
//! OT and use windows of [`DOUBLE_WINDOW`] OTs, receiver routines need one
//! and use windows of [`SINGLE_WINDOW`] OTs. The last window of a call may be
//! shorter and is hashed with a variable length call.
//!
//! Every post step consumes the pending matrix, even if it fails. A second
//! post step without a new pre step returns [`Error::NoPendingMatrix`].
use shext_core::{AES_BATCH_SIZE, Block, aes_hash::FIXED_KEY_HASH};
use subtle::{Choice, ConditionallySelectable};
use tracing::Level;

use crate::{
    Correlation, Error, OtExtensionReceiver, OtExtensionSender, check_len,
    correlation::IndexedFn,
};

/// OTs per window if one hash per OT is needed.
pub const SINGLE_WINDOW: usize = AES_BATCH_SIZE;
/// OTs per window if two hashes per OT are needed.
pub const DOUBLE_WINDOW: usize = AES_BATCH_SIZE / 2;

/// Hash the first `len` blocks of `buf` in place.
#[inline]
fn hash_window(buf: &mut [Block; AES_BATCH_SIZE], len: usize) {
    if len == AES_BATCH_SIZE {
        FIXED_KEY_HASH.cr_hash_blocks_mut(buf);
    } else {
        FIXED_KEY_HASH.cr_hash_slice_mut(&mut buf[..len]);
    }
}

/// Fill `pad` with `[q_0, q_0 ^ delta, q_1, q_1 ^ delta, ..]` and hash it.
#[inline]
fn sender_pads(pad: &mut [Block; 2 * DOUBLE_WINDOW], q: &[Block], delta: Block) {
    for (pair, q) in pad.chunks_exact_mut(2).zip(q) {
        pair[0] = *q;
        pair[1] = *q ^ delta;
    }
    hash_window(pad, 2 * q.len());
}

impl OtExtensionSender {
    /// Send `data0.len()` chosen message OTs. The receiver learns `data0[j]`
    /// or `data1[j]` depending on its `j`-th choice.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = data0.len()))]
    pub async fn send(&mut self, data0: &[Block], data1: &[Block]) -> Result<(), Error> {
        check_len(data0.len(), data1.len())?;
        self.send_pre(data0.len()).await?;
        self.ot_send_post(data0, data1).await
    }

    /// Post step of [`OtExtensionSender::send`].
    pub async fn ot_send_post(&mut self, data0: &[Block], data1: &[Block]) -> Result<(), Error> {
        let matrix = self.take_pending()?;
        check_len(matrix.len(), data0.len())?;
        check_len(matrix.len(), data1.len())?;
        let mut pad = [Block::ZERO; 2 * DOUBLE_WINDOW];

        for ((q, d0), d1) in matrix
            .q
            .chunks(DOUBLE_WINDOW)
            .zip(data0.chunks(DOUBLE_WINDOW))
            .zip(data1.chunks(DOUBLE_WINDOW))
        {
            sender_pads(&mut pad, q, matrix.delta);
            for ((pair, d0), d1) in pad.chunks_exact_mut(2).zip(d0).zip(d1) {
                pair[0] ^= *d0;
                pair[1] ^= *d1;
            }
            self.conn.send_blocks(&pad[..2 * q.len()]).await?;
        }
        self.conn.flush().await?;
        Ok(())
    }

    /// Send fixed-delta correlated OTs.
    ///
    /// `data0` is overwritten with pseudorandom pads `x_j`, the receiver
    /// learns `x_j` or `x_j ^ delta`.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = data0.len()))]
    pub async fn send_cot(&mut self, data0: &mut [Block], delta: Block) -> Result<(), Error> {
        self.send_cot_with(data0, Correlation::FixedDelta(delta)).await
    }

    /// Send correlated OTs with one correlation function per OT.
    ///
    /// The receiver learns `x_j` or `fs[j](x_j)`.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = data0.len()))]
    pub async fn send_cot_fs(
        &mut self,
        data0: &mut [Block],
        fs: &[Box<dyn Fn(Block) -> Block + '_>],
    ) -> Result<(), Error> {
        self.send_cot_with(data0, Correlation::PerIndex(fs)).await
    }

    /// Send correlated OTs with a dynamically dispatched correlation
    /// function.
    ///
    /// The receiver learns `x_j` or `f(x_j, j)`.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = data0.len()))]
    pub async fn send_cot_f(
        &mut self,
        data0: &mut [Block],
        f: &IndexedFn<'_>,
    ) -> Result<(), Error> {
        self.send_cot_with(data0, Correlation::MapIndexed(f)).await
    }

    /// Send correlated OTs with a statically dispatched correlation function.
    ///
    /// The receiver learns `x_j` or `f(x_j, j)`.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = data0.len()))]
    pub async fn send_cot_ft<F>(&mut self, data0: &mut [Block], f: F) -> Result<(), Error>
    where
        F: FnMut(Block, usize) -> Block,
    {
        self.send_pre(data0.len()).await?;
        self.cot_send_post_ft(data0, f).await
    }

    /// Send additively correlated OTs.
    ///
    /// The receiver learns `x_j` or `x_j` with `deltas[j].0` added to its
    /// lower and `deltas[j].1` added to its upper 64 bits.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = data0.len()))]
    pub async fn send_cot_add_delta(
        &mut self,
        data0: &mut [Block],
        deltas: &[(u64, u64)],
    ) -> Result<(), Error> {
        self.send_cot_with(data0, Correlation::AdditivePair(deltas))
            .await
    }

    /// Send correlated OTs for an arbitrary [`Correlation`].
    pub async fn send_cot_with(
        &mut self,
        data0: &mut [Block],
        correlation: Correlation<'_>,
    ) -> Result<(), Error> {
        if let Some(len) = correlation.fixed_len() {
            check_len(data0.len(), len)?;
        }
        self.send_pre(data0.len()).await?;
        self.cot_send_post(data0, correlation).await
    }

    /// Post step of the correlated OT operations.
    pub async fn cot_send_post(
        &mut self,
        data0: &mut [Block],
        correlation: Correlation<'_>,
    ) -> Result<(), Error> {
        if let Some(len) = correlation.fixed_len() {
            self.check_pending_len(len)?;
        }
        // each arm rebuilds a single variant, so `apply` inlines to that rule
        // and the dispatch stays out of the window loop
        match correlation {
            Correlation::FixedDelta(delta) => {
                let rule = Correlation::FixedDelta(delta);
                self.cot_send_post_ft(data0, |x, j| rule.apply(x, j)).await
            }
            Correlation::Map(f) => {
                let rule = Correlation::Map(f);
                self.cot_send_post_ft(data0, |x, j| rule.apply(x, j)).await
            }
            Correlation::MapIndexed(f) => {
                let rule = Correlation::MapIndexed(f);
                self.cot_send_post_ft(data0, |x, j| rule.apply(x, j)).await
            }
            Correlation::PerIndex(fs) => {
                let rule = Correlation::PerIndex(fs);
                self.cot_send_post_ft(data0, |x, j| rule.apply(x, j)).await
            }
            Correlation::AdditivePair(deltas) => {
                let rule = Correlation::AdditivePair(deltas);
                self.cot_send_post_ft(data0, |x, j| rule.apply(x, j)).await
            }
        }
    }

    /// Post step of the correlated OT operations, generic over the
    /// correlation function `f(x_j, j)`.
    pub async fn cot_send_post_ft<F>(&mut self, data0: &mut [Block], mut f: F) -> Result<(), Error>
    where
        F: FnMut(Block, usize) -> Block,
    {
        let matrix = self.take_pending()?;
        check_len(matrix.len(), data0.len())?;
        let mut pad = [Block::ZERO; 2 * DOUBLE_WINDOW];
        let mut ct = [Block::ZERO; DOUBLE_WINDOW];

        for (window, (q, d0)) in matrix
            .q
            .chunks(DOUBLE_WINDOW)
            .zip(data0.chunks_mut(DOUBLE_WINDOW))
            .enumerate()
        {
            sender_pads(&mut pad, q, matrix.delta);
            for (j, ((pair, d0), ct)) in pad
                .chunks_exact(2)
                .zip(d0.iter_mut())
                .zip(&mut ct)
                .enumerate()
            {
                *d0 = pair[0];
                *ct = pair[1] ^ f(pair[0], window * DOUBLE_WINDOW + j);
            }
            self.conn.send_blocks(&ct[..q.len()]).await?;
        }
        self.conn.flush().await?;
        Ok(())
    }

    /// Compute random OTs. Both `data0` and `data1` are overwritten with
    /// pseudorandom messages.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = data0.len()))]
    pub async fn send_rot(
        &mut self,
        data0: &mut [Block],
        data1: &mut [Block],
    ) -> Result<(), Error> {
        check_len(data0.len(), data1.len())?;
        self.send_pre(data0.len()).await?;
        self.rot_send_post(data0, data1)
    }

    /// Post step of [`OtExtensionSender::send_rot`]. Does not communicate.
    pub fn rot_send_post(&mut self, data0: &mut [Block], data1: &mut [Block]) -> Result<(), Error> {
        let matrix = self.take_pending()?;
        check_len(matrix.len(), data0.len())?;
        check_len(matrix.len(), data1.len())?;
        let mut pad = [Block::ZERO; 2 * DOUBLE_WINDOW];

        for ((q, d0), d1) in matrix
            .q
            .chunks(DOUBLE_WINDOW)
            .zip(data0.chunks_mut(DOUBLE_WINDOW))
            .zip(data1.chunks_mut(DOUBLE_WINDOW))
        {
            sender_pads(&mut pad, q, matrix.delta);
            for ((pair, d0), d1) in pad.chunks_exact(2).zip(d0).zip(d1) {
                *d0 = pair[0];
                *d1 = pair[1];
            }
        }
        Ok(())
    }

    /// Fails with [`Error::LengthMismatch`] and consumes the pending matrix if
    /// its length is not `len`.
    fn check_pending_len(&mut self, len: usize) -> Result<(), Error> {
        let pending = self.pending.as_ref().ok_or(Error::NoPendingMatrix)?;
        if let Err(err) = check_len(pending.len(), len) {
            self.pending = None;
            return Err(err);
        }
        Ok(())
    }
}

impl OtExtensionReceiver {
    /// Receive `choices.len()` chosen message OTs into `data`.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = choices.len()))]
    pub async fn recv(&mut self, data: &mut [Block], choices: &[Choice]) -> Result<(), Error> {
        check_len(choices.len(), data.len())?;
        self.recv_pre(choices).await?;
        self.ot_recv_post(data, choices).await
    }

    /// Post step of [`OtExtensionReceiver::recv`].
    pub async fn ot_recv_post(
        &mut self,
        data: &mut [Block],
        choices: &[Choice],
    ) -> Result<(), Error> {
        let matrix = self.take_pending()?;
        check_len(matrix.len(), data.len())?;
        check_len(matrix.len(), choices.len())?;
        let mut pad = [Block::ZERO; SINGLE_WINDOW];
        let mut ct = [Block::ZERO; 2 * SINGLE_WINDOW];

        for ((t, out), r) in matrix
            .t
            .chunks(SINGLE_WINDOW)
            .zip(data.chunks_mut(SINGLE_WINDOW))
            .zip(choices.chunks(SINGLE_WINDOW))
        {
            let n = t.len();
            self.conn.recv_blocks_into(&mut ct[..2 * n]).await?;
            pad[..n].copy_from_slice(t);
            hash_window(&mut pad, n);
            for (((out, pad), pair), r) in out.iter_mut().zip(&pad).zip(ct.chunks_exact(2)).zip(r) {
                *out = Block::conditional_select(&pair[0], &pair[1], *r) ^ *pad;
            }
        }
        Ok(())
    }

    /// Receive correlated OTs into `data`. Counterpart to all correlated send
    /// operations of the [`OtExtensionSender`].
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = choices.len()))]
    pub async fn recv_cot(&mut self, data: &mut [Block], choices: &[Choice]) -> Result<(), Error> {
        check_len(choices.len(), data.len())?;
        self.recv_pre(choices).await?;
        self.cot_recv_post(data, choices).await
    }

    /// Post step of [`OtExtensionReceiver::recv_cot`].
    pub async fn cot_recv_post(
        &mut self,
        data: &mut [Block],
        choices: &[Choice],
    ) -> Result<(), Error> {
        let matrix = self.take_pending()?;
        check_len(matrix.len(), data.len())?;
        check_len(matrix.len(), choices.len())?;
        let mut pad = [Block::ZERO; SINGLE_WINDOW];
        let mut ct = [Block::ZERO; SINGLE_WINDOW];

        for ((t, out), r) in matrix
            .t
            .chunks(SINGLE_WINDOW)
            .zip(data.chunks_mut(SINGLE_WINDOW))
            .zip(choices.chunks(SINGLE_WINDOW))
        {
            let n = t.len();
            self.conn.recv_blocks_into(&mut ct[..n]).await?;
            pad[..n].copy_from_slice(t);
            hash_window(&mut pad, n);
            for (((out, pad), ct), r) in out.iter_mut().zip(&pad).zip(&ct).zip(r) {
                *out = *pad ^ Block::conditional_select(&Block::ZERO, ct, *r);
            }
        }
        Ok(())
    }

    /// Receive random OTs into `data`. The result equals the sender's `data0`
    /// or `data1` depending on the choice.
    #[tracing::instrument(level = Level::DEBUG, skip_all, fields(count = choices.len()))]
    pub async fn recv_rot(&mut self, data: &mut [Block], choices: &[Choice]) -> Result<(), Error> {
        check_len(choices.len(), data.len())?;
        self.recv_pre(choices).await?;
        self.rot_recv_post(data)
    }

    /// Post step of [`OtExtensionReceiver::recv_rot`]. Does not communicate.
    pub fn rot_recv_post(&mut self, data: &mut [Block]) -> Result<(), Error> {
        let matrix = self.take_pending()?;
        check_len(matrix.len(), data.len())?;
        let mut pad = [Block::ZERO; SINGLE_WINDOW];

        for (t, out) in matrix
            .t
            .chunks(SINGLE_WINDOW)
            .zip(data.chunks_mut(SINGLE_WINDOW))
        {
            let n = t.len();
            pad[..n].copy_from_slice(t);
            hash_window(&mut pad, n);
            out.copy_from_slice(&pad[..n]);
        }
        Ok(())
    }
}
