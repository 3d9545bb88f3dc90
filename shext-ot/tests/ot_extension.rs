use anyhow::Result;
use rand::{Rng, SeedableRng, rngs::StdRng};
use shext_core::Block;
use shext_net::{
    Connection, ConnectionError,
    testing::{init_tracing, local_conn, tcp_local_conn},
};
use shext_ot::{
    Connected, Correlation, Error, OtExtensionReceiver, OtExtensionSender, base,
    post::{DOUBLE_WINDOW, SINGLE_WINDOW},
    random_choices,
};
use subtle::{Choice, ConditionallySelectable};

const BATCH_SIZE: usize = 256;

/// Lengths around the window and batch boundaries.
fn lengths() -> Vec<usize> {
    let mut lengths = vec![0, 1, 1000];
    for boundary in [
        DOUBLE_WINDOW,
        SINGLE_WINDOW,
        3 * SINGLE_WINDOW,
        BATCH_SIZE,
        2 * BATCH_SIZE,
    ] {
        lengths.extend([boundary - 1, boundary, boundary + 1]);
    }
    lengths
}

fn pair(
    c1: Connection,
    c2: Connection,
    rng: &mut StdRng,
) -> (OtExtensionSender, OtExtensionReceiver) {
    let (sender_base, receiver_base) = base::dealer(rng);
    (
        OtExtensionSender::new(c1, sender_base).with_batch_size(BATCH_SIZE),
        OtExtensionReceiver::new(c2, receiver_base).with_batch_size(BATCH_SIZE),
    )
}

async fn local_pair(seed: u64) -> Result<(OtExtensionSender, OtExtensionReceiver, StdRng)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (c1, c2) = local_conn().await?;
    let (sender, receiver) = pair(c1, c2, &mut rng);
    Ok((sender, receiver, rng))
}

fn select(a: &Block, b: &Block, choice: &Choice) -> Block {
    Block::conditional_select(a, b, *choice)
}

fn random_blocks(count: usize, rng: &mut StdRng) -> Vec<Block> {
    (0..count).map(|_| rng.random()).collect()
}

#[tokio::test]
async fn plain_ot() -> Result<()> {
    let _g = init_tracing();
    let (mut sender, mut receiver, mut rng) = local_pair(1).await?;
    // one session for all lengths, each call uses fresh extension matrices
    for len in lengths() {
        let data0 = random_blocks(len, &mut rng);
        let data1 = random_blocks(len, &mut rng);
        let choices = random_choices(len, &mut rng);
        let mut data = vec![Block::ZERO; len];
        tokio::try_join!(
            sender.send(&data0, &data1),
            receiver.recv(&mut data, &choices)
        )?;
        for (((d0, d1), d), c) in data0.iter().zip(&data1).zip(&data).zip(&choices) {
            assert_eq!(select(d0, d1, c), *d, "len {len}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn plain_ot_over_tcp() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(2);
    let (c1, c2) = tcp_local_conn().await?;
    let (mut sender, mut receiver) = pair(c1, c2, &mut rng);
    let len = 5000;
    let data0 = random_blocks(len, &mut rng);
    let data1 = random_blocks(len, &mut rng);
    let choices = random_choices(len, &mut rng);
    let mut data = vec![Block::ZERO; len];
    tokio::try_join!(
        sender.send(&data0, &data1),
        receiver.recv(&mut data, &choices)
    )?;
    for (((d0, d1), d), c) in data0.iter().zip(&data1).zip(&data).zip(&choices) {
        assert_eq!(select(d0, d1, c), *d);
    }
    Ok(())
}

#[tokio::test]
async fn cot_fixed_delta() -> Result<()> {
    let _g = init_tracing();
    let (mut sender, mut receiver, mut rng) = local_pair(3).await?;
    for len in lengths() {
        let delta: Block = rng.random();
        let choices = random_choices(len, &mut rng);
        let mut data0 = vec![Block::ZERO; len];
        let mut data = vec![Block::ZERO; len];
        tokio::try_join!(
            sender.send_cot(&mut data0, delta),
            receiver.recv_cot(&mut data, &choices)
        )?;
        for ((d0, d), c) in data0.iter().zip(&data).zip(&choices) {
            assert_eq!(select(d0, &(*d0 ^ delta), c), *d, "len {len}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn cot_fixed_delta_1000() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(4).await?;
    let delta: Block = rng.random();
    let choices = random_choices(1000, &mut rng);
    let mut data0 = vec![Block::ZERO; 1000];
    let mut data = vec![Block::ZERO; 1000];
    tokio::try_join!(
        sender.send_cot(&mut data0, delta),
        receiver.recv_cot(&mut data, &choices)
    )?;
    for ((d0, d), c) in data0.iter().zip(&data).zip(&choices) {
        if c.unwrap_u8() == 1 {
            assert_eq!(*d0 ^ delta, *d);
        } else {
            assert_eq!(*d0, *d);
        }
    }
    // the sender's pads are pseudorandom
    assert_ne!(data0[0], data0[1]);
    // one block per C-OT after the extension
    assert_eq!(1000 * Block::BYTES as u64, sender.connection().bytes_written());
    Ok(())
}

#[tokio::test]
async fn cot_per_index_functions() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(5).await?;
    for len in lengths() {
        let offsets = random_blocks(len, &mut rng);
        let fs: Vec<Box<dyn Fn(Block) -> Block>> = offsets
            .iter()
            .map(|&off| Box::new(move |x: Block| !x ^ off) as Box<dyn Fn(Block) -> Block>)
            .collect();
        let choices = random_choices(len, &mut rng);
        let mut data0 = vec![Block::ZERO; len];
        let mut data = vec![Block::ZERO; len];
        tokio::try_join!(
            sender.send_cot_fs(&mut data0, &fs),
            receiver.recv_cot(&mut data, &choices)
        )?;
        for (((d0, d), c), off) in data0.iter().zip(&data).zip(&choices).zip(&offsets) {
            assert_eq!(select(d0, &(!*d0 ^ *off), c), *d, "len {len}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn cot_dyn_function() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(6).await?;
    let key: Block = rng.random();
    let f = move |x: Block, j: usize| x ^ key ^ Block::from(j);
    for len in lengths() {
        let choices = random_choices(len, &mut rng);
        let mut data0 = vec![Block::ZERO; len];
        let mut data = vec![Block::ZERO; len];
        tokio::try_join!(
            sender.send_cot_f(&mut data0, &f),
            receiver.recv_cot(&mut data, &choices)
        )?;
        for (j, ((d0, d), c)) in data0.iter().zip(&data).zip(&choices).enumerate() {
            assert_eq!(select(d0, &f(*d0, j), c), *d, "len {len}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn cot_generic_function() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(7).await?;
    for len in lengths() {
        let choices = random_choices(len, &mut rng);
        let mut data0 = vec![Block::ZERO; len];
        let mut data = vec![Block::ZERO; len];
        let mut calls = 0;
        tokio::try_join!(
            sender.send_cot_ft(&mut data0, |x, j| {
                calls += 1;
                x.wrapping_add_halves(j as u64, 0)
            }),
            receiver.recv_cot(&mut data, &choices)
        )?;
        assert_eq!(len, calls);
        for (j, ((d0, d), c)) in data0.iter().zip(&data).zip(&choices).enumerate() {
            let correlated = d0.wrapping_add_halves(j as u64, 0);
            assert_eq!(select(d0, &correlated, c), *d, "len {len}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn cot_additive_pairs() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(8).await?;
    for len in lengths() {
        let mut deltas: Vec<(u64, u64)> = (0..len).map(|_| rng.random()).collect();
        if let Some(first) = deltas.first_mut() {
            // exercise wrap around of both halves
            *first = (u64::MAX, u64::MAX);
        }
        let choices = random_choices(len, &mut rng);
        let mut data0 = vec![Block::ZERO; len];
        let mut data = vec![Block::ZERO; len];
        tokio::try_join!(
            sender.send_cot_add_delta(&mut data0, &deltas),
            receiver.recv_cot(&mut data, &choices)
        )?;
        for (((d0, d), c), (lo, hi)) in data0.iter().zip(&data).zip(&choices).zip(&deltas) {
            if c.unwrap_u8() == 1 {
                assert_eq!(d0.low().wrapping_add(*lo), d.low(), "len {len}");
                assert_eq!(d0.high().wrapping_add(*hi), d.high(), "len {len}");
            } else {
                assert_eq!(d0, d);
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn cot_with_map() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(9).await?;
    let len = 2 * SINGLE_WINDOW + 1;
    let f = |x: Block| x ^ Block::ONES;
    let choices = random_choices(len, &mut rng);
    let mut data0 = vec![Block::ZERO; len];
    let mut data = vec![Block::ZERO; len];
    tokio::try_join!(
        sender.send_cot_with(&mut data0, Correlation::Map(&f)),
        receiver.recv_cot(&mut data, &choices)
    )?;
    for ((d0, d), c) in data0.iter().zip(&data).zip(&choices) {
        assert_eq!(select(d0, &!*d0, c), *d);
    }
    Ok(())
}

#[tokio::test]
async fn random_ot() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(10).await?;
    for len in lengths() {
        let choices = random_choices(len, &mut rng);
        let mut data0 = vec![Block::ZERO; len];
        let mut data1 = vec![Block::ZERO; len];
        let mut data = vec![Block::ZERO; len];
        tokio::try_join!(
            sender.send_rot(&mut data0, &mut data1),
            receiver.recv_rot(&mut data, &choices)
        )?;
        for (((d0, d1), d), c) in data0.iter().zip(&data1).zip(&data).zip(&choices) {
            assert_ne!(d0, d1);
            assert_eq!(select(d0, d1, c), *d, "len {len}");
        }
    }
    Ok(())
}

#[tokio::test]
async fn split_plain_ot() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(11).await?;
    let len = 3 * DOUBLE_WINDOW + 1;
    let data0 = random_blocks(len, &mut rng);
    let data1 = random_blocks(len, &mut rng);
    let choices = random_choices(len, &mut rng);
    let mut data = vec![Block::ZERO; len];
    tokio::try_join!(sender.send_pre(len), receiver.recv_pre(&choices))?;
    tokio::try_join!(
        sender.ot_send_post(&data0, &data1),
        receiver.ot_recv_post(&mut data, &choices)
    )?;
    for (((d0, d1), d), c) in data0.iter().zip(&data1).zip(&data).zip(&choices) {
        assert_eq!(select(d0, d1, c), *d);
    }
    Ok(())
}

#[tokio::test]
async fn closed_connection_consumes_matrix() -> Result<()> {
    let (mut sender, mut receiver, mut rng) = local_pair(12).await?;
    let len = 20;
    let choices = random_choices(len, &mut rng);
    tokio::try_join!(sender.send_pre(len), receiver.recv_pre(&choices))?;
    sender.connection().shutdown().await?;

    let mut data = vec![Block::ZERO; len];
    let res = receiver.cot_recv_post(&mut data, &choices).await;
    assert!(
        matches!(res, Err(Error::Connection(ConnectionError::Closed))),
        "{res:?}"
    );
    let res = receiver.cot_recv_post(&mut data, &choices).await;
    assert!(matches!(res, Err(Error::NoPendingMatrix)), "{res:?}");
    Ok(())
}
