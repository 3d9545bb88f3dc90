//! Base OT seeds consumed by OT extension.
//!
//! Performing the base OTs (e.g. with Simplest OT [[CO15]]) is not part of
//! this crate. Their outputs are handed to the extension as
//! [`SenderBaseOts`] and [`ReceiverBaseOts`]. Note that the roles are
//! swapped: the OT extension *sender* acts as the base OT *receiver* and vice
//! versa.
//!
//! [CO15]: https://eprint.iacr.org/2015/267
use rand::{CryptoRng, Rng};
use shext_core::Block;
use subtle::{Choice, ConditionallySelectable};

use crate::{BASE_OT_COUNT, Error, random_choices};

/// Base OT outputs held by the OT extension sender.
///
/// `seeds[i]` is the message selected by `choices[i]` in the `i`-th base OT.
#[derive(Debug, Clone)]
pub struct SenderBaseOts {
    pub(crate) seeds: Vec<Block>,
    pub(crate) choices: Vec<Choice>,
}

/// Base OT outputs held by the OT extension receiver, both messages of each
/// base OT.
#[derive(Debug, Clone)]
pub struct ReceiverBaseOts {
    pub(crate) seeds: Vec<[Block; 2]>,
}

impl SenderBaseOts {
    /// Returns [`Error::InvalidBaseOts`] unless exactly [`BASE_OT_COUNT`]
    /// seeds and choices are provided.
    pub fn new(seeds: Vec<Block>, choices: Vec<Choice>) -> Result<Self, Error> {
        for actual in [seeds.len(), choices.len()] {
            if actual != BASE_OT_COUNT {
                return Err(Error::InvalidBaseOts {
                    expected: BASE_OT_COUNT,
                    actual,
                });
            }
        }
        Ok(Self { seeds, choices })
    }

    /// The sender's secret correlation, bit `i` is the `i`-th base choice.
    pub fn delta(&self) -> Block {
        Block::from_choices(&self.choices)
    }
}

impl ReceiverBaseOts {
    /// Returns [`Error::InvalidBaseOts`] unless exactly [`BASE_OT_COUNT`]
    /// seed pairs are provided.
    pub fn new(seeds: Vec<[Block; 2]>) -> Result<Self, Error> {
        if seeds.len() != BASE_OT_COUNT {
            return Err(Error::InvalidBaseOts {
                expected: BASE_OT_COUNT,
                actual: seeds.len(),
            });
        }
        Ok(Self { seeds })
    }
}

/// Sample correlated base OT outputs for both parties.
///
/// # Warning: insecure!
/// Whoever calls this function knows the seeds of both parties. Only use it
/// in tests or when both parties are simulated by the same process.
pub fn dealer<R: Rng + CryptoRng>(rng: &mut R) -> (SenderBaseOts, ReceiverBaseOts) {
    let choices = random_choices(BASE_OT_COUNT, rng);
    let seeds: Vec<[Block; 2]> = (0..BASE_OT_COUNT).map(|_| rng.random()).collect();
    let chosen = seeds
        .iter()
        .zip(&choices)
        .map(|([s0, s1], c)| Block::conditional_select(s0, s1, *c))
        .collect();
    (
        SenderBaseOts {
            seeds: chosen,
            choices,
        },
        ReceiverBaseOts { seeds },
    )
}
