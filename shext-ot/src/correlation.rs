//! Correlation rules for correlated OT.
//!
//! For every C-OT the sender's first message is a pseudorandom pad `x_j`; the
//! second message is `correlation(x_j, j)`. A receiver with choice bit `1`
//! learns the second message, otherwise the pad.
use shext_core::Block;

/// A per-instance function from pad (and index) to the correlated message.
pub type IndexedFn<'a> = dyn Fn(Block, usize) -> Block + 'a;

/// How the sender's second C-OT message is derived from its first.
#[derive(Clone, Copy)]
pub enum Correlation<'a> {
    /// `x_j ^ delta`. The classic fixed-delta C-OT.
    FixedDelta(Block),
    /// `f(x_j)`, the same function for every instance.
    Map(&'a dyn Fn(Block) -> Block),
    /// `f(x_j, j)` where `j` is the index of the instance.
    MapIndexed(&'a IndexedFn<'a>),
    /// `fs[j](x_j)`, one function per instance.
    PerIndex(&'a [Box<dyn Fn(Block) -> Block + 'a>]),
    /// Interpret `x_j` as two 64-bit integers and add `deltas[j]` to the
    /// low and high half respectively, wrapping on overflow.
    AdditivePair(&'a [(u64, u64)]),
}

impl Correlation<'_> {
    /// Number of instances the correlation is defined for, if it is fixed.
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            Self::PerIndex(fs) => Some(fs.len()),
            Self::AdditivePair(deltas) => Some(deltas.len()),
            Self::FixedDelta(_) | Self::Map(_) | Self::MapIndexed(_) => None,
        }
    }

    /// Compute the correlated message for `pad` of instance `idx`.
    ///
    /// # Panics
    /// If the correlation has a fixed [`len`](Correlation::fixed_len) and
    /// `idx >= len`.
    #[inline]
    pub fn apply(&self, pad: Block, idx: usize) -> Block {
        match self {
            Self::FixedDelta(delta) => pad ^ *delta,
            Self::Map(f) => f(pad),
            Self::MapIndexed(f) => f(pad, idx),
            Self::PerIndex(fs) => fs[idx](pad),
            Self::AdditivePair(deltas) => {
                let (d0, d1) = deltas[idx];
                pad.wrapping_add_halves(d0, d1)
            }
        }
    }
}

impl std::fmt::Debug for Correlation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FixedDelta(delta) => f.debug_tuple("FixedDelta").field(delta).finish(),
            Self::Map(_) => f.write_str("Map(..)"),
            Self::MapIndexed(_) => f.write_str("MapIndexed(..)"),
            Self::PerIndex(fs) => write!(f, "PerIndex(len = {})", fs.len()),
            Self::AdditivePair(deltas) => write!(f, "AdditivePair(len = {})", deltas.len()),
        }
    }
}
