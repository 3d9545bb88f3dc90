//! Slice helpers for bitwise operations.
use std::ops::{BitAndAssign, BitXorAssign};

#[inline]
pub fn xor_inplace<T: Copy + BitXorAssign>(a: &mut [T], b: &[T]) {
    a.iter_mut().zip(b).for_each(|(a, b)| {
        *a ^= *b;
    });
}

#[inline]
pub fn and_inplace_elem<T: Copy + BitAndAssign>(a: &mut [T], b: T) {
    a.iter_mut().for_each(|a| {
        *a &= b;
    });
}
