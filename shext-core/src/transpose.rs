//! Transpose bit-matrices.
//!
//! Bits are stored row major and least significant bit first, i.e. bit `c`
//! of row `r` in a matrix with `cols` columns is bit `c % 8` of byte
//! `r * cols / 8 + c / 8`.
use std::array;

use wide::{i64x2, i8x16};

/// Transpose a bit matrix with `rows` rows.
///
/// Processes the matrix in tiles of 16 rows and 8 columns. For every tile the
/// most significant bits of the 16 row bytes are gathered with a move mask,
/// which yields 16 bits of one output row.
///
/// # Panics
/// If `rows % 128 != 0`
/// If for `let cols = input.len() * 8 / rows`, `cols % 128 != 0`
/// If `input.len() != output.len()`
pub fn transpose_bitmatrix(input: &[u8], output: &mut [u8], rows: usize) {
    assert_eq!(input.len(), output.len(), "input and output must have equal len");
    assert_eq!(0, rows % 128, "rows must be a multiple of 128");
    if input.is_empty() {
        return;
    }
    let cols = input.len() * 8 / rows;
    assert_eq!(0, cols % 128, "cols must be a multiple of 128");
    let in_row_bytes = cols / 8;
    let out_row_bytes = rows / 8;

    for rr in (0..rows).step_by(16) {
        for col_byte in 0..in_row_bytes {
            let mut v = i8x16::new(array::from_fn(|i| {
                input[(rr + i) * in_row_bytes + col_byte] as i8
            }));
            for bit in (0..8).rev() {
                let mask = v.move_mask() as u16;
                let out_idx = (col_byte * 8 + bit) * out_row_bytes + rr / 8;
                output[out_idx..out_idx + 2].copy_from_slice(&mask.to_le_bytes());
                // only the top bit of each byte is read, so shifting the
                // 64-bit lanes is equivalent to shifting each byte
                v = bytemuck::cast(bytemuck::cast::<_, i64x2>(v) << 1_u32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::transpose_bitmatrix;

    fn get_bit(m: &[u8], cols: usize, r: usize, c: usize) -> bool {
        (m[r * cols / 8 + c / 8] >> (c % 8)) & 1 == 1
    }

    fn naive_transpose(input: &[u8], rows: usize) -> Vec<u8> {
        let cols = input.len() * 8 / rows;
        let mut out = vec![0; input.len()];
        for r in 0..rows {
            for c in 0..cols {
                if get_bit(input, cols, r, c) {
                    out[c * rows / 8 + r / 8] |= 1 << (r % 8);
                }
            }
        }
        out
    }

    #[test]
    fn transpose_single_bits() {
        let rows = 128;
        let cols = 256;
        let mut input = vec![0_u8; rows * cols / 8];
        // bit (3, 200)
        input[3 * cols / 8 + 200 / 8] |= 1 << (200 % 8);
        let mut output = vec![0_u8; input.len()];
        transpose_bitmatrix(&input, &mut output, rows);
        assert!(get_bit(&output, rows, 200, 3));
        assert_eq!(1, output.iter().map(|b| b.count_ones()).sum::<u32>());
    }

    #[test]
    fn transpose_empty() {
        let mut output: [u8; 0] = [];
        transpose_bitmatrix(&[], &mut output, 128);
    }

    proptest! {
        #[test]
        fn transpose_matches_naive(
            (rows, input) in (1_usize..=2, 1_usize..=3).prop_flat_map(|(r, c)| {
                let rows = r * 128;
                (Just(rows), proptest::collection::vec(any::<u8>(), rows * c * 128 / 8))
            })
        ) {
            let mut output = vec![0_u8; input.len()];
            transpose_bitmatrix(&input, &mut output, rows);
            prop_assert_eq!(naive_transpose(&input, rows), output);
        }

        #[test]
        fn transpose_twice_is_identity(
            input in proptest::collection::vec(any::<u8>(), 128 * 128 / 8)
        ) {
            let mut once = vec![0_u8; input.len()];
            let mut twice = vec![0_u8; input.len()];
            transpose_bitmatrix(&input, &mut once, 128);
            transpose_bitmatrix(&once, &mut twice, 128);
            prop_assert_eq!(input, twice);
        }
    }
}
