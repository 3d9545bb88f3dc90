//! Zeroed allocation of [`Pod`](bytemuck::Pod)-like buffers.
use std::{alloc::Layout, mem};

use bytemuck::Zeroable;

/// Allocate a `Vec<T>` of length `len` with all elements set to zero.
///
/// The memory is directly requested zeroed from the allocator, which is
/// faster than writing zeroes for the large matrices produced by OT
/// extension.
pub fn allocate_zeroed_vec<T: Zeroable>(len: usize) -> Vec<T> {
    if len == 0 || mem::size_of::<T>() == 0 {
        return Vec::new();
    }
    unsafe {
        let size = len * mem::size_of::<T>();
        let align = mem::align_of::<T>();
        let layout = Layout::from_size_align(size, align).expect("len too large");
        let zeroed = std::alloc::alloc_zeroed(layout);
        if zeroed.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        // Safety (see https://doc.rust-lang.org/stable/std/vec/struct.Vec.html#method.from_raw_parts):
        // - zeroed ptr was allocated via global allocator
        // - zeroed was allocated with exact alignment of T
        // - size of T times capacity (len) is equal to size of allocation
        // - length values are initialized because of alloc_zeroed and T: Zeroable
        // - allocated size is less than isize::MAX ensured by Layout construction,
        //   otherwise panic
        Vec::from_raw_parts(zeroed as *mut T, len, len)
    }
}
