//! Splitting line items into bounded insert statements.

/// Rows per line-item insert statement.
pub const DEFAULT_ITEM_BATCH_SIZE: usize = 6000;

/// Number of batches needed for `len` rows, `ceil(len / size)`.
pub fn batch_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}

/// Consecutive slices of at most `size` rows, in input order.
pub fn batches<T>(rows: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    rows.chunks(size.max(1))
}
