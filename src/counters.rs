//! Process-wide totals of resident chunks and their point payload bytes.

use std::sync::atomic::{AtomicUsize, Ordering};

static CHUNK_COUNT: AtomicUsize = AtomicUsize::new(0);
static CHUNK_BYTES: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn add_chunk() {
    CHUNK_COUNT.fetch_add(1, Ordering::AcqRel);
}

pub(crate) fn sub_chunk() {
    CHUNK_COUNT.fetch_sub(1, Ordering::AcqRel);
}

pub(crate) fn add_bytes(n: usize) {
    CHUNK_BYTES.fetch_add(n, Ordering::AcqRel);
}

pub(crate) fn sub_bytes(n: usize) {
    CHUNK_BYTES.fetch_sub(n, Ordering::AcqRel);
}

/// Number of chunks currently resident in this process.
pub fn chunk_count() -> usize {
    CHUNK_COUNT.load(Ordering::Acquire)
}

/// Point payload bytes currently held by resident chunks.
pub fn chunk_bytes() -> usize {
    CHUNK_BYTES.load(Ordering::Acquire)
}
