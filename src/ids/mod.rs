//! Identifier allocation.
//!
//! Two kinds of identifiers are produced here:
//! - opaque 64-bit substitution keys for element markers ([`IdAllocator`])
//! - human-readable, page-unique element ids ([`generate_id_prefix`], [`unique_id`])

mod allocator;
mod slug;

pub use allocator::{AllocatorConfig, IdAllocator, MAX_ATTEMPTS, OsRandom, RANGE_WIDTH, RandomSource};
pub use slug::{generate_id_prefix, is_valid_id, unique_id};
