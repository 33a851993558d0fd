//! Result cache for compiled LaTeX artifacts
//!
//! A strictly-performance layer keyed by `(compile key, field)`: it is
//! never authoritative, admission is size-bounded, concurrent writers
//! follow first-writer-wins, and a cached compile error shadows all other
//! fields of its key.

pub mod backend;
pub mod cache;

pub use backend::{CacheBackend, MemoryBackend};
pub use cache::{Lookup, ResultCache, CACHED_FIELDS, COMPILE_ERROR_FIELD};
