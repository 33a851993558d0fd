//! Compile-and-cache service over the LaTeX engine
//!
//! Wires the engine, the result cache, and a record store into one
//! request flow. The store is the source of truth; the cache only
//! short-circuits repeat work. Responses map onto HTTP statuses so a
//! transport layer stays thin: compile errors are the caller's problem
//! (400), infrastructure failures the operator's (500).

pub mod config;
pub mod service;
pub mod store;

pub use config::{CacheSettings, ServiceConfig};
pub use service::{RenderResponse, RenderService};
pub use store::{CollectionRecord, MemoryStore, PdfRecord, RecordStore, StoreError};
