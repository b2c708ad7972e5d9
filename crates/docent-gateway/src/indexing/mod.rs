//! Documentation ingestion
//!
//! Accepts documentation sections, embeds them in one batch call, and
//! upserts them into the vector store.

mod service;

pub use service::{IndexError, SectionIndexer, SectionUpload};
