//! Retriever: turns a question into ranked, cited evidence from an [`Index`]
//! plus a weak/strong confidence flag for the answer composer.
//!
//! [`Index`]: pcodex_vector::Index
#![deny(dead_code, unused_variables, unused_imports)]

pub mod result;
pub mod retriever;

pub use result::{Confidence, RetrievalResult, RetrievedChunk};
pub use retriever::Retriever;
