//! Index Store: persisted, generation-swapped flat vector index.
//!
//! A build embeds every chunk, writes `vectors.bin` and `meta.json` together
//! into a fresh generation directory and then atomically repoints `CURRENT`
//! at it. Readers resolve `CURRENT` once and read a complete pair.
#![deny(dead_code, unused_variables, unused_imports)]

pub mod codec;
pub mod index;
pub mod layout;
pub mod schema;
pub mod search;
pub mod store;
mod writer;

pub use index::Index;
pub use schema::IndexMeta;
pub use search::FlatIndex;
pub use store::{IndexStatus, IndexStore};
