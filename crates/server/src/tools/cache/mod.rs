//! Cache inspection tools.

pub mod index;

pub use index::{CacheIndexParams, index_impl};
