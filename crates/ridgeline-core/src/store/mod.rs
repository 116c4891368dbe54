//! Content-addressed persistence of accumulator snapshots, with a pluggable
//! in-memory cache of decoded arenas in front of the stored bytes.

pub mod cache;
pub mod snapshot;

pub use cache::*;
pub use snapshot::*;
