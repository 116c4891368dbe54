pub mod arena;
pub mod accumulator;

pub use arena::*;
pub use accumulator::*;
