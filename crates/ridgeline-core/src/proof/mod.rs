pub mod builder;
pub mod verifier;

pub use builder::*;
pub use verifier::*;
