pub mod config;
pub mod policy;
pub mod sampler;

pub use config::*;
pub use policy::*;
pub use sampler::*;
