pub mod codec;
pub mod error;
pub mod record;
pub mod sampler;
pub mod session;
pub mod tally;

pub use error::Error;
