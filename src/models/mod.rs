pub mod agent;
pub mod proxy;

pub use agent::*;
pub use proxy::*;
