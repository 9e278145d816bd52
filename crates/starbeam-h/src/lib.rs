pub mod cdp;
pub mod dom;
mod eval;
pub mod transport;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
