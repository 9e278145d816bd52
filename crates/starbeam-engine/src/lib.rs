pub mod config;
pub mod dom;
pub mod events;
pub mod gateway;
pub mod memory;
pub mod navigation;
pub mod query;
pub mod transport;
pub mod waiter;

pub use starbeam_common::error;
pub use starbeam_common::protocol;
pub use starbeam_common::strategy;
pub use starbeam_common::tabs;
