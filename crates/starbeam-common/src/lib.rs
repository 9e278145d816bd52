pub mod error;
pub mod protocol;
pub mod strategy;
pub mod tabs;
