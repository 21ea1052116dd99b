pub mod error;
pub mod fetch;
pub mod observer;
pub mod plan;
