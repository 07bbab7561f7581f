#![forbid(unsafe_code)]

pub mod aggregate;
pub mod model;
pub mod time;

pub use aggregate::summarize;
pub use time::Clock;
