#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod progress;
pub mod sequencer;
pub mod stats;
pub mod streak;
pub mod time;
pub mod validator;

pub use error::Error;
pub use time::Clock;
