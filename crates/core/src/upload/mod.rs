//! Ping delivery
//!
//! [`PingUploader`] observes the [`PingStore`](crate::pings::PingStore),
//! keeps an in-memory FIFO of pings awaiting delivery and drains it against
//! a [`Transport`] on its own lane, independent of the scheduler.

mod error;
mod ports;
mod rate_limiter;
mod request;
mod uploader;

pub use error::UploadError;
pub use ports::Transport;
pub use rate_limiter::{RateLimiter, RateLimiterState};
pub use request::PingRequest;
pub use uploader::{PingUploader, UploaderState};
