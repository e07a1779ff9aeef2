#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod admin;
pub mod config;
pub mod connection;
pub mod events;
pub mod identity;
pub mod session;
pub mod store;
