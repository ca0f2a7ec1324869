#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod entities;
pub mod events;
pub mod framework;
pub mod handlers;
pub mod ledger;
pub mod processors;
pub mod store;
pub mod utils;
