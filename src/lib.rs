#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod bot;
#[cfg(feature = "bridge")]
pub mod bridge;
pub mod credentials;
pub mod error;
pub mod pairing;
#[cfg(feature = "server")]
pub mod server;
pub mod transport;
pub mod types;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
