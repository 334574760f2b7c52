#![doc = include_str!("../README.md")]
#![warn(missing_docs, missing_debug_implementations)]
mod config;
mod error;
mod guard;
mod local;
mod padded;
mod pool;
mod reusable;
mod sizing;
mod slots;
mod strategy;

pub use config::*;
pub use error::*;
pub use guard::{OwnedPooled, Pooled};
pub use pool::*;
pub use reusable::*;
pub use sizing::*;
pub use strategy::*;
