//! # ESP-AT passthrough client
//!
//! Brings an ESP-AT modem from reset into a transparent TCP connection and back. See
//! [wifi](crate::wifi) for joining a network and [stack](crate::stack) for the TCP tunnel.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

#[cfg(test)]
extern crate alloc;

// Needs to come first, as it provides the logging macros
mod fmt;

pub(crate) mod commands;
pub mod diagnostics;
pub mod reader;
pub mod stack;
pub mod timing;
pub mod transport;
pub mod wifi;

#[cfg(feature = "examples")]
pub mod example;

#[cfg(test)]
mod tests;
