//! Wire types, transport and configuration shared by the panel front ends.

pub mod client;
pub mod config;
pub mod error;
pub mod platform;
pub mod protocol;
pub mod sse;
