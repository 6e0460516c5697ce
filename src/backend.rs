//! Implementations of [`Client`](crate::Client).

pub mod memory;
pub mod rest;
