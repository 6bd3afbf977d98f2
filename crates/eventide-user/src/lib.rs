//! Eventide — User aggregate.
//!
//! Users carry a validated first name, a list of addresses and hashed API
//! tokens. The creation event exists in two schema versions; histories
//! written with either one replay to the same shape.

pub mod application;
pub mod domain;
