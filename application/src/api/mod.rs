//! HTTP API definitions.

pub mod users;
