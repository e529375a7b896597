//! Read entities definitions.

pub mod ranking;
pub mod user;
