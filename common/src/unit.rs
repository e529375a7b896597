//! Marker types.

/// Marker type describing an account registration.
#[derive(Clone, Copy, Debug)]
pub struct Join;

/// Marker type describing the last observed activity.
#[derive(Clone, Copy, Debug)]
pub struct LastOnline;

/// Marker type describing an expiration.
#[derive(Clone, Copy, Debug)]
pub struct Expiration;
