//! Access tokens, their cached state, and expiry arithmetic.

pub mod access;
pub mod secret;

pub use access::*;
pub use secret::*;
