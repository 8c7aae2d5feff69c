//! Security policy applied by the HTTP layer.

pub mod cors;
