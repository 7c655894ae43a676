//! Remote task backends.

pub mod notion;
