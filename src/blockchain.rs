// Thin re-export module: implementation lives in `blockchain/core.rs`, split
// into the chain itself, its integrity check and balance derivation.

pub mod core;
pub use core::*;
