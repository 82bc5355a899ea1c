//! Single-slot, time-bounded memory of the last observed identity/session pair.
//!
//! The cache is a fast path in front of the identity provider: callers read it
//! first and only go to the provider on a miss. It never inspects what it stores.

mod cache;
mod config;

pub use cache::*;
pub use config::*;
