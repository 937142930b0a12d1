//! Response memoization.

pub mod cache;
