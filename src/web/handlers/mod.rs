//! Route handlers for the HTTP push adapter.

pub mod delivery;
pub mod health;
