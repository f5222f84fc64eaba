//! API Routes
//!
//! Route handlers organized by functionality.

pub mod clients;
pub mod health;
pub mod push;
