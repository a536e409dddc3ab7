//! REST surface over the envelope service

pub mod actor;
pub mod handlers;
pub mod router;
pub mod state;
