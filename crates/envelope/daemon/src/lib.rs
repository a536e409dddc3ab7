//! envelopd library
//!
//! This module provides the components of the envelope signing daemon:
//! - REST API handlers over [`envelope_service::EnvelopeService`]
//! - Configuration loading
//! - Server lifecycle management, including the expiry sweeper

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use api::{create_router, AppState};
pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
