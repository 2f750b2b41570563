//! Review Board - code review server.
//!
//! Reviews and their Ship It! lifecycle, plus user API tokens, exposed
//! through a JSON web API backed by SQLite.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod webapi;

pub use config::ServerSettings;
pub use error::AppError;
