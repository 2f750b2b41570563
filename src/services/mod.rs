//! Business logic services.
//!
//! Services sit between the web API handlers and the `db` query modules.
//! They are independent of HTTP and are tested directly against a
//! temporary database.

pub mod api_tokens;
pub mod draft_filediffs;
pub mod review_signals;
pub mod reviews;
pub mod token_generator;

pub use review_signals::{ReviewEvent, ReviewEventKind, ReviewSignals};
pub use token_generator::{TokenGenerator, TokenGeneratorRegistry};
