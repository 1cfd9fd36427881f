//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming mutating request (POST/PUT/PATCH/DELETE):
//!     → csrf.rs (Origin vs X-Forwarded-Host / Host, allow-list globs)
//!     → Pass to routing, or fail the whole request with 403
//! ```
//!
//! # Design Decisions
//! - Runs before route matching; a rejection is never boundary-resolved
//! - Fail closed: any unparseable input rejects the request

pub mod csrf;

pub use csrf::{throw_if_potential_csrf_attack, CsrfError};
