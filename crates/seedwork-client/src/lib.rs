//! REST backend for seedwork.
//!
//! Implements the `Backend` port of `seedwork-storage` against a host that
//! exposes Directus-style REST endpoints (`/collections`, `/fields`,
//! `/relations`, `/items/<collection>` and `/<system collection>`).
//!
//! ```ignore
//! use seedwork_client::{RestBackend, RestConfig};
//!
//! let backend = RestBackend::new(
//!     RestConfig::new("http://localhost:8055").with_token(token),
//! )?;
//! ```

mod client;
pub mod endpoints;

pub use client::{RestBackend, RestConfig};
