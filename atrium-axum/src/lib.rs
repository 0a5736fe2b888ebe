//! atrium-axum: Axum adapter for the Atrium tenancy engine.
//!
//! Mounts the tenant lifecycle routes for a panel and exposes the
//! per-request resolution helper application routes use.

pub mod router;
pub mod state;
mod error;

pub use error::AtriumAxumError;
pub use router::{listen, mount, mount_panels, panel_router, resolve_request};
pub use state::TenancyState;

pub use axum;
