//! Sofort payment integration
//!
//! Fee arithmetic, the provider seam, and the redirect and notify flows the
//! host application drives.

pub mod fees;
pub mod providers;
pub mod service;
pub mod traits;
pub mod types;
