//! Payment provider implementations
//!
//! Concrete implementations of the PaymentProvider trait.

pub mod sofort;

pub use sofort::{SofortConfig, SofortProvider};
