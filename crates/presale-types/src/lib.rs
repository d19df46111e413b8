//! # Presale Types Crate
//!
//! Domain entities shared across the presale pipeline crates.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-crate types are defined here.
//! - **Read-Only Config**: `TokenPresaleConfig` is owned by the token
//!   registry collaborator; this core only reads it.
//! - **Decimal Totals As Strings**: `total_paid` is carried as a decimal
//!   string end to end and is never parsed into a float.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::ValidationError;
