//! Quoting Strategy
//!
//! Pure functions: ladder generation and the reconciliation diff. No I/O.

pub mod decimal;
pub mod ladder;
pub mod reconcile;
