//! On-chain/off-chain payment reconciliation.
//!
//! [`stream`] polls `BountyPool.BountyReleased` logs, detects orphaned
//! releases, amount/researcher mismatches, and auto-resolves clean matches
//! against the payments pipeline's own records. [`sweeper`] flags COMPLETED
//! payments that have gone stale without ever seeing one of those logs.
//! [`api`] is the read/manual-resolution surface over the findings both
//! produce.

pub mod api;
pub mod context;
pub mod stream;
pub mod sweeper;

pub use context::ReconcilerContext;
