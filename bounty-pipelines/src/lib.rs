//! The pipeline layer: one module per job-queue consumer (C8-C11), plus the
//! shared collaborators (`context`, `jobs`, `resources`, `proof_codec`) they
//! all depend on. Each pipeline module exposes a `run_*_job(ctx, Job)` entry
//! point a `Poller` handler closure calls directly, and a `run_*` entry point
//! taking the typed id for direct/test invocation without a queue round-trip.

pub mod api;
pub mod context;
pub mod jobs;
pub mod payment;
pub mod protocol;
pub mod proof_codec;
pub mod researcher;
pub mod resources;
pub mod validator;

pub use context::PipelineContext;
