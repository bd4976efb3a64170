//! Isolated local EVM execution: spawn a throwaway chain, deploy a
//! candidate contract, replay a proof's exploit steps against it, and tear
//! it down. Resources are owned by a single pipeline execution and must be
//! released via `Sandbox::kill` on every exit path.

pub mod error;
pub mod port_lease;
pub mod sandbox;
pub mod types;

pub use error::{Result, SandboxError};
pub use port_lease::{PortPool, SandboxPortLease};
pub use sandbox::{Sandbox, SandboxApi};
#[cfg(any(test, feature = "mock"))]
pub use sandbox::MockSandboxApi;
pub use types::{DeployedContract, ExploitPlan, ExploitResult, ExploitStep, SandboxHandle};
