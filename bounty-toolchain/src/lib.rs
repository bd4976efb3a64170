mod clone;
mod compile;
mod error;
mod process;
mod risk_score;
mod static_analyzer;
mod toolchain;

pub use clone::{clone_branch, validate_source_url};
pub use compile::{compile, CompiledContract};
pub use error::{Result, ToolchainError};
pub use process::{run_capped, CappedOutput};
pub use risk_score::risk_score;
pub use static_analyzer::{run_static_analyzer, StaticFinding};
pub use toolchain::{DefaultToolchain, ToolchainApi};
#[cfg(any(test, feature = "mock"))]
pub use toolchain::MockToolchainApi;
