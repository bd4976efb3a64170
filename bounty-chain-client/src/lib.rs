//! Typed wrapper around the bounty contract suite. Pipeline code depends on
//! `ChainClientApi`, never on `ethers` contract/receipt types directly - the
//! trait boundary is where this crate's public surface ends.

mod abi;
pub mod client;
pub mod error;
pub mod types;

pub use client::{ChainClientApi, EthersChainClient};
#[cfg(any(test, feature = "mock"))]
pub use client::MockChainClientApi;
pub use error::{ChainError, Result};
pub use types::{severity_tag, AgentOnChain, BountyReceipt, BountyReleasedEvent, OnChainBounty, OnChainProtocol, Role};
