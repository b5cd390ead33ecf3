//! EVM defaults for the x402 session payment extension.
//!
//! The core treats pricing and the wallet as external collaborators; this
//! crate ships the usable EVM defaults:
//!
//! - [`networks`] — well-known EIP-155 networks with their Circle USDC
//!   deployments (address, decimals, EIP-712 domain)
//! - [`pricing::UsdcPricer`] — priced-units ↔ atomic-units conversion over
//!   that table
//! - [`wallet::LocalWallet`] — a private-key wallet signing ERC-3009
//!   `transferWithAuthorization` typed data

pub mod networks;
pub mod pricing;
pub mod wallet;

pub use networks::{EVM_NETWORKS, UsdcDeployment, deployment_by_network};
pub use pricing::UsdcPricer;
pub use wallet::{LocalAccount, LocalWallet};
