//! Wallet and account abstractions for payment authorization signing.
//!
//! The wallet is an external collaborator: an owned private key or remote
//! signer exposing accounts that can sign typed structured data. The client
//! responder only needs the two seams defined here; concrete EVM signing
//! lives in `j402-evm`.

use std::sync::Arc;

use crate::facilitator::BoxFuture;
use crate::proto::{Authorization, TypedDataExtra};

/// Errors raised by wallet providers and accounts.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WalletError {
    /// The provider has no account available for signing.
    #[error("No signing account available")]
    NoAccount,
    /// The authorization could not be interpreted by the signer.
    #[error("Invalid authorization: {0}")]
    InvalidAuthorization(String),
    /// The account does not know the requested network.
    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),
    /// Signing itself failed.
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Everything an account needs to produce a payment signature.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// The network the authorization targets (e.g., `"base-sepolia"`).
    pub network: String,
    /// The token contract address (the typed-data verifying contract).
    pub asset: String,
    /// EIP-712 domain name/version from the requirement `extra`.
    pub extra: Option<TypedDataExtra>,
    /// The authorization to sign.
    pub authorization: Authorization,
}

/// A single signing identity.
pub trait Account: Send + Sync {
    /// Returns the account's address as it appears in `authorization.from`.
    fn address(&self) -> String;

    /// Signs the typed transfer authorization, returning a 0x-prefixed hex
    /// signature.
    fn sign_authorization(
        &self,
        request: &SigningRequest,
    ) -> BoxFuture<'_, Result<String, WalletError>>;
}

/// A provider of signing accounts.
pub trait Wallet: Send + Sync {
    /// Returns the account used to authorize payments.
    fn get_account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>>;
}

impl<T: Wallet> Wallet for Arc<T> {
    fn get_account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>> {
        self.as_ref().get_account()
    }
}
