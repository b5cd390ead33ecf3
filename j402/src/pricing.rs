//! Priced-units ↔ atomic-units conversion.
//!
//! Handlers are priced in human units (`0.001`); the wire carries atomic
//! token units (`"1000"` for six-decimal USDC). The [`Pricer`] trait is the
//! pure conversion seam both halves consume: the server quotes a demand from
//! a priced amount, the client converts a demand back to priced units before
//! evaluating guardrails. A USDC implementation lives in `j402-evm`.

use crate::proto::TypedDataExtra;

/// Errors raised during price conversion.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum PricingError {
    /// The network is not in the pricer's deployment table.
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
    /// The amount is non-positive, non-finite, or unparseable.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// A resolved demand: atomic amount plus the asset it is denominated in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetQuote {
    /// The amount in the asset's smallest unit, as a decimal string.
    pub amount_atomic: String,
    /// The token contract address.
    pub asset: String,
    /// The asset's decimal places.
    pub decimals: u8,
    /// EIP-712 domain parameters for the asset.
    pub extra: TypedDataExtra,
}

/// Pure conversion between priced units and atomic token units.
pub trait Pricer: Send + Sync {
    /// Converts a priced amount into an atomic quote for the given network.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::UnknownNetwork`] for networks outside the
    /// deployment table and [`PricingError::InvalidAmount`] for amounts that
    /// are non-positive, non-finite, or round to zero atomic units.
    fn quote(&self, amount: f64, network: &str) -> Result<AssetQuote, PricingError>;

    /// Converts an atomic amount back to priced units for the given network.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::UnknownNetwork`] or
    /// [`PricingError::InvalidAmount`] if the amount string does not parse.
    fn priced_amount(&self, amount_atomic: &str, network: &str) -> Result<f64, PricingError>;
}
