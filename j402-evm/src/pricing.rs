//! USDC pricing over the well-known network table.

use j402::pricing::{AssetQuote, Pricer, PricingError};
use j402::proto::TypedDataExtra;

use crate::networks::deployment_by_network;

/// Converts priced USDC amounts to atomic units and back, per network.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsdcPricer;

impl UsdcPricer {
    /// Creates a USDC pricer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Pricer for UsdcPricer {
    fn quote(&self, amount: f64, network: &str) -> Result<AssetQuote, PricingError> {
        let deployment = deployment_by_network(network)
            .ok_or_else(|| PricingError::UnknownNetwork(network.to_owned()))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PricingError::InvalidAmount(format!(
                "amount must be a positive finite number, got {amount}"
            )));
        }
        let scale = 10f64.powi(i32::from(deployment.decimals));
        let atomic = (amount * scale).round();
        if atomic < 1.0 {
            return Err(PricingError::InvalidAmount(format!(
                "amount {amount} rounds to zero atomic units"
            )));
        }
        Ok(AssetQuote {
            amount_atomic: format!("{}", atomic as u128),
            asset: deployment.address.to_owned(),
            decimals: deployment.decimals,
            extra: TypedDataExtra {
                name: deployment.eip712_name.to_owned(),
                version: deployment.eip712_version.to_owned(),
            },
        })
    }

    fn priced_amount(&self, amount_atomic: &str, network: &str) -> Result<f64, PricingError> {
        let deployment = deployment_by_network(network)
            .ok_or_else(|| PricingError::UnknownNetwork(network.to_owned()))?;
        let atomic: u128 = amount_atomic
            .trim()
            .parse()
            .map_err(|_| PricingError::InvalidAmount(amount_atomic.to_owned()))?;
        Ok(atomic as f64 / 10f64.powi(i32::from(deployment.decimals)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_converts_to_atomic_units() {
        let quote = UsdcPricer::new().quote(0.001, "base-sepolia").unwrap();
        assert_eq!(quote.amount_atomic, "1000");
        assert_eq!(quote.decimals, 6);
        assert_eq!(quote.asset, "0x036CbD53842c5426634e7929541eC2318f3dCF7e");
        assert_eq!(quote.extra.name, "USDC");
        assert_eq!(quote.extra.version, "2");
    }

    #[test]
    fn test_quote_rounds_cleanly() {
        // 0.1 is not exactly representable; rounding must still land on 100000.
        let quote = UsdcPricer::new().quote(0.1, "base").unwrap();
        assert_eq!(quote.amount_atomic, "100000");
    }

    #[test]
    fn test_quote_unknown_network() {
        assert!(matches!(
            UsdcPricer::new().quote(1.0, "moonbase"),
            Err(PricingError::UnknownNetwork(_))
        ));
    }

    #[test]
    fn test_quote_rejects_bad_amounts() {
        let pricer = UsdcPricer::new();
        assert!(matches!(
            pricer.quote(0.0, "base"),
            Err(PricingError::InvalidAmount(_))
        ));
        assert!(matches!(
            pricer.quote(-0.5, "base"),
            Err(PricingError::InvalidAmount(_))
        ));
        assert!(matches!(
            pricer.quote(f64::NAN, "base"),
            Err(PricingError::InvalidAmount(_))
        ));
        // Rounds to zero atomic units at six decimals.
        assert!(matches!(
            pricer.quote(0.000_000_4, "base"),
            Err(PricingError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_priced_amount_back_conversion() {
        let pricer = UsdcPricer::new();
        let amount = pricer.priced_amount("1000", "base-sepolia").unwrap();
        assert!((amount - 0.001).abs() < 1e-12);
        assert!(pricer.priced_amount("not-a-number", "base-sepolia").is_err());
    }

    #[test]
    fn test_roundtrip_through_atomic() {
        let pricer = UsdcPricer::new();
        let quote = pricer.quote(0.25, "base").unwrap();
        let back = pricer.priced_amount(&quote.amount_atomic, "base").unwrap();
        assert!((back - 0.25).abs() < 1e-12);
    }
}
