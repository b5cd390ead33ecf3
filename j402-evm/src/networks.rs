//! Well-known EVM network definitions and USDC deployments.
//!
//! Source: <https://developers.circle.com/stablecoins/usdc-contract-addresses>

/// A named EIP-155 network with its Circle USDC deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsdcDeployment {
    /// Human-readable network name (e.g., `"base-sepolia"`).
    pub network: &'static str,
    /// Numeric EIP-155 chain id.
    pub chain_id: u64,
    /// USDC contract address.
    pub address: &'static str,
    /// Token decimals.
    pub decimals: u8,
    /// EIP-712 domain name of the deployment.
    pub eip712_name: &'static str,
    /// EIP-712 domain version of the deployment.
    pub eip712_version: &'static str,
}

/// USDC deployments on the supported EIP-155 networks.
pub static EVM_NETWORKS: &[UsdcDeployment] = &[
    UsdcDeployment {
        network: "ethereum",
        chain_id: 1,
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        decimals: 6,
        eip712_name: "USD Coin",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "ethereum-sepolia",
        chain_id: 11_155_111,
        address: "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238",
        decimals: 6,
        eip712_name: "USDC",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "base",
        chain_id: 8453,
        address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        decimals: 6,
        eip712_name: "USD Coin",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "base-sepolia",
        chain_id: 84_532,
        address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        decimals: 6,
        eip712_name: "USDC",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "arbitrum",
        chain_id: 42_161,
        address: "0xaf88d065e77c8cC2239327C5EDb3A432268e5831",
        decimals: 6,
        eip712_name: "USD Coin",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "arbitrum-sepolia",
        chain_id: 421_614,
        address: "0x75faf114eafb1BDbe2F0316DF893fd58CE46AA4d",
        decimals: 6,
        eip712_name: "USDC",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "optimism",
        chain_id: 10,
        address: "0x0b2C639c533813f4Aa9D7837CAf62653d097Ff85",
        decimals: 6,
        eip712_name: "USD Coin",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "optimism-sepolia",
        chain_id: 11_155_420,
        address: "0x5fd84259d66Cd46123540766Be93DFE6D43130D7",
        decimals: 6,
        eip712_name: "USDC",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "polygon",
        chain_id: 137,
        address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
        decimals: 6,
        eip712_name: "USD Coin",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "polygon-amoy",
        chain_id: 80_002,
        address: "0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582",
        decimals: 6,
        eip712_name: "USDC",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "avalanche",
        chain_id: 43_114,
        address: "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
        decimals: 6,
        eip712_name: "USD Coin",
        eip712_version: "2",
    },
    UsdcDeployment {
        network: "avalanche-fuji",
        chain_id: 43_113,
        address: "0x5425890298aed601595a70AB815c96711a31Bc65",
        decimals: 6,
        eip712_name: "USD Coin",
        eip712_version: "2",
    },
];

/// Looks up a deployment by network name.
#[must_use]
pub fn deployment_by_network(network: &str) -> Option<&'static UsdcDeployment> {
    EVM_NETWORKS.iter().find(|d| d.network == network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_networks() {
        let base_sepolia = deployment_by_network("base-sepolia").unwrap();
        assert_eq!(base_sepolia.chain_id, 84_532);
        assert_eq!(base_sepolia.decimals, 6);

        let base = deployment_by_network("base").unwrap();
        assert_eq!(base.chain_id, 8453);

        assert!(deployment_by_network("unknown").is_none());
    }

    #[test]
    fn test_network_names_unique() {
        for (i, a) in EVM_NETWORKS.iter().enumerate() {
            for b in &EVM_NETWORKS[i + 1..] {
                assert_ne!(a.network, b.network);
                assert_ne!(a.chain_id, b.chain_id);
            }
        }
    }

    #[test]
    fn test_addresses_are_hex() {
        for deployment in EVM_NETWORKS {
            assert!(deployment.address.starts_with("0x"));
            assert_eq!(deployment.address.len(), 42);
        }
    }
}
