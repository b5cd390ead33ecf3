//! Local private-key wallet signing ERC-3009 transfer authorizations.
//!
//! [`LocalWallet`] wraps an [`alloy_signer_local::PrivateKeySigner`] and
//! exposes it through the core [`Wallet`]/[`Account`] seams. Signing
//! reconstructs the ERC-3009 `TransferWithAuthorization` struct from the
//! authorization fields, builds the EIP-712 domain from the requirement
//! extra plus the network's chain id and the asset address, and signs the
//! typed-data hash.

use alloy_primitives::{Address, B256, U256, hex};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolStruct, eip712_domain, sol};
use std::str::FromStr;
use std::sync::Arc;

use j402::facilitator::BoxFuture;
use j402::proto::Authorization;
use j402::wallet::{Account, SigningRequest, Wallet, WalletError};

use crate::networks::deployment_by_network;

sol!(
    /// ERC-3009 `transferWithAuthorization` struct as used in EIP-712
    /// typed-data signing.
    ///
    /// The field values MUST match the wire authorization exactly: the
    /// facilitator reconstructs this struct from the authorization to
    /// verify the signature.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

/// A wallet backed by one local private key.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    signer: Arc<PrivateKeySigner>,
}

impl LocalWallet {
    /// Wraps an existing signer.
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self {
            signer: Arc::new(signer),
        }
    }

    /// Generates a wallet with a fresh random key.
    #[must_use]
    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    /// The wallet's address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl Wallet for LocalWallet {
    fn get_account(&self) -> BoxFuture<'_, Result<Arc<dyn Account>, WalletError>> {
        let account = Arc::new(LocalAccount {
            signer: Arc::clone(&self.signer),
        }) as Arc<dyn Account>;
        Box::pin(async move { Ok(account) })
    }
}

/// The signing identity of a [`LocalWallet`].
pub struct LocalAccount {
    signer: Arc<PrivateKeySigner>,
}

impl std::fmt::Debug for LocalAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAccount")
            .field("address", &self.signer.address())
            .finish()
    }
}

impl Account for LocalAccount {
    fn address(&self) -> String {
        self.signer.address().to_string()
    }

    fn sign_authorization(
        &self,
        request: &SigningRequest,
    ) -> BoxFuture<'_, Result<String, WalletError>> {
        let hash = signing_hash(request);
        Box::pin(async move {
            let hash = hash?;
            let signature = alloy_signer::Signer::sign_hash(&*self.signer, &hash)
                .await
                .map_err(|e| WalletError::Signing(format!("{e:?}")))?;
            Ok(format!("0x{}", hex::encode(signature.as_bytes())))
        })
    }
}

/// Computes the EIP-712 signing hash for a transfer authorization.
fn signing_hash(request: &SigningRequest) -> Result<B256, WalletError> {
    let deployment = deployment_by_network(&request.network)
        .ok_or_else(|| WalletError::UnsupportedNetwork(request.network.clone()))?;
    let asset = parse_address(&request.asset, "asset")?;
    let message = transfer_message(&request.authorization)?;

    let (name, version) = request.extra.as_ref().map_or_else(
        || (String::new(), String::new()),
        |extra| (extra.name.clone(), extra.version.clone()),
    );
    let domain = eip712_domain! {
        name: name,
        version: version,
        chain_id: deployment.chain_id,
        verifying_contract: asset,
    };

    Ok(message.eip712_signing_hash(&domain))
}

fn transfer_message(
    authorization: &Authorization,
) -> Result<TransferWithAuthorization, WalletError> {
    Ok(TransferWithAuthorization {
        from: parse_address(&authorization.from, "from")?,
        to: parse_address(&authorization.to, "to")?,
        value: U256::from_str_radix(&authorization.value, 10).map_err(|_| {
            WalletError::InvalidAuthorization(format!(
                "value '{}' is not a decimal integer",
                authorization.value
            ))
        })?,
        validAfter: U256::from(authorization.valid_after.as_secs()),
        validBefore: U256::from(authorization.valid_before.as_secs()),
        nonce: B256::from_str(&authorization.nonce).map_err(|_| {
            WalletError::InvalidAuthorization(format!(
                "nonce '{}' is not 32 bytes of hex",
                authorization.nonce
            ))
        })?,
    })
}

fn parse_address(value: &str, field: &str) -> Result<Address, WalletError> {
    Address::from_str(value)
        .map_err(|_| WalletError::InvalidAuthorization(format!("{field} '{value}' is not an address")))
}
