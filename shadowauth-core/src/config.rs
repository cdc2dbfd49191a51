//! Service configuration and construction of the store clients.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{address, Address};
use secrecy::SecretString;
use tracing::{info, warn};

use crate::{
    analytics::DEFAULT_ANALYTICS_CAPACITY,
    contract::{ContractSessionClient, JsonRpcTransport},
    error::ShadowAuthError,
    health::DEFAULT_HEALTH_INTERVAL,
    identity::{
        IdentityProofVerifier, UnconfiguredIdentityVerifier, WorldIdCloudVerifier,
        DEFAULT_WORLD_ID_BASE_URL,
    },
    runtime::{LiveRuntimeClient, MockRuntimeClient, RuntimeVerifier},
    session::DEFAULT_SESSION_TTL,
    Network,
};

/// Default testnet runtime endpoint.
pub const DEFAULT_RUNTIME_TESTNET_ENDPOINT: &str = "https://rofl-testnet.shadowauth.oasis.io";
/// Default mainnet runtime endpoint.
pub const DEFAULT_RUNTIME_MAINNET_ENDPOINT: &str = "https://rofl.shadowauth.oasis.io";

/// `SessionKeyManager` deployment on Sapphire testnet.
pub static SESSION_CONTRACT_TESTNET: Address =
    address!("0x0c67D5525A3b1EDDdAfF38c32AA4aE4F8c4dB933");
/// Placeholder until the mainnet deployment exists.
pub static SESSION_CONTRACT_MAINNET: Address = Address::ZERO;

/// Default upstream request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Upper bound accepted for the upstream request timeout.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Default interval of the fallback cache sweep.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Everything needed to build the session stores.
#[derive(Debug)]
pub struct ShadowAuthConfig {
    /// Target network.
    pub network: Network,
    /// Runtime endpoint used on testnet.
    pub runtime_testnet_endpoint: String,
    /// Runtime endpoint used on mainnet.
    pub runtime_mainnet_endpoint: String,
    /// Runtime credential. Its absence selects the mock runtime.
    pub runtime_api_key: Option<SecretString>,
    /// Base URL of the World ID cloud verification API.
    pub world_id_base_url: String,
    /// World ID application id (`app_...`).
    pub world_id_app_id: Option<String>,
    /// World ID action the proofs are generated for.
    pub world_id_action: Option<String>,
    /// Contract address override. Defaults to the deployment of `network`.
    pub contract_address: Option<Address>,
    /// JSON-RPC URL override. Defaults to the public Sapphire endpoint of `network`.
    pub rpc_url: Option<String>,
    /// Node-managed account transactions are sent from.
    pub contract_sender: Option<Address>,
    /// Whether contract calls are actually sent.
    pub contract_writes_enabled: bool,
    /// Lifetime of issued sessions.
    pub session_ttl: Duration,
    /// Timeout of every upstream request.
    pub request_timeout: Duration,
    /// Capacity of the analytics queue.
    pub analytics_capacity: usize,
    /// Runtime health polling interval.
    pub health_interval: Duration,
    /// Fallback cache sweep interval.
    pub sweep_interval: Duration,
}

impl Default for ShadowAuthConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            runtime_testnet_endpoint: DEFAULT_RUNTIME_TESTNET_ENDPOINT.to_string(),
            runtime_mainnet_endpoint: DEFAULT_RUNTIME_MAINNET_ENDPOINT.to_string(),
            runtime_api_key: None,
            world_id_base_url: DEFAULT_WORLD_ID_BASE_URL.to_string(),
            world_id_app_id: None,
            world_id_action: None,
            contract_address: None,
            rpc_url: None,
            contract_sender: None,
            contract_writes_enabled: false,
            session_ttl: DEFAULT_SESSION_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            analytics_capacity: DEFAULT_ANALYTICS_CAPACITY,
            health_interval: DEFAULT_HEALTH_INTERVAL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ShadowAuthConfig {
    /// Runtime endpoint for the configured network.
    #[must_use]
    pub fn runtime_endpoint(&self) -> &str {
        match self.network {
            Network::Testnet => &self.runtime_testnet_endpoint,
            Network::Mainnet => &self.runtime_mainnet_endpoint,
        }
    }

    /// Contract address for the configured network.
    #[must_use]
    pub fn contract_address(&self) -> Address {
        self.contract_address.unwrap_or(match self.network {
            Network::Testnet => SESSION_CONTRACT_TESTNET,
            Network::Mainnet => SESSION_CONTRACT_MAINNET,
        })
    }

    /// JSON-RPC URL for the configured network.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or(match self.network {
            Network::Testnet => "https://testnet.sapphire.oasis.io",
            Network::Mainnet => "https://sapphire.oasis.io",
        })
    }

    /// Whether the mock runtime will be used.
    #[must_use]
    pub const fn is_mock_runtime(&self) -> bool {
        self.runtime_api_key.is_none()
    }

    /// Checks the settings for combinations that cannot work.
    ///
    /// # Errors
    /// Returns [`ShadowAuthError::Configuration`] naming the offending setting.
    pub fn validate(&self) -> Result<(), ShadowAuthError> {
        if self.request_timeout.is_zero() || self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(invalid(
                "request_timeout",
                "must be greater than zero and at most 60 seconds",
            ));
        }
        if self.session_ttl.is_zero() {
            return Err(invalid("session_ttl", "must be greater than zero"));
        }
        if self.network == Network::Mainnet
            && !self.is_mock_runtime()
            && !self.runtime_mainnet_endpoint.starts_with("https://")
        {
            return Err(invalid("runtime_mainnet_endpoint", "must use https"));
        }
        if self.contract_writes_enabled {
            if self.contract_address() == Address::ZERO {
                return Err(invalid(
                    "contract_address",
                    "no contract is deployed for this network",
                ));
            }
            if self.contract_sender.is_none() {
                return Err(invalid(
                    "contract_sender",
                    "required when contract writes are enabled",
                ));
            }
        }
        Ok(())
    }

    /// Builds the runtime client. The strategy is picked here, once.
    #[must_use]
    pub fn build_runtime(&self) -> Arc<dyn RuntimeVerifier> {
        match &self.runtime_api_key {
            Some(api_key) => {
                info!(endpoint = %self.runtime_endpoint(), network = %self.network, "runtime: live mode");
                Arc::new(LiveRuntimeClient::new(
                    self.runtime_endpoint(),
                    api_key.clone(),
                    self.network,
                    self.session_ttl,
                    self.request_timeout,
                    self.network == Network::Mainnet,
                ))
            }
            None => {
                info!("runtime: no credential configured, using mock runtime");
                Arc::new(MockRuntimeClient::new(self.session_ttl))
            }
        }
    }

    /// Builds the identity verifier. Without application and action ids every proof is
    /// rejected.
    #[must_use]
    pub fn build_identity_verifier(&self) -> Arc<dyn IdentityProofVerifier> {
        match (&self.world_id_app_id, &self.world_id_action) {
            (Some(app_id), Some(action)) => Arc::new(WorldIdCloudVerifier::new(
                self.world_id_base_url.as_str(),
                app_id.as_str(),
                action.as_str(),
                self.request_timeout,
            )),
            _ => {
                warn!("world id: application or action id missing, logins will be rejected");
                Arc::new(UnconfiguredIdentityVerifier)
            }
        }
    }

    /// Builds the contract client.
    #[must_use]
    pub fn build_contract_client(&self) -> ContractSessionClient {
        let transport =
            JsonRpcTransport::new(self.rpc_url(), self.contract_sender, self.request_timeout);
        ContractSessionClient::new(
            self.contract_address(),
            self.contract_writes_enabled,
            Arc::new(transport),
        )
    }
}

fn invalid(attribute: &str, reason: &str) -> ShadowAuthError {
    ShadowAuthError::Configuration {
        attribute: attribute.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_and_use_mock_runtime() {
        let config = ShadowAuthConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_mock_runtime());
        assert_eq!(config.runtime_endpoint(), DEFAULT_RUNTIME_TESTNET_ENDPOINT);
        assert_eq!(config.contract_address(), SESSION_CONTRACT_TESTNET);
        assert_eq!(config.build_runtime().mode(), "mock");
        assert!(!config.build_contract_client().writes_enabled());
    }

    #[test]
    fn test_api_key_selects_live_runtime() {
        let config = ShadowAuthConfig {
            runtime_api_key: Some(SecretString::from("key".to_string())),
            network: Network::Mainnet,
            ..ShadowAuthConfig::default()
        };
        assert_eq!(config.runtime_endpoint(), DEFAULT_RUNTIME_MAINNET_ENDPOINT);
        assert_eq!(config.build_runtime().mode(), "live");
    }

    #[test]
    fn test_rejects_unbounded_timeout() {
        let config = ShadowAuthConfig {
            request_timeout: Duration::ZERO,
            ..ShadowAuthConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ShadowAuthConfig {
            request_timeout: Duration::from_secs(120),
            ..ShadowAuthConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_contract_writes_require_sender_and_deployment() {
        let config = ShadowAuthConfig {
            contract_writes_enabled: true,
            ..ShadowAuthConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ShadowAuthError::Configuration { attribute, .. }) if attribute == "contract_sender"
        ));

        let config = ShadowAuthConfig {
            contract_writes_enabled: true,
            contract_sender: Some(Address::repeat_byte(1)),
            network: Network::Mainnet,
            ..ShadowAuthConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ShadowAuthError::Configuration { attribute, .. }) if attribute == "contract_address"
        ));
    }

    #[test]
    fn test_mainnet_live_runtime_requires_https() {
        let config = ShadowAuthConfig {
            network: Network::Mainnet,
            runtime_api_key: Some(SecretString::from("key".to_string())),
            runtime_mainnet_endpoint: "http://rofl.local".to_string(),
            ..ShadowAuthConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
