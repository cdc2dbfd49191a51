//! Command line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use alloy_primitives::Address;
use clap::Parser;
use secrecy::SecretString;
use shadowauth_core::{
    analytics::DEFAULT_ANALYTICS_CAPACITY,
    config::{ShadowAuthConfig, DEFAULT_RUNTIME_MAINNET_ENDPOINT, DEFAULT_RUNTIME_TESTNET_ENDPOINT},
    identity::DEFAULT_WORLD_ID_BASE_URL,
    Network,
};

/// Every setting can be given as a flag or through the environment. A `.env` file in the
/// working directory is loaded first.
#[derive(Debug, Parser)]
#[command(name = "shadowauth", version, about = "Anonymous session keys for World ID verified users")]
pub struct Args {
    /// Address to listen on.
    #[arg(long, env = "SHADOWAUTH_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Target network (`testnet` or `mainnet`).
    #[arg(long, env = "SHADOWAUTH_NETWORK", default_value_t = Network::Testnet)]
    pub network: Network,

    /// Runtime endpoint on testnet.
    #[arg(long, env = "ROFL_TESTNET_ENDPOINT", default_value = DEFAULT_RUNTIME_TESTNET_ENDPOINT)]
    pub rofl_testnet_endpoint: String,

    /// Runtime endpoint on mainnet.
    #[arg(long, env = "ROFL_MAINNET_ENDPOINT", default_value = DEFAULT_RUNTIME_MAINNET_ENDPOINT)]
    pub rofl_mainnet_endpoint: String,

    /// Runtime API key. Without it the mock runtime is used.
    #[arg(long, env = "ROFL_API_KEY", hide_env_values = true)]
    pub rofl_api_key: Option<String>,

    /// World ID application id.
    #[arg(long, env = "WLD_APP_ID")]
    pub wld_app_id: Option<String>,

    /// World ID action id.
    #[arg(long, env = "WLD_ACTION_ID")]
    pub wld_action_id: Option<String>,

    /// World ID developer portal base URL.
    #[arg(long, env = "WORLD_ID_BASE_URL", default_value = DEFAULT_WORLD_ID_BASE_URL)]
    pub world_id_base_url: String,

    /// Session contract address. Defaults to the deployment on `network`.
    #[arg(long, env = "SAPPHIRE_CONTRACT_ADDRESS")]
    pub sapphire_contract_address: Option<Address>,

    /// Sapphire JSON-RPC URL. Defaults to the public endpoint of `network`.
    #[arg(long, env = "SAPPHIRE_RPC_URL")]
    pub sapphire_rpc_url: Option<String>,

    /// Node-managed account contract transactions are sent from.
    #[arg(long, env = "SAPPHIRE_SENDER")]
    pub sapphire_sender: Option<Address>,

    /// Send contract calls instead of stubbing them.
    #[arg(long, env = "CONTRACT_WRITES_ENABLED")]
    pub contract_writes_enabled: bool,

    /// Session lifetime in seconds.
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = 24 * 60 * 60)]
    pub session_ttl_secs: u64,

    /// Timeout of upstream requests in seconds.
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Capacity of the analytics queue.
    #[arg(long, env = "ANALYTICS_CAPACITY", default_value_t = DEFAULT_ANALYTICS_CAPACITY)]
    pub analytics_capacity: usize,

    /// Runtime health polling interval in seconds.
    #[arg(long, env = "HEALTH_INTERVAL_SECS", default_value_t = 30)]
    pub health_interval_secs: u64,

    /// Fallback cache sweep interval in seconds.
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,
}

impl Args {
    /// Converts the arguments into the core configuration. Empty strings count as unset.
    #[must_use]
    pub fn to_config(&self) -> ShadowAuthConfig {
        ShadowAuthConfig {
            network: self.network,
            runtime_testnet_endpoint: self.rofl_testnet_endpoint.clone(),
            runtime_mainnet_endpoint: self.rofl_mainnet_endpoint.clone(),
            runtime_api_key: non_empty(self.rofl_api_key.as_deref()).map(SecretString::from),
            world_id_base_url: self.world_id_base_url.clone(),
            world_id_app_id: non_empty(self.wld_app_id.as_deref()),
            world_id_action: non_empty(self.wld_action_id.as_deref()),
            contract_address: self.sapphire_contract_address,
            rpc_url: non_empty(self.sapphire_rpc_url.as_deref()),
            contract_sender: self.sapphire_sender,
            contract_writes_enabled: self.contract_writes_enabled,
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            request_timeout: Duration::from_secs(self.upstream_timeout_secs),
            analytics_capacity: self.analytics_capacity,
            health_interval: Duration::from_secs(self.health_interval_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_select_mock_runtime_on_testnet() {
        let args = Args::try_parse_from(["shadowauth"]).unwrap();
        let config = args.to_config();
        assert_eq!(config.network, Network::Testnet);
        assert!(config.is_mock_runtime());
        assert!(!config.contract_writes_enabled);
        assert_eq!(config.session_ttl, Duration::from_secs(86_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_are_mapped() {
        let args = Args::try_parse_from([
            "shadowauth",
            "--network",
            "mainnet",
            "--rofl-api-key",
            "secret",
            "--wld-app-id",
            "app_staging_123",
            "--wld-action-id",
            "login",
            "--sapphire-sender",
            "0x5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e5e",
            "--contract-writes-enabled",
        ])
        .unwrap();
        let config = args.to_config();
        assert_eq!(config.network, Network::Mainnet);
        assert!(!config.is_mock_runtime());
        assert_eq!(config.world_id_app_id.as_deref(), Some("app_staging_123"));
        assert_eq!(config.contract_sender, Some(Address::repeat_byte(0x5e)));
        assert!(config.contract_writes_enabled);
        assert_eq!(config.rpc_url(), "https://sapphire.oasis.io");
    }

    #[test]
    fn test_empty_api_key_is_unset() {
        let args = Args::try_parse_from(["shadowauth", "--rofl-api-key", ""]).unwrap();
        assert!(args.to_config().is_mock_runtime());
    }

    #[test]
    fn test_rejects_unknown_network() {
        assert!(Args::try_parse_from(["shadowauth", "--network", "devnet"]).is_err());
    }
}
