//! Client for the confidential `SessionKeyManager` contract on Oasis Sapphire.
//!
//! The contract surface is fixed:
//!
//! ```text
//! createSession(string appId, bytes32 sessionKey, uint256 validUntil, bytes32 nullifierHash) -> bool
//! verifySession(bytes32 sessionKey) -> (bool isValid, string appId, uint256 validUntil)
//! revokeSession(bytes32 sessionKey) -> bool
//! ```
//!
//! Whether calls actually reach the chain is a capability flag (`contract_writes_enabled`).
//! While it is off, writes are logged and reported as successful and reads return the default
//! (invalid) status. Callers see the same interface either way.
//!
//! Every failure is non-fatal: it is logged and reported as a negative result.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    error::ShadowAuthError,
    http_request::Request,
    utils::{now_millis, redact},
    SessionKey,
};

mod abi {
    alloy_sol_types::sol! {
        interface ISessionKeyManager {
            function createSession(string appId, bytes32 sessionKey, uint256 validUntil, bytes32 nullifierHash) external returns (bool);
            function verifySession(bytes32 sessionKey) external view returns (bool isValid, string appId, uint256 validUntil);
            function revokeSession(bytes32 sessionKey) external returns (bool);
        }
    }
}

use abi::ISessionKeyManager;

/// Contract view of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractSessionStatus {
    /// Whether the contract considers the session valid.
    pub is_valid: bool,
    /// Application the session belongs to, empty when unknown.
    pub app_id: String,
    /// Expiry in unix milliseconds.
    pub valid_until: u64,
}

impl ContractSessionStatus {
    /// The contract result counts as an acceptance only with a non-empty application id.
    #[must_use]
    pub fn accepted_app_id(&self) -> Option<&str> {
        (self.is_valid && !self.app_id.is_empty()).then_some(self.app_id.as_str())
    }
}

/// Raw access to the chain. Split out so tests and alternative signers can stand in.
#[async_trait]
pub trait ContractTransport: Send + Sync {
    /// Executes a read-only call and returns the raw return data.
    ///
    /// # Errors
    /// Transport or node errors.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ShadowAuthError>;

    /// Submits a state-changing call and returns the transaction hash.
    ///
    /// # Errors
    /// Transport or node errors.
    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<B256, ShadowAuthError>;
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Ethereum JSON-RPC transport (`eth_call` / `eth_sendTransaction`).
///
/// Transactions are sent from `sender`, an account managed by the node.
#[derive(Debug)]
pub struct JsonRpcTransport {
    rpc_url: String,
    sender: Option<Address>,
    request: Request,
}

impl JsonRpcTransport {
    /// Creates a transport for `rpc_url`.
    #[must_use]
    pub fn new(rpc_url: impl Into<String>, sender: Option<Address>, timeout: Duration) -> Self {
        let rpc_url = rpc_url.into();
        let require_https = rpc_url.starts_with("https");
        Self {
            rpc_url,
            sender,
            request: Request::new(timeout, require_https),
        }
    }

    async fn rpc(
        &self,
        method: &str,
        params: Value,
        idempotent: bool,
    ) -> Result<Value, ShadowAuthError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let builder = self.request.post(&self.rpc_url).json(&body);
        let response = if idempotent {
            self.request.handle_idempotent(builder).await?
        } else {
            self.request.handle(builder).await?
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ShadowAuthError::UpstreamUnavailable {
                url: self.rpc_url.clone(),
                status: Some(status.as_u16()),
                error: format!("{method} failed"),
            });
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ShadowAuthError::Serialization(e.to_string()))?;
        if let Some(error) = response.error {
            return Err(ShadowAuthError::UpstreamUnavailable {
                url: self.rpc_url.clone(),
                status: Some(status.as_u16()),
                error: format!("{method} error {}: {}", error.code, error.message),
            });
        }
        response
            .result
            .ok_or_else(|| ShadowAuthError::Serialization(format!("{method}: missing result")))
    }
}

#[async_trait]
impl ContractTransport for JsonRpcTransport {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ShadowAuthError> {
        let result = self
            .rpc("eth_call", json!([{ "to": to, "data": data }, "latest"]), true)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn send_transaction(&self, to: Address, data: Bytes) -> Result<B256, ShadowAuthError> {
        let from = self.sender.ok_or_else(|| ShadowAuthError::Configuration {
            attribute: "contract_sender".to_string(),
            reason: "a sender account is required to send transactions".to_string(),
        })?;
        let result = self
            .rpc(
                "eth_sendTransaction",
                json!([{ "from": from, "to": to, "data": data }]),
                false,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}

/// Reads and writes session records on the confidential contract.
pub struct ContractSessionClient {
    address: Address,
    writes_enabled: bool,
    transport: Arc<dyn ContractTransport>,
}

impl std::fmt::Debug for ContractSessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractSessionClient")
            .field("address", &self.address)
            .field("writes_enabled", &self.writes_enabled)
            .finish_non_exhaustive()
    }
}

impl ContractSessionClient {
    /// Creates a client for the contract at `address`.
    #[must_use]
    pub fn new(
        address: Address,
        writes_enabled: bool,
        transport: Arc<dyn ContractTransport>,
    ) -> Self {
        Self {
            address,
            writes_enabled,
            transport,
        }
    }

    /// Whether calls reach the chain.
    #[must_use]
    pub const fn writes_enabled(&self) -> bool {
        self.writes_enabled
    }

    /// Stores a session. Returns whether the contract accepted it.
    pub async fn create_session(
        &self,
        app_id: &str,
        session_key: &SessionKey,
        valid_until: u64,
        nullifier_hash: &str,
    ) -> bool {
        info!(
            contract = %self.address,
            %app_id,
            session_key = %redact(&session_key.to_hex()),
            valid_until,
            nullifier_hash = %redact(nullifier_hash),
            "contract: storing session"
        );
        if !self.writes_enabled {
            debug!("contract: writes disabled, createSession not sent");
            return true;
        }

        let Some(nullifier_hash) = parse_bytes32(nullifier_hash) else {
            warn!("contract: nullifier hash is not a bytes32 value");
            return false;
        };
        let call = ISessionKeyManager::createSessionCall {
            appId: app_id.to_string(),
            sessionKey: *session_key.as_b256(),
            validUntil: U256::from(valid_until),
            nullifierHash: nullifier_hash,
        };
        self.send("createSession", call.abi_encode()).await
    }

    /// Reads a session. Any failure yields the default (invalid) status.
    pub async fn verify_session(&self, session_key: &SessionKey) -> ContractSessionStatus {
        debug!(
            contract = %self.address,
            session_key = %redact(&session_key.to_hex()),
            "contract: verifying session"
        );
        if !self.writes_enabled {
            return ContractSessionStatus::default();
        }

        let call = ISessionKeyManager::verifySessionCall {
            sessionKey: *session_key.as_b256(),
        };
        let data = match self.transport.call(self.address, call.abi_encode().into()).await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, "contract: verifySession failed");
                return ContractSessionStatus::default();
            }
        };
        match ISessionKeyManager::verifySessionCall::abi_decode_returns(&data) {
            Ok(ret) => ContractSessionStatus {
                is_valid: ret.isValid,
                app_id: ret.appId,
                valid_until: ret.validUntil.saturating_to(),
            },
            Err(e) => {
                warn!(error = %e, "contract: undecodable verifySession result");
                ContractSessionStatus::default()
            }
        }
    }

    /// Revokes a session. Returns whether the contract accepted the revocation.
    pub async fn revoke_session(&self, session_key: &SessionKey) -> bool {
        info!(
            contract = %self.address,
            session_key = %redact(&session_key.to_hex()),
            "contract: revoking session"
        );
        if !self.writes_enabled {
            debug!("contract: writes disabled, revokeSession not sent");
            return true;
        }

        let call = ISessionKeyManager::revokeSessionCall {
            sessionKey: *session_key.as_b256(),
        };
        self.send("revokeSession", call.abi_encode()).await
    }

    async fn send(&self, function: &str, data: Vec<u8>) -> bool {
        let started = now_millis();
        match self.transport.send_transaction(self.address, data.into()).await {
            Ok(tx_hash) => {
                info!(%function, %tx_hash, elapsed_ms = now_millis().saturating_sub(started), "contract: transaction sent");
                true
            }
            Err(e) => {
                warn!(%function, error = %e, "contract: transaction failed");
                false
            }
        }
    }
}

/// Parses a `0x`-prefixed hex value of up to 32 bytes, left padded.
fn parse_bytes32(value: &str) -> Option<B256> {
    if let Ok(exact) = B256::from_str(value) {
        return Some(exact);
    }
    let digits = value.strip_prefix("0x").unwrap_or(value);
    U256::from_str_radix(digits, 16).ok().map(B256::from)
}
