//! Common test utilities shared across integration tests.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::Address;
use async_trait::async_trait;
use shadowauth_core::{
    analytics::AnalyticsDispatcher,
    cache::MemorySessionCache,
    contract::{ContractSessionClient, JsonRpcTransport},
    identity::{IdentityProofVerifier, IdentityVerification, VerificationLevel, ZkProof},
    runtime::RuntimeVerifier,
    SessionCoordinator,
};

/// Accepts every proof and confirms its nullifier, as the World ID cloud service would for a
/// valid proof.
#[allow(dead_code)]
pub struct AcceptingIdentity;

#[async_trait]
impl IdentityProofVerifier for AcceptingIdentity {
    async fn verify(&self, proof: &ZkProof) -> IdentityVerification {
        IdentityVerification::Verified {
            nullifier_hash: proof.nullifier_hash.clone(),
        }
    }
}

/// Routes core logs to the test output.
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("shadowauth_core=debug")
        .with_test_writer()
        .try_init();
}

/// Milliseconds since the unix epoch.
#[allow(dead_code)]
pub fn now_millis() -> u64 {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
    u64::try_from(elapsed.as_millis()).unwrap()
}

/// A complete orb-level proof.
#[allow(dead_code)]
pub fn orb_proof() -> ZkProof {
    ZkProof {
        merkle_root: "0x1f38b57f3bdf96f05ea62fa68814871bf0ca8ce4dbe073d8497d5a6b0a53e5e0"
            .to_string(),
        nullifier_hash: "0x2bf8406809dcefb1a3a04c3b1d8d8a1ff9bb9e1aeb0a1a1a1a1a1a1a1a1a1a1a"
            .to_string(),
        proof: "0x0a1b2c3d".to_string(),
        verification_level: VerificationLevel::Orb,
        signal: None,
    }
}

/// Builds a coordinator around `runtime`. The contract is reached through `rpc_url` when
/// given, otherwise contract writes are disabled.
#[allow(dead_code)]
pub fn coordinator(
    runtime: Arc<dyn RuntimeVerifier>,
    rpc_url: Option<&str>,
    cache: Arc<MemorySessionCache>,
) -> SessionCoordinator {
    let contract = ContractSessionClient::new(
        Address::repeat_byte(0x0c),
        rpc_url.is_some(),
        Arc::new(JsonRpcTransport::new(
            rpc_url.unwrap_or("http://127.0.0.1:1"),
            Some(Address::repeat_byte(0x5e)),
            Duration::from_secs(2),
        )),
    );
    let (analytics, _worker) = AnalyticsDispatcher::spawn(runtime.clone(), 64);
    SessionCoordinator::new(runtime, Arc::new(AcceptingIdentity), contract, cache, analytics)
}
