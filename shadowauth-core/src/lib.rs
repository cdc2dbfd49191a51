//! `shadowauth-core` issues and verifies short-lived anonymous session keys for users who
//! already proved their personhood with World ID.
//!
//! A session is written best-effort to up to three independent stores:
//!
//! 1. the off-chain runtime ([`runtime::RuntimeVerifier`]), which is also the gate for proof
//!    acceptance,
//! 2. the confidential session contract ([`contract::ContractSessionClient`]),
//! 3. the process-local fallback cache ([`cache::SessionCache`]).
//!
//! Replication between the stores is not transactional. [`SessionCoordinator`] reconciles
//! them on verification in a fixed priority order (runtime, contract, fallback) and the first
//! valid hit wins.
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Network the runtime and the contract are deployed on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Oasis Sapphire testnet and the testnet runtime.
    #[default]
    Testnet,
    /// Oasis Sapphire mainnet and the production runtime.
    Mainnet,
}

pub mod analytics;
pub mod cache;
pub mod config;
pub mod contract;
pub mod health;
pub mod identity;
pub mod runtime;

mod coordinator;
pub use coordinator::*;

mod error;
pub use error::*;

mod session;
pub use session::*;

mod session_key;
pub use session_key::*;

// private modules
mod http_request;
mod utils;
