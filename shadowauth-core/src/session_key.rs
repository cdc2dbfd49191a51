use std::fmt;
use std::str::FromStr;

use alloy_primitives::B256;
use rand::{rngs::OsRng, RngCore};

use crate::error::ShadowAuthError;

/// Prefix of the textual form of session keys and transaction hashes.
pub const HEX_PREFIX: &str = "0x";

/// An opaque 256-bit bearer credential.
///
/// The textual form is `0x` followed by 64 lowercase hex characters. The same 32 bytes are the
/// `bytes32` key of the confidential contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionKey(B256);

impl SessionKey {
    /// Draws a fresh session key from the operating system CSPRNG.
    ///
    /// # Errors
    /// Returns [`ShadowAuthError::Entropy`] if the entropy source fails. Callers must not fall
    /// back to a weaker source.
    pub fn generate() -> Result<Self, ShadowAuthError> {
        random_bytes32().map(Self)
    }

    /// Returns the raw 32 bytes.
    #[must_use]
    pub const fn as_b256(&self) -> &B256 {
        &self.0
    }

    /// Returns the `0x`-prefixed lowercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        format!("{HEX_PREFIX}{}", hex::encode(self.0))
    }
}

impl From<B256> for SessionKey {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Never print the full bearer value in debug output.
impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey({})", crate::utils::redact(&self.to_hex()))
    }
}

impl FromStr for SessionKey {
    type Err = ShadowAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix(HEX_PREFIX).ok_or_else(|| {
            ShadowAuthError::InvalidRequest("session key must be 0x-prefixed".to_string())
        })?;
        if digits.len() != 64 {
            return Err(ShadowAuthError::InvalidRequest(
                "session key must be 32 bytes".to_string(),
            ));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| {
            ShadowAuthError::InvalidRequest("session key is not valid hex".to_string())
        })?;
        Ok(Self(B256::from(bytes)))
    }
}

/// Synthesizes a pseudo transaction hash (`0x` + 64 hex characters) for the mock runtime.
///
/// # Errors
/// Returns [`ShadowAuthError::Entropy`] if the entropy source fails.
pub fn mock_tx_hash() -> Result<String, ShadowAuthError> {
    let bytes = random_bytes32()?;
    Ok(format!("{HEX_PREFIX}{}", hex::encode(bytes)))
}

fn random_bytes32() -> Result<B256, ShadowAuthError> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ShadowAuthError::Entropy(e.to_string()))?;
    Ok(B256::from(bytes))
}
