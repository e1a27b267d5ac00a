//! Parties and their keys
//!
//! A party is a well-known name bound to the ed25519 key that signs on its
//! behalf. Names follow the X.500 attribute form used across the network
//! (`O=PartyA, L=London, C=GB`). Only the organisation attribute is required.

use crate::{ModelError, ModelResult, TransactionId, TransactionSignature};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// X.500-style party name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartyName {
    organisation: String,
    locality: Option<String>,
    country: Option<String>,
}

impl PartyName {
    pub fn new(organisation: impl Into<String>) -> ModelResult<Self> {
        let organisation = organisation.into();
        if organisation.trim().is_empty() {
            return Err(ModelError::InvalidPartyName {
                name: organisation,
                reason: "organisation cannot be empty".into(),
            });
        }
        Ok(Self {
            organisation: organisation.trim().to_string(),
            locality: None,
            country: None,
        })
    }

    pub fn with_locality(mut self, locality: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn organisation(&self) -> &str {
        &self.organisation
    }

    pub fn locality(&self) -> Option<&str> {
        self.locality.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }
}

impl FromStr for PartyName {
    type Err = ModelError;

    /// Parses `O=PartyA, L=London, C=GB`. A string without any `=` is taken
    /// as a bare organisation name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ModelError::InvalidPartyName {
            name: s.to_string(),
            reason: reason.to_string(),
        };

        if !s.contains('=') {
            return PartyName::new(s);
        }

        let mut organisation = None;
        let mut locality = None;
        let mut country = None;

        for attribute in s.split(',') {
            let (key, value) = attribute
                .split_once('=')
                .ok_or_else(|| invalid("attribute is missing '='"))?;
            let value = value.trim();
            if value.is_empty() {
                return Err(invalid("attribute value cannot be empty"));
            }

            let slot = match key.trim() {
                "O" => &mut organisation,
                "L" => &mut locality,
                "C" => &mut country,
                _ => return Err(invalid("unsupported attribute")),
            };
            if slot.is_some() {
                return Err(invalid("duplicate attribute"));
            }
            *slot = Some(value.to_string());
        }

        Ok(Self {
            organisation: organisation.ok_or_else(|| invalid("organisation (O) is required"))?,
            locality,
            country,
        })
    }
}

impl TryFrom<String> for PartyName {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartyName> for String {
    fn from(value: PartyName) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PartyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O={}", self.organisation)?;
        if let Some(locality) = &self.locality {
            write!(f, ", L={}", locality)?;
        }
        if let Some(country) = &self.country {
            write!(f, ", C={}", country)?;
        }
        Ok(())
    }
}

/// Public half of a party's ed25519 signing key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartyKey(pub [u8; 32]);

impl PartyKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_verifying_key(&self) -> ModelResult<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| ModelError::InvalidKey(e.to_string()))
    }
}

impl From<&VerifyingKey> for PartyKey {
    fn from(key: &VerifyingKey) -> Self {
        Self(key.to_bytes())
    }
}

impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKey({})", self)
    }
}

/// A well-known party: a name bound to its owning key
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub name: PartyName,
    pub owning_key: PartyKey,
}

impl Party {
    pub fn new(name: PartyName, owning_key: PartyKey) -> Self {
        Self { name, owning_key }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Private signing material of a node
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS random source.
    pub fn generate() -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        Self::from_seed(secret)
    }

    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn public_key(&self) -> PartyKey {
        PartyKey::from(&self.signing_key.verifying_key())
    }

    /// Sign a transaction id.
    pub fn sign(&self, id: &TransactionId) -> TransactionSignature {
        let signature = self.signing_key.sign(id.as_bytes());
        TransactionSignature {
            by: self.public_key(),
            signature,
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
