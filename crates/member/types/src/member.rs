//! The Member record and its submission payload

use crate::{ModelError, Party, PartyKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable identity shared by every version of the same logical member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinearId(pub Uuid);

impl LinearId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for LinearId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| ModelError::InvalidLinearId(format!("{}: {}", s, e)))
    }
}

impl fmt::Display for LinearId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One immutable version of a member record.
///
/// Editing never mutates a `Member`; it consumes the current version and
/// produces a new value carrying the same `linear_id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub creator: Party,
    pub viewer: Party,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer: Option<Party>,
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub linear_id: LinearId,
}

impl Member {
    /// Parties that must sign any transition touching this version.
    pub fn participants(&self) -> [&Party; 2] {
        [&self.creator, &self.viewer]
    }

    pub fn participant_keys(&self) -> BTreeSet<PartyKey> {
        self.participants()
            .iter()
            .map(|party| party.owning_key)
            .collect()
    }

    /// Feed a canonical encoding of this version into `hasher`.
    pub(crate) fn digest_into(&self, hasher: &mut blake3::Hasher) {
        digest_party(hasher, &self.creator);
        digest_party(hasher, &self.viewer);
        match &self.observer {
            Some(observer) => {
                hasher.update(&[1]);
                digest_party(hasher, observer);
            }
            None => {
                hasher.update(&[0]);
            }
        }
        digest_str(hasher, &self.title);
        digest_str(hasher, &self.first_name);
        digest_str(hasher, &self.last_name);
        hasher.update(self.linear_id.0.as_bytes());
    }
}

fn digest_party(hasher: &mut blake3::Hasher, party: &Party) {
    digest_str(hasher, &party.name.to_string());
    hasher.update(party.owning_key.as_bytes());
}

pub(crate) fn digest_str(hasher: &mut blake3::Hasher, value: &str) {
    hasher.update(&(value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Caller-supplied payload for issuing or editing a member.
///
/// The creator is never part of the payload: it is always the submitting
/// node's own identity. Every field is optional on the wire; the flows decide
/// which ones are required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl MemberModel {
    pub fn new(
        viewer: impl Into<String>,
        title: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            linear_id: None,
            viewer: Some(viewer.into()),
            observer: None,
            title: Some(title.into()),
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
        }
    }

    pub fn with_linear_id(mut self, linear_id: impl ToString) -> Self {
        self.linear_id = Some(linear_id.to_string());
        self
    }

    pub fn with_observer(mut self, observer: impl Into<String>) -> Self {
        self.observer = Some(observer.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyPair, PartyName};

    fn party(org: &str, seed: u8) -> Party {
        Party::new(
            PartyName::new(org).unwrap(),
            KeyPair::from_seed([seed; 32]).public_key(),
        )
    }

    #[test]
    fn participants_are_creator_and_viewer() {
        let member = Member {
            creator: party("PartyA", 1),
            viewer: party("PartyB", 2),
            observer: Some(party("PartyC", 3)),
            title: "Mr".into(),
            first_name: "John".into(),
            last_name: "Smith".into(),
            linear_id: LinearId::generate(),
        };

        let keys = member.participant_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&member.creator.owning_key));
        assert!(keys.contains(&member.viewer.owning_key));
        assert!(!keys.contains(&member.observer.as_ref().unwrap().owning_key));
    }

    #[test]
    fn linear_id_parse_round_trips() {
        let id = LinearId::generate();
        let parsed: LinearId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<LinearId>().is_err());
    }

    #[test]
    fn model_uses_camel_case_json() {
        let model = MemberModel::new("O=PartyB", "Ms", "Jane", "Doe");
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["firstName"], "Jane");
        assert_eq!(json["lastName"], "Doe");
        assert!(json.get("observer").is_none());

        let parsed: MemberModel =
            serde_json::from_str(r#"{"viewer":"O=PartyB","title":"Ms","unknown":1}"#).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("Ms"));
        assert!(parsed.first_name.is_none());
    }
}
