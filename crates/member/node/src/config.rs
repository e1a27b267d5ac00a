//! Configuration for memberd

use member_flows::FlowConfig;
use member_types::{ModelResult, PartyName};
use serde::{Deserialize, Serialize};

/// Main node configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Parties on the local network
    #[serde(default)]
    pub network: NetworkConfig,

    /// Flow settings shared by every node
    #[serde(default)]
    pub flows: FlowConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Local network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Party this process submits flows as
    #[serde(default = "default_local_party")]
    pub local_party: String,

    /// Every party to start a node for
    #[serde(default = "default_parties")]
    pub parties: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            local_party: default_local_party(),
            parties: default_parties(),
        }
    }
}

impl NetworkConfig {
    /// Party names to start, local party first. Spellings of the same name
    /// (`OrgA` and `O=OrgA`) count as one party.
    pub fn party_names(&self) -> ModelResult<Vec<PartyName>> {
        let mut names: Vec<PartyName> = vec![self.local_party.parse()?];
        for party in &self.parties {
            let name: PartyName = party.parse()?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers

fn default_local_party() -> String {
    "O=PartyA, L=London, C=GB".to_string()
}

fn default_parties() -> Vec<String> {
    vec![
        "O=PartyA, L=London, C=GB".to_string(),
        "O=PartyB, L=New York, C=US".to_string(),
        "O=PartyC, L=Paris, C=FR".to_string(),
    ]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Load configuration from defaults, an optional file, then `MEMBER__*`
    /// environment variables (e.g. `MEMBER__FLOWS__AUTHORISED_ISSUER`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&NodeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MEMBER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.network.local_party, "O=PartyA, L=London, C=GB");
        assert_eq!(config.network.parties.len(), 3);
        assert_eq!(config.flows.authorised_issuer, "PartyA");
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_party_names_put_local_first() {
        let network = NetworkConfig {
            local_party: "OrgA-Creator".to_string(),
            parties: vec!["OrgB-Viewer".to_string(), "OrgA-Creator".to_string()],
        };
        let names: Vec<String> = network
            .party_names()
            .unwrap()
            .iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, vec!["O=OrgA-Creator", "O=OrgB-Viewer"]);
    }

    #[test]
    fn test_party_names_merge_spellings_of_one_name() {
        let network = NetworkConfig {
            local_party: "OrgA-Creator".to_string(),
            parties: vec![
                "O=OrgA-Creator".to_string(),
                " O=OrgB-Viewer, L=Leeds ".to_string(),
                "O=OrgB-Viewer,L=Leeds".to_string(),
            ],
        };
        assert_eq!(network.party_names().unwrap().len(), 2);
    }

    #[test]
    fn test_party_names_reject_malformed_entries() {
        let network = NetworkConfig {
            local_party: "O=PartyA".to_string(),
            parties: vec!["L=London".to_string()],
        };
        assert!(network.party_names().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = NodeConfig::load(None).unwrap();
        assert_eq!(config.flows.session_timeout_secs, 30);
        assert_eq!(config.network.parties, default_parties());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("memberd-test-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[network]
local_party = "OrgA-Creator"
parties = ["OrgA-Creator", "OrgB-Viewer"]

[flows]
authorised_issuer = "OrgA-Creator"
session_timeout_secs = 5

[logging]
json = true
"#
        )
        .unwrap();

        let config = NodeConfig::load(path.to_str()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.network.local_party, "OrgA-Creator");
        assert_eq!(config.network.parties.len(), 2);
        assert_eq!(config.flows.authorised_issuer, "OrgA-Creator");
        assert_eq!(config.flows.session_timeout_secs, 5);
        assert_eq!(config.flows.notary_timeout_secs, 60);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }
}
