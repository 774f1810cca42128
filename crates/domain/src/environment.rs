//! Target cluster environment and the connection profile derived from it.

use backup_harness_shared::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TLS name presented by the database nodes.
pub const DEFAULT_TLS_NAME: &str = "asd.aerospike.com";
/// Address the containers use to reach the host machine.
pub const DOCKER_HOST_ADDRESS: &str = "host.docker.internal";
/// Default database user.
pub const DEFAULT_USER: &str = "tester";
/// Default database password.
pub const DEFAULT_PASSWORD: &str = "psw";
/// Plain-text service port.
pub const LOCAL_PORT: u16 = 3000;
/// TLS service port used by cloud clusters.
pub const CLOUD_PORT: u16 = 4333;

/// Where the cluster under test runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Single local node (docker compose).
    #[default]
    Local,
    /// Three local nodes addressed through an explicit host.
    LocalMultiNode,
    /// Cloud cluster reached over TLS.
    Cloud,
}

impl Environment {
    /// Stable identifier used in logs and config.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::LocalMultiNode => "local_multi_node",
            Self::Cloud => "cloud",
        }
    }

    /// Service port for this environment when none is configured.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Cloud => CLOUD_PORT,
            Self::Local | Self::LocalMultiNode => LOCAL_PORT,
        }
    }

    /// True when commands must carry an explicit `--host`.
    #[must_use]
    pub const fn needs_explicit_host(self) -> bool {
        matches!(self, Self::LocalMultiNode | Self::Cloud)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Unknown environment identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEnvironment(pub String);

impl fmt::Display for UnknownEnvironment {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "unknown environment `{}`", self.0)
    }
}

impl std::error::Error for UnknownEnvironment {}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local" => Ok(Self::Local),
            "local_multi_node" | "multi_node" | "local3" => Ok(Self::LocalMultiNode),
            "cloud" | "gcp" => Ok(Self::Cloud),
            _ => Err(UnknownEnvironment(value.to_string())),
        }
    }
}

/// TLS parameters for encrypted connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsSettings {
    /// Name the server certificate is issued for.
    pub name: String,
    /// CA bundle used to verify the server.
    pub ca_file: String,
}

/// Secret agent endpoint resolving `secrets:` references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretAgentEndpoint {
    /// Host or IP, without scheme.
    pub address: String,
    /// TCP port.
    pub port: u16,
}

/// Everything a command builder needs to reach the cluster.
///
/// Resolved once at start-up and passed to builders; builders never read the
/// process environment themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    /// Resolved environment.
    pub environment: Environment,
    /// Seed host.
    pub host: String,
    /// Service port.
    pub port: u16,
    /// TLS parameters; `None` for plain-text clusters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSettings>,
    /// Database user.
    pub user: String,
    /// Database password.
    pub password: SecretString,
    /// Address the XDR source uses to reach the local tool.
    pub local_address: String,
    /// Secret agent, when one is deployed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_agent: Option<SecretAgentEndpoint>,
    /// Service account key for GCS targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gcp_key_path: Option<String>,
}

impl ConnectionProfile {
    /// Profile for a single local node with default credentials.
    #[must_use]
    pub fn local() -> Self {
        Self {
            environment: Environment::Local,
            host: "localhost".to_string(),
            port: LOCAL_PORT,
            tls: None,
            user: DEFAULT_USER.to_string(),
            password: SecretString::from(DEFAULT_PASSWORD),
            local_address: DOCKER_HOST_ADDRESS.to_string(),
            secret_agent: None,
            gcp_key_path: None,
        }
    }

    /// `host:tls-name:port`, the form every tool accepts for TLS seeds.
    #[must_use]
    pub fn host_spec(&self) -> String {
        format!("{}:{}:{}", self.host, self.tls_name(), self.port)
    }

    /// TLS name, falling back to the product default.
    #[must_use]
    pub fn tls_name(&self) -> &str {
        self.tls
            .as_ref()
            .map_or(DEFAULT_TLS_NAME, |tls| tls.name.as_str())
    }

    /// CA file when TLS is configured.
    #[must_use]
    pub fn tls_ca_file(&self) -> Option<&str> {
        self.tls.as_ref().map(|tls| tls.ca_file.as_str())
    }

    /// True when the cluster is reached over TLS.
    #[must_use]
    pub const fn tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Connection tail of an `asbench` command.
    ///
    /// TLS clusters get the seed plus `--tls-*` flags, a plain multi-node
    /// cluster only the seed; every form ends with `--port`.
    #[must_use]
    pub fn bench_connection_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(tls) = &self.tls {
            args.push("-h".to_string());
            args.push(self.host_spec());
            args.push(format!("--tls-cafile={}", tls.ca_file));
            args.push(format!("--tls-name={}", tls.name));
            args.push("--tls-enable".to_string());
        } else if self.environment == Environment::LocalMultiNode {
            args.push("-h".to_string());
            args.push(self.host_spec());
        }
        args.push("--port".to_string());
        args.push(self.port.to_string());
        args
    }

    /// Connection and credential arguments of an `asinfo` command.
    #[must_use]
    pub fn info_connection_args(&self) -> Vec<String> {
        let mut args = vec!["-U".to_string(), self.user.clone()];
        args.push("-P".to_string());
        args.push(self.password.expose().to_string());
        match &self.tls {
            Some(tls) => {
                args.push("-h".to_string());
                args.push(self.host_spec());
                args.push(format!("--tls-cafile={}", tls.ca_file));
                args.push("--tls-enable".to_string());
            },
            None => {
                args.push("-h".to_string());
                args.push(self.host.clone());
                args.push("-p".to_string());
                args.push(self.port.to_string());
            },
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports_follow_environment() {
        assert_eq!(Environment::Local.default_port(), 3000);
        assert_eq!(Environment::LocalMultiNode.default_port(), 3000);
        assert_eq!(Environment::Cloud.default_port(), 4333);
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("GCP".parse(), Ok(Environment::Cloud));
        assert_eq!("local-multi-node".parse(), Ok(Environment::LocalMultiNode));
        assert_eq!(" local ".parse(), Ok(Environment::Local));
        assert!("mars".parse::<Environment>().is_err());
    }

    #[test]
    fn host_spec_uses_tls_name() {
        let mut profile = ConnectionProfile::local();
        profile.host = "10.0.0.5".to_string();
        assert_eq!(profile.host_spec(), "10.0.0.5:asd.aerospike.com:3000");

        profile.tls = Some(TlsSettings {
            name: "db.internal".to_string(),
            ca_file: "/certs/ca.pem".to_string(),
        });
        assert_eq!(profile.host_spec(), "10.0.0.5:db.internal:3000");
        assert_eq!(profile.tls_ca_file(), Some("/certs/ca.pem"));
    }

    #[test]
    fn bench_tail_follows_environment() {
        let local = ConnectionProfile::local();
        assert_eq!(local.bench_connection_args(), vec!["--port", "3000"]);

        let multi = ConnectionProfile {
            environment: Environment::LocalMultiNode,
            host: "172.17.0.2".to_string(),
            ..ConnectionProfile::local()
        };
        assert_eq!(
            multi.bench_connection_args(),
            vec!["-h", "172.17.0.2:asd.aerospike.com:3000", "--port", "3000"]
        );

        let cloud = ConnectionProfile {
            environment: Environment::Cloud,
            host: "asd.qa.ecosys.internal".to_string(),
            port: CLOUD_PORT,
            tls: Some(TlsSettings {
                name: DEFAULT_TLS_NAME.to_string(),
                ca_file: "/ca.pem".to_string(),
            }),
            ..ConnectionProfile::local()
        };
        assert_eq!(
            cloud.bench_connection_args().join(" "),
            "-h asd.qa.ecosys.internal:asd.aerospike.com:4333 --tls-cafile=/ca.pem \
             --tls-name=asd.aerospike.com --tls-enable --port 4333"
        );
        assert!(cloud.info_connection_args().contains(&"--tls-enable".to_string()));
    }

    #[test]
    fn password_is_redacted_when_serialized() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(ConnectionProfile::local())?;
        assert_eq!(json["password"], "[REDACTED]");
        assert_eq!(json["environment"], "local");
        assert!(json.get("tls").is_none());
        Ok(())
    }
}
