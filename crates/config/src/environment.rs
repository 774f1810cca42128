//! One-time resolution of the cluster under test.
//!
//! The CI parameters are inspected here and nowhere else; everything
//! downstream receives the resulting [`ConnectionProfile`].

use crate::env::HarnessEnv;
use backup_harness_domain::{
    CLOUD_PORT, ConnectionProfile, DEFAULT_PASSWORD, DEFAULT_TLS_NAME, DEFAULT_USER,
    DOCKER_HOST_ADDRESS, Environment, LOCAL_PORT, SecretAgentEndpoint, TlsSettings,
};
use backup_harness_shared::SecretString;

const CLOUD_TRIGGER: &str = "GCP";
const DEFAULT_SECRET_AGENT_PORT: u16 = 3005;

/// Decide which environment the parameters describe.
#[must_use]
pub fn resolve_environment(env: &HarnessEnv) -> Environment {
    if env
        .qa_environment
        .as_deref()
        .is_some_and(|value| value.eq_ignore_ascii_case(CLOUD_TRIGGER))
    {
        Environment::Cloud
    } else if env.local_multi_node == Some(true) {
        Environment::LocalMultiNode
    } else {
        Environment::Local
    }
}

/// Build the connection profile for the resolved environment.
#[must_use]
pub fn resolve_connection_profile(env: &HarnessEnv) -> ConnectionProfile {
    let environment = resolve_environment(env);
    let ca_file = env.ca_pem_path.as_deref().unwrap_or_default().to_string();
    let tls = |enabled: bool| {
        enabled.then(|| TlsSettings {
            name: DEFAULT_TLS_NAME.to_string(),
            ca_file: ca_file.clone(),
        })
    };

    let (host, port, tls) = match environment {
        Environment::Cloud => (
            format!(
                "asd.{}.ecosys.internal",
                env.workspace.as_deref().unwrap_or_default()
            ),
            CLOUD_PORT,
            tls(true),
        ),
        Environment::LocalMultiNode => (
            env.asdb_ip.as_deref().unwrap_or("localhost").to_string(),
            env.asdb_port.unwrap_or(LOCAL_PORT),
            tls(env.local_tls_enabled == Some(true)),
        ),
        Environment::Local => (
            env.aerospike_source_ip
                .as_deref()
                .unwrap_or("localhost")
                .to_string(),
            LOCAL_PORT,
            tls(env.tls_enabled == Some(true)),
        ),
    };

    let local_address = match environment {
        Environment::LocalMultiNode | Environment::Cloud => env
            .local_slave_gateway
            .as_deref()
            .unwrap_or(DOCKER_HOST_ADDRESS),
        Environment::Local => DOCKER_HOST_ADDRESS,
    }
    .to_string();

    let secret_agent = env.secret_agent_ip.as_deref().map(|address| SecretAgentEndpoint {
        address: address.trim_start_matches("http://").to_string(),
        port: env.secret_agent_port.unwrap_or(DEFAULT_SECRET_AGENT_PORT),
    });

    ConnectionProfile {
        environment,
        host,
        port,
        tls,
        user: env.asdb_user.as_deref().unwrap_or(DEFAULT_USER).to_string(),
        password: env
            .asdb_password
            .clone()
            .unwrap_or_else(|| SecretString::from(DEFAULT_PASSWORD)),
        local_address,
        secret_agent,
        gcp_key_path: env.gcp_sa_key_file.as_deref().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_single_local_node() {
        let profile = resolve_connection_profile(&HarnessEnv::default());
        assert_eq!(profile, ConnectionProfile::local());
    }

    #[test]
    fn gcp_selects_cloud_over_multi_node() {
        let env = HarnessEnv {
            qa_environment: Some("GCP".into()),
            workspace: Some("qa7".into()),
            local_multi_node: Some(true),
            ca_pem_path: Some("/certs/ca.pem".into()),
            local_slave_gateway: Some("10.1.0.1".into()),
            ..HarnessEnv::default()
        };
        let profile = resolve_connection_profile(&env);
        assert_eq!(profile.environment, Environment::Cloud);
        assert_eq!(profile.host, "asd.qa7.ecosys.internal");
        assert_eq!(profile.port, 4333);
        assert_eq!(profile.tls_ca_file(), Some("/certs/ca.pem"));
        assert_eq!(profile.local_address, "10.1.0.1");
        assert_eq!(profile.host_spec(), "asd.qa7.ecosys.internal:asd.aerospike.com:4333");
    }

    #[test]
    fn multi_node_uses_explicit_host_and_optional_tls() {
        let env = HarnessEnv {
            local_multi_node: Some(true),
            asdb_ip: Some("172.17.0.3".into()),
            asdb_port: Some(3100),
            ..HarnessEnv::default()
        };
        let profile = resolve_connection_profile(&env);
        assert_eq!(profile.environment, Environment::LocalMultiNode);
        assert_eq!(profile.host_spec(), "172.17.0.3:asd.aerospike.com:3100");
        assert!(!profile.tls_enabled());
        assert_eq!(profile.local_address, DOCKER_HOST_ADDRESS);

        let tls_env = HarnessEnv {
            local_tls_enabled: Some(true),
            ..env
        };
        assert!(resolve_connection_profile(&tls_env).tls_enabled());
    }

    #[test]
    fn secret_agent_scheme_is_stripped() {
        let env = HarnessEnv {
            secret_agent_ip: Some("http://10.0.0.9".into()),
            secret_agent_port: Some(3006),
            asdb_password: Some(SecretString::from("hunter2")),
            ..HarnessEnv::default()
        };
        let profile = resolve_connection_profile(&env);
        assert_eq!(
            profile.secret_agent,
            Some(SecretAgentEndpoint {
                address: "10.0.0.9".to_string(),
                port: 3006,
            })
        );
        assert_eq!(profile.password.expose(), "hunter2");
    }
}
