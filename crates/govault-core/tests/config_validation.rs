//! Configuration validation rules.

use govault_core::{validate_config, ConfigError, GovaultConfig, SUPPORTED_VERSION};
use govault_store::ObjectStoreConfig;

fn valid() -> GovaultConfig {
    GovaultConfig::local("/srv/govault/storage", "/srv/govault/governance")
}

#[test]
fn supported_version_is_0_5() {
    assert_eq!(SUPPORTED_VERSION, "0.5");
    assert!(validate_config(&valid()).is_valid());
}

#[test]
fn other_version_is_unsupported() {
    for version in ["0.4", "0.6", "", "v0.5"] {
        let mut config = valid();
        config.version = version.to_string();
        let validation = validate_config(&config);
        assert!(!validation.is_valid());
        let err = validation.into_result().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { .. }));
        assert!(err.to_string().contains("Unsupported version"), "{err}");
    }
}

#[test]
fn approval_limit_must_be_positive() {
    for limit in [0, -1, i64::MIN] {
        let mut config = valid();
        config.approval.max_approvals_per_hour = limit;
        let validation = validate_config(&config);
        assert_eq!(validation.errors.len(), 1);
        assert!(validation
            .to_string()
            .contains("approval.max_approvals_per_hour"));
    }
}

#[test]
fn daily_limit_checked_when_present() {
    let mut config = valid();
    config.approval.max_approvals_per_day = Some(0);
    assert!(!validate_config(&config).is_valid());

    config.approval.max_approvals_per_day = Some(100);
    assert!(validate_config(&config).is_valid());
}

#[test]
fn backend_ids_must_resolve_to_sections() {
    let mut config = valid();
    config.storage.backup = vec!["object-store".to_string()];
    let validation = validate_config(&config);
    assert!(validation.to_string().contains("object_store"), "{validation}");

    config.storage.object_store = Some(ObjectStoreConfig {
        endpoint: "https://objects.example.org".to_string(),
        bucket: "governance".to_string(),
        prefix: String::new(),
        token: None,
        request_timeout_ms: 1_000,
    });
    assert!(validate_config(&config).is_valid());
}

#[test]
fn unknown_backend_id_is_rejected() {
    let mut config = valid();
    config.storage.primary = "ipfs".to_string();
    let validation = validate_config(&config);
    assert!(validation.to_string().contains("ipfs"));
}

#[test]
fn chain_rpc_url_must_be_http() {
    let mut config = valid();
    config.chain = Some(govault_core::ChainConfig {
        rpc_url: "ws://node:8546".to_string(),
        chain_id: None,
    });
    assert!(validate_config(&config).to_string().contains("chain.rpc_url"));
}

#[test]
fn negative_limit_survives_parsing() {
    let raw = r#"
version = "0.5"

[approval]
max_approvals_per_hour = -3
"#;
    let config = GovaultConfig::from_toml_str(raw).unwrap();
    assert!(!validate_config(&config).is_valid());
}
