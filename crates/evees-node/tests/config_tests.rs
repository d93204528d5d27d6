//! Tests for node configuration.
//!
//! Verifies:
//! - Defaults for every section
//! - TOML parsing with partial sections
//! - EVEES_* overrides and validation

use std::collections::HashMap;
use std::io::Write;

use evees_node::config::NodeConfig;

fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

// ═══════════════════════════════════════════════════════════════
// Defaults and parsing
// ═══════════════════════════════════════════════════════════════

#[test]
fn defaults_are_local_only() {
    let config = NodeConfig::default();
    assert_eq!(config.cid.base, "base32");
    assert_eq!(config.cid.version, 1);
    assert_eq!(config.cid.codec, "raw");
    assert_eq!(config.cid.hash_type, "sha2-256");
    assert!(!config.ipfs.enabled);
    assert_eq!(config.ipfs.port, 5001);
    assert!(config.pinner.url.is_none());
    assert!(config.pinner.service_config().is_none());
    assert_eq!(config.logging.level, "info");
    assert!(
        config.resolver.source_timeout_ms > config.ipfs.timeout_ms,
        "A backend's own timeout must fire before the resolver gives up on it"
    );
    config.validate().unwrap();
}

#[test]
fn parses_partial_toml() {
    let config: NodeConfig = toml::from_str(
        r#"
        [cid]
        base = "base58btc"
        type = "sha2-512"

        [ipfs]
        enabled = true
        host = "ipfs.example.org"
        protocol = "https"
        port = 443

        [pinner]
        url = "https://pinner.example.org"
        flush_interval_ms = 1000
        "#,
    )
    .unwrap();

    assert_eq!(config.cid.base, "base58btc");
    assert_eq!(config.cid.hash_type, "sha2-512");
    assert_eq!(config.cid.codec, "raw");
    assert_eq!(
        config.ipfs.store_config().api_url(),
        "https://ipfs.example.org:443/api/v0"
    );
    let pinner = config.pinner.service_config().unwrap();
    assert_eq!(pinner.url, "https://pinner.example.org");
    assert_eq!(config.pinner.flush_interval().as_millis(), 1000);
    assert_eq!(config.resolver.source_timeout_ms, 20_000);
    config.validate().unwrap();
}

#[test]
fn load_reads_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[logging]\nlevel = \"debug\"\njson_format = true").unwrap();

    let config = NodeConfig::from_file(file.path()).unwrap();
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);
}

#[test]
fn from_file_requires_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(NodeConfig::from_file(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn load_with_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
    assert_eq!(config.resolver.source_timeout_ms, 20_000);
}

// ═══════════════════════════════════════════════════════════════
// Overrides and validation
// ═══════════════════════════════════════════════════════════════

#[test]
fn env_overrides_apply() {
    let mut config = NodeConfig::default();
    config.apply_overrides(overrides(&[
        ("EVEES_IPFS_HOST", "10.0.0.5"),
        ("EVEES_IPFS_PORT", "5002"),
        ("EVEES_PINNER_URL", "http://pinner.local"),
        ("EVEES_FLUSH_INTERVAL_MS", "250"),
        ("EVEES_PIN_DB", "/var/lib/evees/pins.redb"),
        ("EVEES_LOG_LEVEL", "evees_pinner=debug"),
    ]));

    assert!(config.ipfs.enabled);
    assert_eq!(config.ipfs.host, "10.0.0.5");
    assert_eq!(config.ipfs.port, 5002);
    assert_eq!(config.pinner.url.as_deref(), Some("http://pinner.local"));
    assert_eq!(config.pinner.flush_interval_ms, 250);
    assert_eq!(
        config.pinner.db_path.as_deref(),
        Some(std::path::Path::new("/var/lib/evees/pins.redb"))
    );
    assert_eq!(config.logging.level, "evees_pinner=debug");
}

#[test]
fn unparsable_numbers_are_ignored() {
    let mut config = NodeConfig::default();
    config.apply_overrides(overrides(&[("EVEES_IPFS_PORT", "not-a-port")]));
    assert_eq!(config.ipfs.port, 5001);
}

#[test]
fn unsupported_hash_fails_validation() {
    let mut config = NodeConfig::default();
    config.apply_overrides(overrides(&[("EVEES_CID_HASH", "md5")]));
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("md5"));
}

#[test]
fn tiny_flush_interval_fails_validation() {
    let mut config = NodeConfig::default();
    config.pinner.url = Some("http://pinner.local".into());
    config.pinner.flush_interval_ms = 1;
    assert!(config.validate().is_err());
}
