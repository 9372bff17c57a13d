//! Unit tests for `GlobalConfig` parsing and validation.

use cellbook::GlobalConfig;

#[test]
fn minimal_config_applies_defaults() {
    let config = GlobalConfig::from_toml_str(r#"sessions_root = "/tmp/sessions""#)
        .expect("minimal config parses");
    assert_eq!(config.http_port, 2150);
    assert_eq!(config.runtime_cmd, "node");
    assert!(config.runtime_args.is_empty());
    assert_eq!(config.installer_cmd, "npm");
    assert_eq!(config.installer_args, vec!["install".to_owned()]);
    assert!(config.secrets_path.is_none());
}

#[test]
fn full_config_overrides_defaults() {
    let config = GlobalConfig::from_toml_str(
        r#"
sessions_root = "/srv/notebooks"
http_port = 9999
runtime_cmd = "deno"
runtime_args = ["run"]
installer_cmd = "pnpm"
installer_args = ["add"]
secrets_path = "/etc/cellbook/secrets.toml"
"#,
    )
    .expect("full config parses");
    assert_eq!(config.http_port, 9999);
    assert_eq!(config.runtime_cmd, "deno");
    assert_eq!(config.runtime_args, vec!["run".to_owned()]);
    assert_eq!(config.installer_cmd, "pnpm");
    assert!(config.secrets_path.is_some());
}

#[test]
fn missing_sessions_root_is_rejected() {
    let result = GlobalConfig::from_toml_str(r#"http_port = 80"#);
    assert!(result.is_err());
}

#[test]
fn empty_runtime_cmd_is_rejected() {
    let result = GlobalConfig::from_toml_str(
        r#"
sessions_root = "/tmp"
runtime_cmd = " "
"#,
    );
    assert!(result.is_err());
}

#[test]
fn malformed_toml_is_rejected() {
    let result = GlobalConfig::from_toml_str("sessions_root = [unclosed");
    assert!(result.is_err());
}
