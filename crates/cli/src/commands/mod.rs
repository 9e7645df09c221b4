pub mod audit;
pub mod budget;
pub mod config_cmd;
pub mod doctor;
pub mod execute;
pub mod gateway;
pub mod status;
pub mod test_connection;

pub(crate) const DEFAULT_CONFIG_PATH: &str = "./connectorrt.toml";
pub(crate) const DEFAULT_DEFINITIONS_DIR: &str = "./connectors";

pub(crate) fn load_config(path: &std::path::Path) -> connectorrt_config::RuntimeConfig {
    match connectorrt_config::RuntimeConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load config from {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

pub(crate) fn parse_json_arg(raw: Option<&str>, default: serde_json::Value) -> serde_json::Value {
    match raw {
        None => default,
        Some(s) => serde_json::from_str(s).unwrap_or_else(|e| {
            eprintln!("error: invalid JSON: {e}");
            std::process::exit(1);
        }),
    }
}

pub(crate) fn parse_credentials(raw: Option<&str>) -> connectorrt_core::Credentials {
    match raw {
        None => connectorrt_core::Credentials::default(),
        Some(s) => serde_json::from_str(s).unwrap_or_else(|e| {
            eprintln!("error: invalid credentials JSON: {e}");
            std::process::exit(1);
        }),
    }
}
