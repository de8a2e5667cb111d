use std::path::PathBuf;

use snipline_core::SecretString;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_SNIPPET_DIR: &str = "snippets";

// Tool server settings. Nothing here is mandatory.
pub struct GatewayConfig {
    pub bind_addr: String,
    pub snippet_dir: PathBuf,
    pub access_key: Option<SecretString>,
    pub catalog_path: Option<PathBuf>,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            snippet_dir: get("SNIPPET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNIPPET_DIR)),
            access_key: get("MCP_EXTENSION_KEY").map(SecretString::new),
            catalog_path: get("TOOL_CATALOG_PATH").map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_open_on_port_3000() {
        let config = GatewayConfig::from_lookup(|_| None);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.snippet_dir, PathBuf::from("snippets"));
        assert!(config.access_key.is_none());
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn blank_key_counts_as_unset() {
        let config = GatewayConfig::from_lookup(|key| match key {
            "MCP_EXTENSION_KEY" => Some(" ".to_string()),
            "BIND_ADDR" => Some("127.0.0.1:7071".to_string()),
            _ => None,
        });
        assert!(config.access_key.is_none());
        assert_eq!(config.bind_addr, "127.0.0.1:7071");
    }
}
