// ============================================================
// Layer 6 — JSON Config Loader
// ============================================================
// Every subcommand takes `--json-config <path>`. The file is a
// nested JSON object whose groups map onto the serde structs in
// application/config.rs; missing keys take their defaults.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::Path};

pub fn load_json_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid config file '{}'", path.display()))
}

/// Log the effective configuration, defaults included.
pub fn print_config<T: Serialize>(config: &T) -> Result<()> {
    let pretty = serde_json::to_string_pretty(config)?;
    tracing::info!("Effective configuration:\n{pretty}");
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::KgcConfig;

    #[test]
    fn test_loads_partial_config_with_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        fs::write(tmp.path(), r#"{"preprocessing_args": {"dataset": "wn18rr"}}"#).unwrap();

        let cfg: KgcConfig = load_json_config(tmp.path()).unwrap();
        assert_eq!(cfg.preprocessing_args.dataset, "wn18rr");
        assert_eq!(cfg.training_args.batch_size, 128);
        assert!(print_config(&cfg).is_ok());
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let err = load_json_config::<KgcConfig>("/no/such/config.json").unwrap_err();
        assert!(format!("{err:#}").contains("/no/such/config.json"));
    }
}
