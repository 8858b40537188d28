//! Loading the watchdog configuration from a file and command-line
//! overrides.

use std::path::Path;

use twdt::WdtConfig;

use crate::error::CliError;

/// Command-line overrides applied on top of the file configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub timeout_ms: Option<u32>,
    pub idle_core_mask: Option<u32>,
    pub trigger_panic: Option<bool>,
}

/// Read `path` (JSON) if given, apply `overrides`, and validate for
/// `core_count` cores.
pub fn load(
    path: Option<&Path>,
    overrides: Overrides,
    core_count: u32,
) -> Result<WdtConfig, CliError> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)?
        }
        None => WdtConfig::default(),
    };

    if let Some(timeout_ms) = overrides.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    if let Some(mask) = overrides.idle_core_mask {
        config.idle_core_mask = mask;
    }
    if let Some(panic) = overrides.trigger_panic {
        config.trigger_panic = panic;
    }

    config
        .validate_for_cores(core_count)
        .map_err(|e| CliError::InvalidConfiguration(e.to_string()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_defaults_without_file() -> TestResult {
        let config = load(None, Overrides::default(), 2)?;
        assert_eq!(config, WdtConfig::default());
        Ok(())
    }

    #[test]
    fn test_overrides_win() -> TestResult {
        let overrides = Overrides {
            timeout_ms: Some(250),
            idle_core_mask: Some(0b10),
            trigger_panic: Some(true),
        };
        let config = load(None, overrides, 2)?;
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.idle_core_mask, 0b10);
        assert!(config.trigger_panic);
        Ok(())
    }

    #[test]
    fn test_file_is_read() -> TestResult {
        let path = std::env::temp_dir().join(format!("twdt-sim-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "timeout_ms": 750, "idle_core_mask": 1 }"#)?;
        let loaded = load(Some(&path), Overrides::default(), 1);
        std::fs::remove_file(&path)?;

        let config = loaded?;
        assert_eq!(config.timeout_ms, 750);
        assert_eq!(config.idle_core_mask, 1);
        assert!(!config.trigger_panic);
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero = Overrides {
            timeout_ms: Some(0),
            ..Overrides::default()
        };
        assert!(matches!(
            load(None, zero, 1),
            Err(CliError::InvalidConfiguration(_))
        ));

        let missing_core = Overrides {
            idle_core_mask: Some(0b100),
            ..Overrides::default()
        };
        assert!(matches!(
            load(None, missing_core, 2),
            Err(CliError::InvalidConfiguration(_))
        ));
    }
}
