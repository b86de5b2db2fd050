use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::args::CliArgs;
use crate::settings::Config;

/// Fatal configuration problems. The caller maps these to the
/// interface-init-failure exit code rather than the generic one, per §7's
/// distinction between transient/logged errors and startup failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("parsing config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("parsing blacklist catalog: {0}")]
    Blacklist(#[from] crate::blacklist_xml::BlacklistXmlError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Loads a [`Config`] from, in increasing precedence: built-in defaults, an
/// optional TOML file, `NEMEA_*` environment variables, then CLI flags.
/// Environment variables are read by `clap`'s `env` attribute on
/// [`CliArgs`], so by the time `from_args` runs, `args` already reflects
/// env-over-default precedence; this function only adds the TOML layer
/// underneath and the file-vs-env/CLI ordering on top.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(args: &CliArgs) -> Result<Config, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        if let Some(path) = &args.blacklist_config_path {
            config.blacklist_config_path = path.clone();
        }
        if let Some(path) = &args.adaptive_blacklist_path {
            config.adaptive_blacklist_path = path.clone();
        }
        if let Some(secs) = args.process_interval_secs {
            config.process_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = args.evidence_timeout_secs {
            config.evidence_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = args.aggregation_window_secs {
            config.aggregation_window = Duration::from_secs(secs);
        }
        if let Some(max) = args.max_targets_per_event {
            config.max_targets_per_event = max;
        }
        if let Some(max) = args.max_satellites_per_export {
            config.max_satellites_per_export = max;
        }
        if let Some(max) = args.max_satellites_per_instance {
            config.max_satellites_per_instance = max;
        }
        if args.skip_empty_satellite_exports {
            config.export_instances_without_satellites = false;
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn blacklist_xml_fixture() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"<?xml version="1.0"?>
            <blacklists>
                <blacklist id="1" name="feodo" category="Intrusion.Botnet.Feodo" source="https://example.invalid/feodo" />
            </blacklists>"#
        )
        .unwrap();
        file
    }

    #[test]
    fn defaults_apply_when_no_file_given() {
        let blacklist = blacklist_xml_fixture();
        let mut args = CliArgs::default();
        args.blacklist_config_path = Some(blacklist.path().to_path_buf());
        let config = ConfigLoader::load(&args).unwrap();
        assert_eq!(config.process_interval, Duration::from_secs(30));
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let blacklist = blacklist_xml_fixture();
        let mut args = CliArgs::default();
        args.blacklist_config_path = Some(blacklist.path().to_path_buf());
        args.process_interval_secs = Some(5);
        let config = ConfigLoader::load(&args).unwrap();
        assert_eq!(config.process_interval, Duration::from_secs(5));
    }

    #[test]
    fn missing_blacklist_config_is_invalid() {
        let mut args = CliArgs::default();
        args.blacklist_config_path = Some("/nonexistent/blacklists.xml".into());
        assert!(ConfigLoader::load(&args).is_err());
    }
}
