use crate::{AppSettings, RawSettings};
use color_eyre::eyre::{Result, WrapErr};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_CONFIG_PATH: &str = "config/settings.yaml";

/// Loads settings from `config/settings.yaml` (or `$APP_CONFIG`) with `APP__*` env overrides.
pub fn load_app_settings() -> Result<AppSettings> {
    // Need to load from dotenv to get it to overwrite the db url from env.
    dotenv::from_path(".env").ok();
    let config_path = env::var("APP_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    load_settings_from(&config_path)
}

pub fn load_settings_from(config_path: &Path) -> Result<AppSettings> {
    let config_path = config_path
        .canonicalize()
        .wrap_err_with(|| format!("Cannot find settings file {}", config_path.display()))?;
    debug!("Loading settings from {}", config_path.display());

    let builder = config::Config::builder()
        .add_source(config::File::from(config_path))
        .add_source(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        );

    let raw_settings = builder.build()?.try_deserialize::<RawSettings>()?;
    AppSettings::try_from(raw_settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxUnits;
    use std::io::Write;

    const SAMPLE: &str = r#"
logging:
  level: debug
api:
  host: 127.0.0.1
  port: 9475
  allowed_origins: ["http://localhost:3000"]
  public_url: http://localhost:9475
  max_upload_bytes: 1048576
database:
  in_memory: true
  max_connections: 4
  min_connections: 1
  max_lifetime: 600
  idle_timeout: 60
  acquire_timeout: 5
secrets:
  database_url: postgres://localhost/test
matching:
  embedding_dimensions: 4
  association_threshold: 0.6
  propagation_threshold: 0.75
  search_threshold: 0.6
  search_limit: 10
detection:
  url: http://localhost:8000/detect
  timeout_secs: 5
  box_units: pixels
storage:
  root: media
  public_url: http://localhost:9475/media/
messaging:
  enabled: false
  bridge_url: ws://localhost:3001/session
  credentials_path: data/session.json
  message_template: "Hi {name}: {url}"
  backoff:
    initial_ms: 100
    max_ms: 1000
    multiplier: 2.0
"#;

    #[test]
    fn loads_yaml_settings() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
        file.write_all(SAMPLE.as_bytes())?;

        let settings = load_settings_from(file.path())?;

        assert!(settings.database.in_memory);
        assert_eq!(settings.matching.embedding_dimensions, 4);
        assert_eq!(settings.detection.box_units, BoxUnits::Pixels);
        assert_eq!(settings.storage.public_url, "http://localhost:9475/media");
        assert!(settings.storage.root.is_absolute());
        assert!(settings.messaging.credentials_path.is_absolute());
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_settings_from(Path::new("does/not/exist.yaml")).is_err());
    }
}
