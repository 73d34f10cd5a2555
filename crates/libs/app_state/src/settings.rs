use crate::{
    ApiSettings, BackoffSettings, DatabaseSettings, DetectionSettings, LoggingSettings,
    MatchingSettings, RawSettings, SecretSettings,
};
use color_eyre::Result;
use color_eyre::eyre::{bail, eyre};
use serde::Deserialize;
use std::path::{PathBuf, absolute};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub database: DatabaseSettings,
    pub secrets: SecretSettings,
    pub matching: MatchingSettings,
    pub detection: DetectionSettings,
    pub storage: StorageSettings,
    pub messaging: MessagingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub root: PathBuf,
    pub public_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessagingSettings {
    pub enabled: bool,
    pub bridge_url: String,
    pub credentials_path: PathBuf,
    pub message_template: String,
    pub backoff: BackoffSettings,
}

impl TryFrom<RawSettings> for AppSettings {
    type Error = color_eyre::Report;

    fn try_from(raw: RawSettings) -> Result<Self> {
        raw.matching.validate()?;
        raw.messaging.backoff.validate()?;

        let storage = StorageSettings {
            root: absolute(&raw.storage.root)
                .map_err(|e| eyre!("Invalid storage root {:?}: {e}", raw.storage.root))?,
            public_url: raw.storage.public_url.trim_end_matches('/').to_owned(),
        };
        let messaging = MessagingSettings {
            enabled: raw.messaging.enabled,
            bridge_url: raw.messaging.bridge_url,
            credentials_path: absolute(&raw.messaging.credentials_path).map_err(|e| {
                eyre!(
                    "Invalid credentials path {:?}: {e}",
                    raw.messaging.credentials_path
                )
            })?,
            message_template: raw.messaging.message_template,
            backoff: raw.messaging.backoff,
        };

        Ok(Self {
            logging: raw.logging,
            api: raw.api,
            database: raw.database,
            secrets: raw.secrets,
            matching: raw.matching,
            detection: raw.detection,
            storage,
            messaging,
        })
    }
}

impl MatchingSettings {
    /// Thresholds must be usable distances between unit vectors.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dimensions == 0 {
            bail!("matching.embedding_dimensions must be greater than zero");
        }
        for (name, value) in [
            ("association_threshold", self.association_threshold),
            ("propagation_threshold", self.propagation_threshold),
            ("search_threshold", self.search_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("matching.{name} must be a positive number, got {value}");
            }
        }
        if self.search_limit == 0 {
            bail!("matching.search_limit must be greater than zero");
        }
        Ok(())
    }
}

impl BackoffSettings {
    pub fn validate(&self) -> Result<()> {
        if self.initial_ms == 0 || self.max_ms < self.initial_ms {
            bail!(
                "messaging.backoff needs 0 < initial_ms <= max_ms, got {} and {}",
                self.initial_ms,
                self.max_ms
            );
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            bail!("messaging.backoff.multiplier must be >= 1.0");
        }
        Ok(())
    }

    #[must_use]
    pub const fn initial(&self) -> Duration {
        Duration::from_millis(self.initial_ms)
    }

    #[must_use]
    pub const fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

impl DetectionSettings {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matching_settings_are_valid() {
        assert!(MatchingSettings::default().validate().is_ok());
    }

    #[test]
    fn rejects_negative_threshold() {
        let settings = MatchingSettings {
            propagation_threshold: -0.1,
            ..MatchingSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let backoff = BackoffSettings {
            initial_ms: 500,
            max_ms: 1000,
            multiplier: 0.5,
        };
        assert!(backoff.validate().is_err());
    }
}
