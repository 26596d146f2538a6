//! # Engine Settings
//!
//! Tunables loaded from an external TOML file, all optional:
//!
//! ```toml
//! cleanup_iteration_cap = 100
//! rng_seed = 42
//! default_dice_min = 1
//! default_dice_max = 6
//! standalone_bucket = "_standalone"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EconomyError, EconomyResult};

/// Default bound on cleanup passes per recalculation.
pub const DEFAULT_CLEANUP_CAP: usize = 100;

/// Engine tunables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Maximum cleanup passes before recalculation gives up and warns.
    pub cleanup_iteration_cap: usize,
    /// Fixed dice seed for reproducible sessions; `None` draws from the OS.
    pub rng_seed: Option<u64>,
    /// Lower die bound when a `roll_dice` effect omits `min`.
    pub default_dice_min: i64,
    /// Upper die bound when a `roll_dice` effect omits `max`.
    pub default_dice_max: i64,
    /// Delta-table key for items outside any group.
    pub standalone_bucket: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cleanup_iteration_cap: DEFAULT_CLEANUP_CAP,
            rng_seed: None,
            default_dice_min: 1,
            default_dice_max: 6,
            standalone_bucket: "_standalone".to_string(),
        }
    }
}

impl EngineSettings {
    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidSettings`] if the text is malformed,
    /// names an unknown key, or sets inconsistent values.
    pub fn from_toml_str(text: &str) -> EconomyResult<Self> {
        let settings: Self =
            toml::from_str(text).map_err(|e| EconomyError::InvalidSettings(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidSettings`] if the file cannot be read
    /// or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EconomyError::InvalidSettings(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Same settings with a fixed dice seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    fn validate(&self) -> EconomyResult<()> {
        if self.cleanup_iteration_cap == 0 {
            return Err(EconomyError::InvalidSettings(
                "cleanup_iteration_cap must be at least 1".to_string(),
            ));
        }
        if self.default_dice_min > self.default_dice_max {
            return Err(EconomyError::InvalidSettings(format!(
                "default_dice_min {} exceeds default_dice_max {}",
                self.default_dice_min, self.default_dice_max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        assert_eq!(EngineSettings::from_toml_str("").unwrap(), EngineSettings::default());
    }

    #[test]
    fn test_partial_override() {
        let settings = EngineSettings::from_toml_str("rng_seed = 7\ncleanup_iteration_cap = 10").unwrap();
        assert_eq!(settings.rng_seed, Some(7));
        assert_eq!(settings.cleanup_iteration_cap, 10);
        assert_eq!(settings.default_dice_max, 6);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(EngineSettings::from_toml_str("cleanup_iteration_cap = 0").is_err());
        assert!(EngineSettings::from_toml_str("default_dice_min = 9").is_err());
        assert!(matches!(
            EngineSettings::from_toml_str("colour = 'red'"),
            Err(EconomyError::InvalidSettings(_))
        ));
    }
}
