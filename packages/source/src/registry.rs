//! Municipality registry: embedded TOML definitions plus optional extras
//! loaded from disk.
//!
//! Each `.toml` file in `packages/source/municipalities/` is baked into the
//! binary at compile time via [`include_str!`]. Adding a municipality is a
//! matter of writing a TOML file and listing it below, or dropping it into
//! the directory named by [`MUNICIPALITY_DIR_ENV`] at runtime.

use std::path::Path;

use crate::municipality::{MunicipalityDefinition, MunicipalityRuleSet, parse_municipality_toml};
use crate::{ConfigError, ConfigProvider};

/// Environment variable naming a directory of extra municipality TOMLs.
pub const MUNICIPALITY_DIR_ENV: &str = "TAX_SALE_MUNICIPALITY_DIR";

/// TOML configs embedded at compile time.
const MUNICIPALITY_TOMLS: &[(&str, &str)] = &[
    (
        "victoria_county",
        include_str!("../municipalities/victoria_county.toml"),
    ),
    ("cape_breton", include_str!("../municipalities/cape_breton.toml")),
    ("halifax", include_str!("../municipalities/halifax.toml")),
];

/// Parses every embedded definition.
///
/// # Errors
///
/// Returns [`ConfigError`] if an embedded definition is malformed.
pub fn embedded_municipalities() -> Result<Vec<MunicipalityDefinition>, ConfigError> {
    MUNICIPALITY_TOMLS
        .iter()
        .map(|(name, toml)| parse_municipality_toml(&format!("{name}.toml"), toml))
        .collect()
}

/// Serves the embedded registry, optionally extended from a directory.
#[derive(Debug, Clone)]
pub struct EmbeddedConfigProvider {
    municipalities: Vec<MunicipalityDefinition>,
}

impl EmbeddedConfigProvider {
    /// Loads only the embedded definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an embedded definition is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_definitions(embedded_municipalities()?)
    }

    /// Loads the embedded definitions plus any in the directory named by
    /// [`MUNICIPALITY_DIR_ENV`], if set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any definition is malformed or the
    /// directory cannot be read.
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = Self::load()?;
        match std::env::var(MUNICIPALITY_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => provider.with_directory(Path::new(dir.trim())),
            _ => Ok(provider),
        }
    }

    /// Builds a provider from already-resolved definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateId`] if two definitions share an id.
    pub fn from_definitions(
        municipalities: Vec<MunicipalityDefinition>,
    ) -> Result<Self, ConfigError> {
        for (i, def) in municipalities.iter().enumerate() {
            if municipalities[..i].iter().any(|other| other.id == def.id) {
                return Err(ConfigError::DuplicateId(def.id.clone()));
            }
        }
        Ok(Self { municipalities })
    }

    /// Adds every `*.toml` file in `dir`. A file whose id matches an
    /// existing definition replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the directory or a file cannot be read,
    /// or a definition is malformed.
    pub fn with_directory(mut self, dir: &Path) -> Result<Self, ConfigError> {
        let io = |source: std::io::Error| ConfigError::Io {
            path: dir.display().to_string(),
            source,
        };

        let mut paths = std::fs::read_dir(dir)
            .map_err(io)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .collect::<Vec<_>>();
        paths.sort();

        for path in paths {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let def = parse_municipality_toml(&path.display().to_string(), &contents)?;

            log::info!("Loaded municipality {} from {}", def.id, path.display());

            if let Some(existing) = self.municipalities.iter_mut().find(|m| m.id == def.id) {
                *existing = def;
            } else {
                self.municipalities.push(def);
            }
        }

        Ok(self)
    }
}

impl ConfigProvider for EmbeddedConfigProvider {
    fn get_municipality_rules(&self, name: &str) -> Result<&MunicipalityRuleSet, ConfigError> {
        self.municipalities
            .iter()
            .find(|m| m.id == name || m.name.eq_ignore_ascii_case(name))
            .map(MunicipalityDefinition::rules)
            .ok_or_else(|| ConfigError::UnknownMunicipality(name.to_owned()))
    }

    fn municipality(&self, id: &str) -> Result<&MunicipalityDefinition, ConfigError> {
        self.municipalities
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| ConfigError::UnknownMunicipality(id.to_owned()))
    }

    fn all(&self) -> &[MunicipalityDefinition] {
        &self.municipalities
    }
}
