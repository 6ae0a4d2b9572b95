//! Configuration types for the watermark core
//!
//! The core reads no environment variables; callers build a
//! [`WatermarkConfig`] however they like (JSON, env, code) and hand it in.

use serde::{Deserialize, Serialize};

use crate::meta::{MetaSchema, TableFormat};
use crate::traits::validate_key;

/// Main watermark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    /// Key of the meta log inside the store
    #[serde(default = "default_meta_key")]
    pub meta_key: String,

    /// Where the meta log lives
    #[serde(default)]
    pub store: StoreConfig,

    /// Column names of the meta log
    #[serde(default)]
    pub schema: MetaSchema,

    /// Serialization format of the meta log
    #[serde(default)]
    pub format: TableFormat,

    /// How merges replace the meta log
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl WatermarkConfig {
    /// Create a configuration with defaults for the given store
    pub fn new(store: StoreConfig) -> Self {
        Self {
            meta_key: default_meta_key(),
            store,
            schema: MetaSchema::default(),
            format: TableFormat::default(),
            write_mode: WriteMode::default(),
        }
    }

    /// Set the meta log key
    pub fn with_meta_key(mut self, meta_key: impl Into<String>) -> Self {
        self.meta_key = meta_key.into();
        self
    }

    /// Set the meta log schema
    pub fn with_schema(mut self, schema: MetaSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Set the write mode
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_key(&self.meta_key)
            .map_err(|e| crate::Error::config(format!("Invalid meta_key: {}", e)))?;
        self.schema.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Blob store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Directory-backed store
    File {
        /// Root directory
        root: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { root } => {
                if root.trim().is_empty() {
                    return Err(crate::Error::config("File store root cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

/// How the merger replaces the meta log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Unconditional replace; a concurrent merge can be lost (last writer wins)
    #[default]
    Overwrite,

    /// Replace only if the log is unchanged since it was read
    Conditional,
}

impl std::str::FromStr for WriteMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(WriteMode::Overwrite),
            "conditional" => Ok(WriteMode::Conditional),
            other => Err(crate::Error::config(format!(
                "Unknown write mode '{}'. Supported modes: overwrite, conditional",
                other
            ))),
        }
    }
}

fn default_meta_key() -> String {
    "meta_file.csv".to_string()
}
