//! Endpoint registry: the `{ name: address }` map loaded once at startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::monitoring::types::Endpoint;
use crate::monitoring::validation::{validate_address, validate_endpoint_name};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write registry {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to parse registry {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("registry contains no endpoints")]
    Empty,
    #[error("invalid endpoint name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("invalid address for endpoint {name:?}: {reason}")]
    InvalidAddress { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    endpoints: BTreeMap<String, String>,
}

impl Default for Registry {
    fn default() -> Self {
        let endpoints = BTreeMap::from([
            ("localhost".to_string(), "127.0.0.1".to_string()),
            ("google".to_string(), "google.com".to_string()),
        ]);
        Self { endpoints }
    }
}

impl Registry {
    /// Validate a name → address map
    pub fn from_map(endpoints: BTreeMap<String, String>) -> Result<Self, RegistryError> {
        if endpoints.is_empty() {
            return Err(RegistryError::Empty);
        }

        for (name, address) in &endpoints {
            validate_endpoint_name(name).map_err(|e| RegistryError::InvalidName {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            validate_address(address).map_err(|e| RegistryError::InvalidAddress {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Self { endpoints })
    }

    /// Load the registry at `path`, writing the default registry there if none exists
    pub fn load_or_create(path: &Path) -> Result<Self, RegistryError> {
        if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|source| RegistryError::Read { path: path.to_path_buf(), source })?;
            let endpoints: BTreeMap<String, String> = serde_json::from_str(&raw)
                .map_err(|source| RegistryError::Parse { path: path.to_path_buf(), source })?;
            let registry = Self::from_map(endpoints)?;
            info!("Loaded {} endpoints from {}", registry.len(), path.display());
            Ok(registry)
        } else {
            let registry = Self::default();
            registry.write(path)?;
            info!("Created default registry at {}", path.display());
            Ok(registry)
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), RegistryError> {
        let write_error = |source: std::io::Error| RegistryError::Write { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let raw = serde_json::to_string_pretty(&self.endpoints)
            .map_err(|source| RegistryError::Parse { path: path.to_path_buf(), source })?;
        fs::write(path, raw).map_err(write_error)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoints ordered by name
    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.endpoints.iter().map(|(name, address)| Endpoint::new(name, address))
    }
}
