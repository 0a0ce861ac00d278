//! Runtime configuration.
//!
//! Defaults reproduce the January 2026 closing reports. A JSON file named by
//! `TABLERO_CONFIG` can override any field; `HOST` and `PORT` override the
//! listen address.

use crate::buckets::{default_weeks, validate_buckets, WeekBucket};
use crate::error::{EngineError, Result};
use crate::format::DEFAULT_CURRENCY;
use crate::loader::{default_search_dirs, SourceLocator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "TABLERO_CONFIG";

/// Where to find one dashboard's workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Candidate file names, tried in order.
    pub file_names: Vec<String>,
    pub sheet: String,
    /// Directories to search. Empty means the working directory, the
    /// executable's directory and its two parents.
    #[serde(default)]
    pub search_dirs: Vec<PathBuf>,
}

impl SourceConfig {
    pub fn new(file_name: &str, sheet: &str) -> Self {
        SourceConfig {
            file_names: vec![file_name.to_string()],
            sheet: sheet.to_string(),
            search_dirs: Vec::new(),
        }
    }

    pub fn locator(&self) -> SourceLocator {
        let dirs = if self.search_dirs.is_empty() {
            default_search_dirs()
        } else {
            self.search_dirs.clone()
        };
        SourceLocator::new(self.file_names.clone(), dirs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub currency_symbol: String,
    pub pagos: SourceConfig,
    pub finanzas: SourceConfig,
    pub weeks: Vec<WeekBucket>,
    pub top_advisors: usize,
    pub top_finanzas_advisors: usize,
    pub top_companies: usize,
    pub export_file_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            currency_symbol: DEFAULT_CURRENCY.to_string(),
            pagos: SourceConfig::new("PAGOS ENERO 2026.xlsx", "Hoja1"),
            finanzas: SourceConfig::new("CIERRE GASTOS ADMINISTRATIVOS ENERO 2026.xlsx", "Hoja1"),
            weeks: default_weeks(),
            top_advisors: 10,
            top_finanzas_advisors: 15,
            top_companies: 10,
            export_file_name: "Datos_Finanzas_Enero_2026.xlsx".to_string(),
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Defaults, then the `TABLERO_CONFIG` file if set, then `HOST`/`PORT`.
    /// The result is validated.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => {
                log::info!("reading configuration from {}", PathBuf::from(&path).display());
                Self::from_file(Path::new(&path))?
            }
            None => Config::default(),
        };
        if let Ok(host) = std::env::var("HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.port = port
                .parse()
                .map_err(|_| EngineError::Config(format!("PORT must be a number, got '{}'", port)))?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_buckets(&self.weeks)?;
        for (name, source) in [("pagos", &self.pagos), ("finanzas", &self.finanzas)] {
            if source.file_names.is_empty() {
                return Err(EngineError::Config(format!("{}: no file names configured", name)));
            }
            if source.sheet.trim().is_empty() {
                return Err(EngineError::Config(format!("{}: empty sheet name", name)));
            }
        }
        if self.top_advisors == 0 || self.top_finanzas_advisors == 0 || self.top_companies == 0 {
            return Err(EngineError::Config("top-N limits must be positive".to_string()));
        }
        Ok(())
    }
}
