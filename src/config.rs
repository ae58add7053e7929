// Run configuration for building the multi-group cross section context
use crate::error::{Error, Result};
use crate::interface::MgxsInterface;
use crate::library::{open_library, MgxsLibrary};
use crate::material::MaterialSpec;
use crate::temperature::{TemperatureMethod, TemperatureSelector};
use crate::variance_reduction::{read_variance_reduction, VarianceReduction};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_tolerance() -> f64 {
    10.0
}

fn default_temperature() -> f64 {
    293.6
}

/// Settings read from a JSON configuration file.
///
/// ```json
/// {
///   "cross_sections": "mgxs.h5",
///   "temperature_method": "nearest",
///   "temperature_tolerance": 10.0,
///   "temperature_default": 293.6,
///   "materials": [{"name": "water", "nuclides": [{"name": "H1", "density": 0.0668}]}],
///   "variance_reduction": {"importances": [{"region": 1, "importance": 2.0}]}
/// }
/// ```
///
/// A relative `cross_sections` path read through [`Config::from_file`] is
/// resolved against the configuration file's directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the multi-group library (`.h5`/`.hdf5` or `.json`).
    pub cross_sections: PathBuf,
    #[serde(default)]
    pub temperature_method: TemperatureMethod,
    /// Allowed distance (K) between a requested temperature and the data used.
    #[serde(default = "default_tolerance")]
    pub temperature_tolerance: f64,
    /// Temperature (K) of materials that do not request one.
    #[serde(default = "default_temperature")]
    pub temperature_default: f64,
    #[serde(default)]
    pub materials: Vec<MaterialSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variance_reduction: Option<serde_json::Value>,
}

impl Config {
    pub fn new(cross_sections: impl Into<PathBuf>) -> Self {
        Config {
            cross_sections: cross_sections.into(),
            temperature_method: TemperatureMethod::default(),
            temperature_tolerance: default_tolerance(),
            temperature_default: default_temperature(),
            materials: Vec::new(),
            variance_reduction: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        if config.cross_sections.is_relative() {
            if let Some(dir) = path.parent() {
                config.cross_sections = dir.join(&config.cross_sections);
            }
        }
        log::debug!("configuration read from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.temperature_tolerance.is_finite() || self.temperature_tolerance < 0.0 {
            return Err(Error::config(format!(
                "temperature_tolerance must be non-negative, got {}",
                self.temperature_tolerance
            )));
        }
        if !self.temperature_default.is_finite() || self.temperature_default <= 0.0 {
            return Err(Error::config(format!(
                "temperature_default must be positive, got {}",
                self.temperature_default
            )));
        }
        Ok(())
    }

    pub fn selector(&self) -> TemperatureSelector {
        TemperatureSelector::new(self.temperature_method, self.temperature_tolerance)
    }

    pub fn open_library(&self) -> Result<Box<dyn MgxsLibrary>> {
        open_library(&self.cross_sections)
    }

    /// Open the library and build the context for the configured materials.
    pub fn build_interface(&self) -> Result<MgxsInterface> {
        let library = self.open_library()?;
        MgxsInterface::build(
            library.as_ref(),
            &self.materials,
            self.selector(),
            self.temperature_default,
        )
    }

    /// Variance reduction tables, if the configuration has any.
    pub fn variance_reduction(&self, num_groups: usize) -> Result<Option<VarianceReduction>> {
        self.variance_reduction
            .as_ref()
            .map(|node| read_variance_reduction(node, num_groups))
            .transpose()
    }
}
