use crate::error::{Error, Result};
use crate::temperature::K_BOLTZMANN;
use serde::{Deserialize, Serialize};

/// One constituent of a material composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialNuclide {
    pub name: String,
    /// Atom density in atoms/b-cm.
    pub density: f64,
}

/// Composition of a material as consumed by the mixer.
///
/// A `MaterialSpec` starts empty; add nuclides in order with
/// [`MaterialSpec::add_nuclide`] and optionally one or more temperatures.
/// A material without temperatures is evaluated at the configured default
/// temperature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub name: String,
    #[serde(default)]
    pub material_id: Option<u32>,
    #[serde(default)]
    pub nuclides: Vec<MaterialNuclide>,
    /// Requested temperatures in K.
    #[serde(default)]
    pub temperatures: Vec<f64>,
}

impl MaterialSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, material_id: u32) -> Self {
        self.material_id = Some(material_id);
        self
    }

    /// Add a nuclide at an atom density. Adding a nuclide twice replaces its
    /// density and keeps its original position.
    pub fn add_nuclide(&mut self, nuclide: impl AsRef<str>, density: f64) -> Result<()> {
        let nuclide = nuclide.as_ref();
        if !density.is_finite() || density < 0.0 {
            return Err(Error::config(format!(
                "density of '{}' in material '{}' must be non-negative and finite, got {}",
                nuclide, self.name, density
            )));
        }
        match self.nuclides.iter_mut().find(|n| n.name == nuclide) {
            Some(existing) => existing.density = density,
            None => self.nuclides.push(MaterialNuclide {
                name: nuclide.to_string(),
                density,
            }),
        }
        Ok(())
    }

    pub fn add_temperature(&mut self, temperature: f64) {
        self.temperatures.push(temperature);
    }

    /// Requested temperatures, or `default` when none were given.
    pub fn temperatures_or(&self, default: f64) -> Vec<f64> {
        if self.temperatures.is_empty() {
            vec![default]
        } else {
            self.temperatures.clone()
        }
    }

    /// Distinct kT values (eV, ascending) this material is evaluated at.
    pub fn kts(&self, default_temperature: f64) -> Vec<f64> {
        let mut kts: Vec<f64> = self
            .temperatures_or(default_temperature)
            .into_iter()
            .map(|t| K_BOLTZMANN * t)
            .collect();
        kts.sort_by(f64::total_cmp);
        kts.dedup();
        kts
    }

    /// Check the composition without looking at any library.
    pub fn validate(&self) -> Result<()> {
        if self.nuclides.is_empty() {
            return Err(Error::config(format!("material '{}' has no nuclides", self.name)));
        }
        if let Some(n) = self
            .nuclides
            .iter()
            .find(|n| !n.density.is_finite() || n.density < 0.0)
        {
            return Err(Error::config(format!(
                "density of '{}' in material '{}' must be non-negative and finite, got {}",
                n.name, self.name, n.density
            )));
        }
        if let Some(t) = self
            .temperatures
            .iter()
            .find(|t| !t.is_finite() || **t <= 0.0)
        {
            return Err(Error::config(format!(
                "material '{}' requests invalid temperature {} K",
                self.name, t
            )));
        }
        Ok(())
    }
}
