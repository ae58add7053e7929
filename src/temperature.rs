// Temperature sample selection for multi-group data
use crate::error::{Error, Result};
use crate::utilities::find_interval;
use serde::{Deserialize, Serialize};

/// Boltzmann constant in eV/K.
pub const K_BOLTZMANN: f64 = 8.617333262e-5;

/// Convert a temperature in K to the sqrt(kT) (eV^1/2) used on the lookup surface.
#[inline]
pub fn sqrt_kt_from_kelvin(temperature: f64) -> f64 {
    (K_BOLTZMANN * temperature).sqrt()
}

#[inline]
pub fn kelvin_from_kt(kt: f64) -> f64 {
    kt / K_BOLTZMANN
}

/// Policy for turning a requested temperature into stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureMethod {
    /// Use the single stored sample closest in kT.
    #[default]
    Nearest,
    /// Linearly interpolate in kT between the two bracketing samples.
    Interpolation,
}

/// Result of a selection over a nuclide's sorted kT samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemperatureSelection {
    Single(usize),
    /// `weight` is the share of `upper`; `lower` gets `1 - weight`.
    Bracket {
        lower: usize,
        upper: usize,
        weight: f64,
    },
}

impl TemperatureSelection {
    /// (sample index, weight) pairs with nonzero weight.
    pub fn weights(&self) -> impl Iterator<Item = (usize, f64)> {
        let pairs = match *self {
            TemperatureSelection::Single(i) => [(i, 1.0), (i, 0.0)],
            TemperatureSelection::Bracket {
                lower,
                upper,
                weight,
            } => [(lower, 1.0 - weight), (upper, weight)],
        };
        pairs.into_iter().filter(|(_, w)| *w > 0.0)
    }
}

/// Chooses which stored temperature samples serve a request.
///
/// Selection during tracking (`select`) is a pure function of the requested
/// sqrt(kT) and the sample list, so identical requests always return the
/// identical sample. The tolerance only applies while deciding what to load
/// (`kts_to_read`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSelector {
    method: TemperatureMethod,
    /// Allowed distance in K between a request and the samples serving it.
    tolerance: f64,
}

impl Default for TemperatureSelector {
    fn default() -> Self {
        Self::new(TemperatureMethod::Nearest, 10.0)
    }
}

impl TemperatureSelector {
    pub const fn new(method: TemperatureMethod, tolerance: f64) -> Self {
        Self { method, tolerance }
    }

    pub fn method(&self) -> TemperatureMethod {
        self.method
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Select sample(s) from ascending `kts` (eV) for a request in sqrt(kT).
    ///
    /// # Panics
    /// Panics if `kts` is empty; loaded data always has one sample.
    pub fn select(&self, kts: &[f64], sqrt_kt: f64) -> TemperatureSelection {
        assert!(!kts.is_empty(), "temperature selection over an empty sample list");
        if kts.len() == 1 {
            return TemperatureSelection::Single(0);
        }
        let kt = sqrt_kt * sqrt_kt;
        let i = find_interval(kts, kt);
        match self.method {
            TemperatureMethod::Nearest => {
                // ties go to the lower sample
                if (kts[i + 1] - kt).abs() < (kt - kts[i]).abs() {
                    TemperatureSelection::Single(i + 1)
                } else {
                    TemperatureSelection::Single(i)
                }
            }
            TemperatureMethod::Interpolation => {
                if kt <= kts[0] {
                    TemperatureSelection::Single(0)
                } else if kt >= kts[kts.len() - 1] {
                    TemperatureSelection::Single(kts.len() - 1)
                } else {
                    TemperatureSelection::Bracket {
                        lower: i,
                        upper: i + 1,
                        weight: (kt - kts[i]) / (kts[i + 1] - kts[i]),
                    }
                }
            }
        }
    }

    /// Resolve which of the library's `available` kT samples (eV) must be
    /// loaded to serve `requested` temperatures (K). The result is sorted and
    /// free of duplicates.
    pub fn kts_to_read(&self, nuclide: &str, available: &[f64], requested: &[f64]) -> Result<Vec<f64>> {
        if available.is_empty() {
            return Err(Error::data(format!(
                "nuclide '{}' has no temperature data in the library",
                nuclide
            )));
        }
        let mut sorted = available.to_vec();
        sorted.sort_by(f64::total_cmp);

        let mut chosen = Vec::new();
        for &temperature in requested {
            if !temperature.is_finite() || temperature < 0.0 {
                return Err(Error::config(format!(
                    "invalid temperature {} K requested for '{}'",
                    temperature, nuclide
                )));
            }
            let kt = K_BOLTZMANN * temperature;
            let i = find_interval(&sorted, kt);
            let lowest = sorted[0];
            let highest = sorted[sorted.len() - 1];
            match self.method {
                TemperatureMethod::Nearest => {
                    let nearest = match self.select(&sorted, kt.sqrt()) {
                        TemperatureSelection::Single(n) => sorted[n],
                        TemperatureSelection::Bracket { lower, .. } => sorted[lower],
                    };
                    self.check_tolerance(nuclide, temperature, nearest)?;
                    chosen.push(nearest);
                }
                TemperatureMethod::Interpolation => {
                    if kt < lowest || kt > highest {
                        let edge = if kt < lowest { lowest } else { highest };
                        self.check_tolerance(nuclide, temperature, edge)?;
                        log::warn!(
                            "{:.1} K is outside the data range of '{}'; using the {:.1} K sample without interpolation",
                            temperature,
                            nuclide,
                            kelvin_from_kt(edge)
                        );
                        chosen.push(edge);
                    } else if sorted.len() == 1 {
                        chosen.push(lowest);
                    } else {
                        chosen.push(sorted[i]);
                        chosen.push(sorted[i + 1]);
                    }
                }
            }
        }
        chosen.sort_by(f64::total_cmp);
        chosen.dedup();
        Ok(chosen)
    }

    fn check_tolerance(&self, nuclide: &str, temperature: f64, sample_kt: f64) -> Result<()> {
        let sample = kelvin_from_kt(sample_kt);
        if (sample - temperature).abs() > self.tolerance {
            return Err(Error::config(format!(
                "no cross sections for '{}' at or near {:.1} K (closest is {:.1} K, tolerance {:.1} K)",
                nuclide, temperature, sample, self.tolerance
            )));
        }
        if sample != temperature {
            log::debug!(
                "serving '{}' at {:.1} K from the {:.1} K sample",
                nuclide,
                temperature,
                sample
            );
        }
        Ok(())
    }
}
