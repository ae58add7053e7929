// Cross section type selectors and optional query dimensions
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which multi-group quantity a general lookup returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XsType {
    Total,
    Absorption,
    InverseVelocity,
    DecayRate,
    /// Scattering without secondary multiplicity.
    Scatter,
    /// Scattering production (includes multiplicity).
    NuScatter,
    /// Scatter resolved in the scattering cosine; requires `mu`.
    ScatterFmu,
    /// Nu-scatter resolved in the scattering cosine; requires `mu`.
    NuScatterFmu,
    Fission,
    KappaFission,
    PromptNuFission,
    DelayedNuFission,
    NuFission,
    ChiPrompt,
    ChiDelayed,
}

impl XsType {
    pub const ALL: [XsType; 15] = [
        XsType::Total,
        XsType::Absorption,
        XsType::InverseVelocity,
        XsType::DecayRate,
        XsType::Scatter,
        XsType::NuScatter,
        XsType::ScatterFmu,
        XsType::NuScatterFmu,
        XsType::Fission,
        XsType::KappaFission,
        XsType::PromptNuFission,
        XsType::DelayedNuFission,
        XsType::NuFission,
        XsType::ChiPrompt,
        XsType::ChiDelayed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            XsType::Total => "total",
            XsType::Absorption => "absorption",
            XsType::InverseVelocity => "inverse-velocity",
            XsType::DecayRate => "decay-rate",
            XsType::Scatter => "scatter",
            XsType::NuScatter => "nu-scatter",
            XsType::ScatterFmu => "scatter-fmu",
            XsType::NuScatterFmu => "nu-scatter-fmu",
            XsType::Fission => "fission",
            XsType::KappaFission => "kappa-fission",
            XsType::PromptNuFission => "prompt-nu-fission",
            XsType::DelayedNuFission => "delayed-nu-fission",
            XsType::NuFission => "nu-fission",
            XsType::ChiPrompt => "chi-prompt",
            XsType::ChiDelayed => "chi-delayed",
        }
    }

    /// Types that only exist for fissionable data (including the delayed
    /// precursor decay constants).
    pub fn requires_fission(self) -> bool {
        matches!(
            self,
            XsType::DecayRate
                | XsType::Fission
                | XsType::KappaFission
                | XsType::PromptNuFission
                | XsType::DelayedNuFission
                | XsType::NuFission
                | XsType::ChiPrompt
                | XsType::ChiDelayed
        )
    }

    pub fn requires_cosine(self) -> bool {
        matches!(self, XsType::ScatterFmu | XsType::NuScatterFmu)
    }

    pub fn is_scatter(self) -> bool {
        matches!(
            self,
            XsType::Scatter | XsType::NuScatter | XsType::ScatterFmu | XsType::NuScatterFmu
        )
    }
}

impl fmt::Display for XsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for XsType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        XsType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| Error::programming(format!("unknown cross section type '{}'", s)))
    }
}

/// Optional dimensions of a general lookup.
///
/// An absent dimension means "integrate over it": no outgoing group sums over
/// outgoing groups, no cosine integrates over angle, no delayed group sums
/// over delayed groups (or yield-averages spectra and decay constants). An
/// absent `sqrt_kt` selects the first stored temperature.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct XsQuery {
    pub gout: Option<usize>,
    pub mu: Option<f64>,
    pub dg: Option<usize>,
    pub sqrt_kt: Option<f64>,
}

impl XsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outgoing(mut self, gout: usize) -> Self {
        self.gout = Some(gout);
        self
    }

    pub fn cosine(mut self, mu: f64) -> Self {
        self.mu = Some(mu);
        self
    }

    pub fn delayed_group(mut self, dg: usize) -> Self {
        self.dg = Some(dg);
        self
    }

    pub fn at_sqrt_kt(mut self, sqrt_kt: f64) -> Self {
        self.sqrt_kt = Some(sqrt_kt);
        self
    }

    /// Check the query against the shape of the data it will be applied to.
    pub(crate) fn validate(
        &self,
        xs_type: XsType,
        gin: usize,
        num_groups: usize,
        num_delayed: usize,
    ) -> Result<()> {
        if gin >= num_groups {
            return Err(Error::programming(format!(
                "incoming group {} out of range [0, {})",
                gin, num_groups
            )));
        }
        if let Some(gout) = self.gout {
            if gout >= num_groups {
                return Err(Error::programming(format!(
                    "outgoing group {} out of range [0, {})",
                    gout, num_groups
                )));
            }
        }
        if let Some(dg) = self.dg {
            if dg >= num_delayed {
                return Err(Error::programming(format!(
                    "delayed group {} out of range [0, {})",
                    dg, num_delayed
                )));
            }
        }
        match self.mu {
            Some(mu) if !(-1.0..=1.0).contains(&mu) => {
                return Err(Error::programming(format!(
                    "scattering cosine {} outside [-1, 1]",
                    mu
                )));
            }
            None if xs_type.requires_cosine() => {
                return Err(Error::programming(format!(
                    "'{}' lookups need a scattering cosine",
                    xs_type
                )));
            }
            _ => {}
        }
        if let Some(sqrt_kt) = self.sqrt_kt {
            if !sqrt_kt.is_finite() || sqrt_kt < 0.0 {
                return Err(Error::programming(format!(
                    "invalid sqrt(kT) {}",
                    sqrt_kt
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names_round_trip() {
        for t in XsType::ALL {
            assert_eq!(t.name().parse::<XsType>().unwrap(), t);
        }
        assert!(matches!(
            "nu_fission".parse::<XsType>(),
            Err(Error::Programming(_))
        ));
    }

    #[test]
    fn test_type_serde_names() {
        let t: XsType = serde_json::from_str("\"nu-scatter-fmu\"").unwrap();
        assert_eq!(t, XsType::NuScatterFmu);
        assert_eq!(serde_json::to_string(&XsType::KappaFission).unwrap(), "\"kappa-fission\"");
    }

    #[test]
    fn test_type_classification() {
        assert!(XsType::ChiDelayed.requires_fission());
        assert!(XsType::DecayRate.requires_fission());
        assert!(!XsType::NuScatter.requires_fission());
        assert!(XsType::ScatterFmu.requires_cosine());
        assert!(!XsType::Scatter.requires_cosine());
        assert!(XsType::NuScatterFmu.is_scatter());
        assert!(!XsType::Total.is_scatter());
    }

    #[test]
    fn test_query_builder() {
        let q = XsQuery::new().outgoing(1).cosine(0.5).delayed_group(2).at_sqrt_kt(0.16);
        assert_eq!(q.gout, Some(1));
        assert_eq!(q.mu, Some(0.5));
        assert_eq!(q.dg, Some(2));
        assert_eq!(q.sqrt_kt, Some(0.16));
        assert_eq!(XsQuery::new(), XsQuery::default());
    }

    #[test]
    fn test_query_validation() {
        let q = XsQuery::new();
        assert!(q.validate(XsType::Total, 0, 2, 0).is_ok());
        assert!(q.validate(XsType::Total, 1, 2, 0).is_ok());
        assert!(q.validate(XsType::Total, 2, 2, 0).is_err());
        assert!(q.outgoing(2).validate(XsType::NuScatter, 0, 2, 0).is_err());
        assert!(q.delayed_group(0).validate(XsType::DelayedNuFission, 0, 2, 0).is_err());
        assert!(q.delayed_group(5).validate(XsType::DelayedNuFission, 0, 2, 6).is_ok());
        assert!(q.cosine(1.5).validate(XsType::Scatter, 0, 2, 0).is_err());
        assert!(q.validate(XsType::ScatterFmu, 0, 2, 0).is_err());
        assert!(q.cosine(-1.0).validate(XsType::ScatterFmu, 0, 2, 0).is_ok());
        assert!(q.at_sqrt_kt(-0.1).validate(XsType::Total, 0, 2, 0).is_err());
    }
}
