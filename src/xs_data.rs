// Group-wise cross section data for a single temperature
use crate::error::{Error, Result};
use crate::library::{Dataset, TemperatureRecord};
use crate::query::{XsQuery, XsType};
use crate::scatter::{ScatterFormat, ScatterMatrix};
use crate::utilities::normalize_in_place;

/// Shape information a temperature record is validated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataLayout {
    pub num_groups: usize,
    pub num_delayed: usize,
    pub fissionable: bool,
    pub scatter_format: ScatterFormat,
    /// Coefficients stored per scattering transfer.
    pub n_coeffs: usize,
}

/// Multi-group data of one nuclide (or material) at one temperature.
///
/// Group arrays are indexed by incoming group. Flattened layouts:
/// * `delayed_nu_fission[d * G + g]`
/// * `chi_prompt[gin * G + gout]`
/// * `chi_delayed[(d * G + gin) * G + gout]`
#[derive(Debug, Clone, PartialEq)]
pub struct XsData {
    pub(crate) num_groups: usize,
    pub(crate) num_delayed: usize,
    pub(crate) total: Vec<f64>,
    pub(crate) absorption: Vec<f64>,
    pub(crate) fission: Vec<f64>,
    pub(crate) kappa_fission: Vec<f64>,
    pub(crate) nu_fission: Vec<f64>,
    pub(crate) prompt_nu_fission: Vec<f64>,
    pub(crate) delayed_nu_fission: Vec<f64>,
    pub(crate) chi_prompt: Vec<f64>,
    pub(crate) chi_delayed: Vec<f64>,
    pub(crate) decay_rate: Vec<f64>,
    pub(crate) inverse_velocity: Vec<f64>,
    pub(crate) scatter: ScatterMatrix,
}

/// Validate a group-shaped dataset: expected length, finite, non-negative.
fn checked(name: &str, data: &[f64], expected: usize) -> Result<Vec<f64>> {
    if data.len() != expected {
        return Err(Error::data(format!(
            "'{}' has {} entries, expected {}",
            name,
            data.len(),
            expected
        )));
    }
    if data.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(Error::data(format!(
            "'{}' contains negative or non-finite values",
            name
        )));
    }
    Ok(data.to_vec())
}

impl XsData {
    /// Convert one library temperature record into validated group data.
    pub fn from_record(record: &TemperatureRecord, layout: &DataLayout) -> Result<Self> {
        let g = layout.num_groups;
        let d = layout.num_delayed;

        let absorption = record
            .absorption
            .as_deref()
            .ok_or_else(|| Error::data("missing 'absorption' dataset"))
            .and_then(|a| checked("absorption", a, g))?;

        let scatter_record = record
            .scatter_data
            .as_ref()
            .ok_or_else(|| Error::data("missing 'scatter_data' group"))?;
        let scatter = ScatterMatrix::from_library(
            layout.scatter_format,
            layout.n_coeffs,
            g,
            &scatter_record.g_min,
            &scatter_record.g_max,
            &scatter_record.scatter_matrix,
            scatter_record.multiplicity_matrix.as_deref(),
        )?;

        let total = match record.total.as_deref() {
            Some(t) => checked("total", t, g)?,
            None => (0..g).map(|gin| absorption[gin] + scatter.scatter(gin)).collect(),
        };

        let inverse_velocity = match record.inverse_velocity.as_deref() {
            Some(v) => checked("inverse-velocity", v, g)?,
            None => vec![0.0; g],
        };

        let mut data = XsData {
            num_groups: g,
            num_delayed: d,
            total,
            absorption,
            fission: vec![0.0; g],
            kappa_fission: vec![0.0; g],
            nu_fission: vec![0.0; g],
            prompt_nu_fission: vec![0.0; g],
            delayed_nu_fission: vec![0.0; d * g],
            chi_prompt: vec![0.0; g * g],
            chi_delayed: vec![0.0; d * g * g],
            decay_rate: vec![0.0; d],
            inverse_velocity,
            scatter,
        };
        if layout.fissionable {
            data.read_fission(record)?;
        }
        Ok(data)
    }

    fn read_fission(&mut self, record: &TemperatureRecord) -> Result<()> {
        let g = self.num_groups;
        let d = self.num_delayed;

        if let Some(f) = record.fission.as_deref() {
            self.fission = checked("fission", f, g)?;
        }
        if let Some(k) = record.kappa_fission.as_deref() {
            self.kappa_fission = checked("kappa-fission", k, g)?;
        }
        if let Some(rate) = record.decay_rate.as_deref() {
            self.decay_rate = checked("decay-rate", rate, d)?;
        }

        // nu-fission comes either as a vector (with chi) or as a full
        // group-to-group production matrix
        let mut matrix_chi: Option<Vec<f64>> = None;
        let nu_fission: Option<Vec<f64>> = match record.nu_fission.as_ref() {
            None => None,
            Some(ds) => match group_shape("nu-fission", ds, g)? {
                GroupShape::Vector => Some(checked("nu-fission", ds.values(), g)?),
                GroupShape::Matrix => {
                    let m = checked("nu-fission", ds.values(), g * g)?;
                    let rows: Vec<f64> = m.chunks(g).map(|row| row.iter().sum::<f64>()).collect();
                    matrix_chi = Some(m);
                    Some(rows)
                }
            },
        };
        let prompt: Option<Vec<f64>> = record
            .prompt_nu_fission
            .as_deref()
            .map(|p| checked("prompt-nu-fission", p, g))
            .transpose()?;

        let delayed: Vec<f64> = match (record.delayed_nu_fission.as_deref(), record.beta.as_ref()) {
            (Some(dnf), _) => checked("delayed-nu-fission", dnf, d * g)?,
            (None, Some(beta)) => {
                let nu = nu_fission.as_ref().ok_or_else(|| {
                    Error::data("'beta' requires a 'nu-fission' dataset")
                })?;
                match beta.shape() {
                    [n] if *n == d => {
                        let beta = checked("beta", beta.values(), d)?;
                        (0..d * g).map(|i| beta[i / g] * nu[i % g]).collect()
                    }
                    [n] if *n == d * g => {
                        let beta = checked("beta", beta.values(), d * g)?;
                        (0..d * g).map(|i| beta[i] * nu[i % g]).collect()
                    }
                    [a, b] if *a == d && *b == g => {
                        let beta = checked("beta", beta.values(), d * g)?;
                        (0..d * g).map(|i| beta[i] * nu[i % g]).collect()
                    }
                    shape => {
                        return Err(Error::data(format!(
                            "'beta' has shape {:?}, expected [{}] or [{}, {}]",
                            shape, d, d, g
                        )))
                    }
                }
            }
            (None, None) => vec![0.0; d * g],
        };
        let delayed_sum = |gin: usize| (0..d).map(|dg| delayed[dg * g + gin]).sum::<f64>();

        let (nu_fission, prompt) = match (nu_fission, prompt) {
            (Some(nu), Some(p)) => (nu, p),
            (Some(nu), None) => {
                let mut p = Vec::with_capacity(g);
                for gin in 0..g {
                    let value = nu[gin] - delayed_sum(gin);
                    if value < -1e-12 * nu[gin].max(1.0) {
                        return Err(Error::data(format!(
                            "delayed nu-fission exceeds nu-fission in group {}",
                            gin
                        )));
                    }
                    p.push(value.max(0.0));
                }
                (nu, p)
            }
            (None, Some(p)) => ((0..g).map(|gin| p[gin] + delayed_sum(gin)).collect(), p),
            (None, None) => {
                return Err(Error::data(
                    "fissionable data needs 'nu-fission' or 'prompt-nu-fission'",
                ))
            }
        };

        let mut chi_prompt = match (record.chi_prompt.as_ref(), matrix_chi, record.chi.as_ref()) {
            (Some(c), _, _) => broadcast_spectrum("chi-prompt", c, g)?,
            (None, Some(m), _) => m,
            (None, None, Some(c)) => broadcast_spectrum("chi", c, g)?,
            (None, None, None) => {
                return Err(Error::data(
                    "fissionable data needs 'chi', 'chi-prompt' or a nu-fission matrix",
                ))
            }
        };
        for row in chi_prompt.chunks_mut(g) {
            normalize_in_place(row);
        }

        let mut chi_delayed = match record.chi_delayed.as_ref() {
            None => chi_prompt.repeat(d),
            Some(ds) => delayed_spectra(ds, g, d)?,
        };
        for row in chi_delayed.chunks_mut(g) {
            normalize_in_place(row);
        }

        self.nu_fission = nu_fission;
        self.prompt_nu_fission = prompt;
        self.delayed_nu_fission = delayed;
        self.chi_prompt = chi_prompt;
        self.chi_delayed = chi_delayed;
        Ok(())
    }

    /// Zeroed data with the given shape, used as a mixing accumulator.
    pub(crate) fn zeros(num_groups: usize, num_delayed: usize, scatter: ScatterMatrix) -> Self {
        let g = num_groups;
        let d = num_delayed;
        XsData {
            num_groups: g,
            num_delayed: d,
            total: vec![0.0; g],
            absorption: vec![0.0; g],
            fission: vec![0.0; g],
            kappa_fission: vec![0.0; g],
            nu_fission: vec![0.0; g],
            prompt_nu_fission: vec![0.0; g],
            delayed_nu_fission: vec![0.0; d * g],
            chi_prompt: vec![0.0; g * g],
            chi_delayed: vec![0.0; d * g * g],
            decay_rate: vec![0.0; d],
            inverse_velocity: vec![0.0; g],
            scatter,
        }
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_delayed(&self) -> usize {
        self.num_delayed
    }

    pub fn total(&self) -> &[f64] {
        &self.total
    }

    pub fn absorption(&self) -> &[f64] {
        &self.absorption
    }

    pub fn fission(&self) -> &[f64] {
        &self.fission
    }

    pub fn nu_fission(&self) -> &[f64] {
        &self.nu_fission
    }

    pub fn scatter(&self) -> &ScatterMatrix {
        &self.scatter
    }

    /// True if any group carries fission or fission-production data.
    pub fn has_fission_data(&self) -> bool {
        self.fission.iter().chain(&self.nu_fission).any(|v| *v > 0.0)
    }

    #[inline]
    fn chi_p(&self, gin: usize, gout: usize) -> f64 {
        self.chi_prompt[gin * self.num_groups + gout]
    }

    #[inline]
    fn chi_d(&self, dg: usize, gin: usize, gout: usize) -> f64 {
        self.chi_delayed[(dg * self.num_groups + gin) * self.num_groups + gout]
    }

    #[inline]
    fn dnf(&self, dg: usize, gin: usize) -> f64 {
        self.delayed_nu_fission[dg * self.num_groups + gin]
    }

    /// Delayed spectrum of `dg`, summed over outgoing groups unless one is
    /// given.
    fn chi_d_query(&self, dg: usize, gin: usize, gout: Option<usize>) -> f64 {
        match gout {
            Some(go) => self.chi_d(dg, gin, go),
            None => (0..self.num_groups).map(|go| self.chi_d(dg, gin, go)).sum(),
        }
    }

    /// Evaluate a general lookup. The query must already be validated
    /// against this data's shape.
    pub(crate) fn value(&self, xs_type: XsType, gin: usize, query: &XsQuery) -> f64 {
        let g = self.num_groups;
        let d = self.num_delayed;
        match xs_type {
            XsType::Total => self.total[gin],
            XsType::Absorption => self.absorption[gin],
            XsType::InverseVelocity => self.inverse_velocity[gin],
            XsType::Fission => self.fission[gin],
            XsType::KappaFission => self.kappa_fission[gin],
            XsType::Scatter | XsType::ScatterFmu => {
                self.scatter.value(gin, query.gout, query.mu, false)
            }
            XsType::NuScatter | XsType::NuScatterFmu => {
                self.scatter.value(gin, query.gout, query.mu, true)
            }
            XsType::PromptNuFission => match query.gout {
                Some(gout) => self.prompt_nu_fission[gin] * self.chi_p(gin, gout),
                None => self.prompt_nu_fission[gin],
            },
            XsType::DelayedNuFission => {
                let one = |dg: usize| match query.gout {
                    Some(gout) => self.dnf(dg, gin) * self.chi_d(dg, gin, gout),
                    None => self.dnf(dg, gin),
                };
                match query.dg {
                    Some(dg) => one(dg),
                    None => (0..d).map(one).sum(),
                }
            }
            XsType::NuFission => match query.gout {
                Some(gout) => {
                    self.prompt_nu_fission[gin] * self.chi_p(gin, gout)
                        + (0..d)
                            .map(|dg| self.dnf(dg, gin) * self.chi_d(dg, gin, gout))
                            .sum::<f64>()
                }
                None => self.nu_fission[gin],
            },
            XsType::ChiPrompt => match query.gout {
                Some(gout) => self.chi_p(gin, gout),
                None => (0..g).map(|gout| self.chi_p(gin, gout)).sum(),
            },
            XsType::ChiDelayed => match query.dg {
                Some(dg) => self.chi_d_query(dg, gin, query.gout),
                None => {
                    let yield_sum: f64 = (0..d).map(|dg| self.dnf(dg, gin)).sum();
                    if yield_sum > 0.0 {
                        (0..d)
                            .map(|dg| self.dnf(dg, gin) * self.chi_d_query(dg, gin, query.gout))
                            .sum::<f64>()
                            / yield_sum
                    } else {
                        0.0
                    }
                }
            },
            XsType::DecayRate => match query.dg {
                Some(dg) => self.decay_rate[dg],
                None => {
                    let yield_sum: f64 = (0..d).map(|dg| self.dnf(dg, gin)).sum();
                    if yield_sum > 0.0 {
                        (0..d)
                            .map(|dg| self.dnf(dg, gin) * self.decay_rate[dg])
                            .sum::<f64>()
                            / yield_sum
                    } else {
                        0.0
                    }
                }
            },
        }
    }
}

enum GroupShape {
    Vector,
    Matrix,
}

/// Classify a [G] or [G][G] dataset. A flat list of G * G values is the
/// matrix stored row by row.
fn group_shape(name: &str, ds: &Dataset, g: usize) -> Result<GroupShape> {
    match ds.shape() {
        [n] if *n == g => Ok(GroupShape::Vector),
        [n] if *n == g * g => Ok(GroupShape::Matrix),
        [a, b] if *a == g && *b == g => Ok(GroupShape::Matrix),
        shape => Err(Error::data(format!(
            "'{}' has shape {:?}, expected [{}] or [{}, {}]",
            name, shape, g, g, g
        ))),
    }
}

/// Expand a spectrum given as [G] (same for every incoming group) or
/// [G][G] (per incoming group) to the [G x G] layout.
fn broadcast_spectrum(name: &str, ds: &Dataset, g: usize) -> Result<Vec<f64>> {
    match group_shape(name, ds, g)? {
        GroupShape::Vector => Ok(checked(name, ds.values(), g)?.repeat(g)),
        GroupShape::Matrix => checked(name, ds.values(), g * g),
    }
}

/// Expand `chi-delayed` to the [D x G x G] layout.
///
/// Accepted shapes: [G] shared by everything, [D][G] one spectrum per
/// delayed group, [G][G] one spectrum per incoming group shared by the
/// delayed groups, and the full [D][G][G]. With D == G a two-dimensional
/// dataset is read as [D][G]; a flat list of D * G values cannot be told
/// apart from [G][G] and is rejected.
fn delayed_spectra(ds: &Dataset, g: usize, d: usize) -> Result<Vec<f64>> {
    const NAME: &str = "chi-delayed";
    let per_delayed = |values: &[f64]| -> Result<Vec<f64>> {
        let c = checked(NAME, values, d * g)?;
        Ok(c.chunks(g).flat_map(|spectrum| spectrum.repeat(g)).collect())
    };
    let per_incoming = |values: &[f64]| -> Result<Vec<f64>> { Ok(checked(NAME, values, g * g)?.repeat(d)) };

    match ds.shape() {
        [n] if *n == g => Ok(checked(NAME, ds.values(), g)?.repeat(g * d)),
        [n] if *n == d * g && d == g => Err(Error::data(format!(
            "flat '{}' of {} values is ambiguous with {} delayed and {} energy groups; store it nested as [D][G] or [D][G][G]",
            NAME, n, d, g
        ))),
        [n] if *n == d * g => per_delayed(ds.values()),
        [n] if *n == g * g => per_incoming(ds.values()),
        [n] if *n == d * g * g => checked(NAME, ds.values(), d * g * g),
        [a, b] if *a == d && *b == g => per_delayed(ds.values()),
        [a, b] if *a == g && *b == g => per_incoming(ds.values()),
        [a, b, c] if *a == d && *b == g && *c == g => checked(NAME, ds.values(), d * g * g),
        shape => Err(Error::data(format!(
            "'{}' has shape {:?}; expected [{g}], [{d}, {g}], [{g}, {g}] or [{d}, {g}, {g}]",
            NAME,
            shape,
            g = g,
            d = d
        ))),
    }
}
