// Macroscopic multi-group cross sections of a material
use crate::error::{Error, Result};
use crate::nuclide::NuclideMgxs;
use crate::query::{XsQuery, XsType};
use crate::scatter::ScatterMatrix;
use crate::temperature::{TemperatureMethod, TemperatureSelection, TemperatureSelector};
use crate::utilities::normalize_in_place;
use crate::xs_data::XsData;

/// Material temperatures are always served by the nearest mixed sample.
const NEAREST: TemperatureSelector = TemperatureSelector::new(TemperatureMethod::Nearest, 0.0);

/// Density-weighted combination of nuclide data for one material.
///
/// Holds one mixed `XsData` per material temperature plus a packed
/// `(total, absorption, nu-fission)` table, `fast[t * G + g]`, read by
/// [`MacroMgxs::calculate_xs`].
#[derive(Debug, Clone, PartialEq)]
pub struct MacroMgxs {
    name: String,
    num_groups: usize,
    kts: Vec<f64>,
    xs: Vec<XsData>,
    fast: Vec<[f64; 3]>,
    fissionable: bool,
}

#[inline]
fn axpy(y: &mut [f64], a: f64, x: &[f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += a * xi;
    }
}

/// Mix temperature samples with the given weights (atom density times the
/// temperature blending weight).
fn mix_samples(parts: &[(&XsData, f64)], g: usize, d: usize) -> Result<XsData> {
    let scatter_parts: Vec<(&ScatterMatrix, f64)> = parts.iter().map(|(x, w)| (&x.scatter, *w)).collect();
    let scatter = ScatterMatrix::mix(&scatter_parts, g)?;
    let mut out = XsData::zeros(g, d, scatter);

    let mut decay_yield = vec![0.0; d];
    let mut decay_plain = vec![0.0; d];
    let mut decay_weight = vec![0.0; d];
    for &(x, w) in parts {
        axpy(&mut out.total, w, &x.total);
        axpy(&mut out.absorption, w, &x.absorption);
        axpy(&mut out.fission, w, &x.fission);
        axpy(&mut out.kappa_fission, w, &x.kappa_fission);
        axpy(&mut out.nu_fission, w, &x.nu_fission);
        axpy(&mut out.prompt_nu_fission, w, &x.prompt_nu_fission);
        axpy(&mut out.delayed_nu_fission, w, &x.delayed_nu_fission);

        for gin in 0..g {
            out.inverse_velocity[gin] += w * x.total[gin] * x.inverse_velocity[gin];

            let row = gin * g..(gin + 1) * g;
            axpy(&mut out.chi_prompt[row.clone()], w * x.prompt_nu_fission[gin], &x.chi_prompt[row]);
            for dg in 0..d {
                let row = (dg * g + gin) * g..(dg * g + gin + 1) * g;
                axpy(
                    &mut out.chi_delayed[row.clone()],
                    w * x.delayed_nu_fission[dg * g + gin],
                    &x.chi_delayed[row],
                );
            }
        }
        for dg in 0..d {
            let produced: f64 = x.delayed_nu_fission[dg * g..(dg + 1) * g].iter().sum();
            decay_yield[dg] += w * produced;
            out.decay_rate[dg] += w * produced * x.decay_rate[dg];
            if x.decay_rate[dg] > 0.0 {
                decay_plain[dg] += w * x.decay_rate[dg];
                decay_weight[dg] += w;
            }
        }
    }

    for gin in 0..g {
        out.inverse_velocity[gin] = if out.total[gin] > 0.0 {
            out.inverse_velocity[gin] / out.total[gin]
        } else {
            0.0
        };
    }
    for row in out.chi_prompt.chunks_mut(g) {
        normalize_in_place(row);
    }
    for row in out.chi_delayed.chunks_mut(g) {
        normalize_in_place(row);
    }
    for dg in 0..d {
        out.decay_rate[dg] = if decay_yield[dg] > 0.0 {
            out.decay_rate[dg] / decay_yield[dg]
        } else if decay_weight[dg] > 0.0 {
            decay_plain[dg] / decay_weight[dg]
        } else {
            0.0
        };
    }
    Ok(out)
}

impl MacroMgxs {
    /// Combine `constituents` (nuclide, atom density) at each material
    /// temperature in `kts` (eV). Each nuclide contributes the sample(s)
    /// `selector` picks for that temperature.
    pub fn mix(
        name: impl Into<String>,
        constituents: &[(&NuclideMgxs, f64)],
        kts: &[f64],
        selector: &TemperatureSelector,
    ) -> Result<Self> {
        let name = name.into();
        let Some((first, _)) = constituents.first() else {
            return Err(Error::config(format!("material '{}' has no nuclides", name)));
        };
        if kts.is_empty() {
            return Err(Error::config(format!("material '{}' has no temperature", name)));
        }
        let g = first.num_groups();
        let d = first.num_delayed();
        if let Some((odd, _)) = constituents
            .iter()
            .find(|(n, _)| n.num_groups() != g || n.num_delayed() != d)
        {
            return Err(Error::config(format!(
                "nuclide '{}' in material '{}' does not match the group structure of '{}'",
                odd.name(),
                name,
                first.name()
            )));
        }

        let mut sorted = kts.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted.dedup();

        let mut xs = Vec::with_capacity(sorted.len());
        for &kt in &sorted {
            let mut parts = Vec::with_capacity(constituents.len() * 2);
            for &(nuclide, density) in constituents {
                for (i, w) in nuclide.select(selector, Some(kt.sqrt())).weights() {
                    parts.push((nuclide.xs(i), density * w));
                }
            }
            xs.push(mix_samples(&parts, g, d).map_err(|e| match e {
                Error::Configuration(msg) => {
                    Error::config(format!("material '{}': {}", name, msg))
                }
                other => other,
            })?);
        }

        let fissionable = constituents.iter().any(|(n, _)| n.has_fission_data());
        let fast = xs
            .iter()
            .flat_map(|x| {
                (0..g).map(move |gin| {
                    let nu_fission = if fissionable { x.nu_fission[gin] } else { 0.0 };
                    [x.total[gin], x.absorption[gin], nu_fission]
                })
            })
            .collect();

        log::debug!(
            "mixed material '{}' from {} nuclide(s) at {} temperature(s)",
            name,
            constituents.len(),
            sorted.len()
        );
        Ok(Self {
            name,
            num_groups: g,
            kts: sorted,
            xs,
            fast,
            fissionable,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_delayed(&self) -> usize {
        self.xs[0].num_delayed()
    }

    /// Material temperatures (kT in eV), ascending.
    pub fn kts(&self) -> &[f64] {
        &self.kts
    }

    pub fn xs(&self, i: usize) -> &XsData {
        &self.xs[i]
    }

    pub fn fissionable(&self) -> bool {
        self.fissionable
    }

    /// Index of the material temperature nearest to `sqrt_kt`.
    #[inline]
    pub fn temperature_index(&self, sqrt_kt: f64) -> usize {
        match NEAREST.select(&self.kts, sqrt_kt) {
            TemperatureSelection::Single(i) => i,
            TemperatureSelection::Bracket { lower, .. } => lower,
        }
    }

    /// Total, absorption and nu-fission for the transport hot path.
    ///
    /// # Panics
    /// Panics if `gin` is not a valid group.
    #[inline]
    pub fn calculate_xs(&self, gin: usize, sqrt_kt: f64) -> (f64, f64, f64) {
        assert!(
            gin < self.num_groups,
            "incoming group {} out of range [0, {})",
            gin,
            self.num_groups
        );
        let [total, absorption, nu_fission] = self.fast[self.temperature_index(sqrt_kt) * self.num_groups + gin];
        (total, absorption, nu_fission)
    }

    pub fn get_xs(&self, xs_type: XsType, gin: usize, query: &XsQuery) -> Result<f64> {
        query.validate(xs_type, gin, self.num_groups, self.num_delayed())?;
        if xs_type.requires_fission() && !self.fissionable {
            return Err(Error::programming(format!(
                "'{}' requested from non-fissionable material '{}'",
                xs_type, self.name
            )));
        }
        let t = query.sqrt_kt.map_or(0, |s| self.temperature_index(s));
        Ok(self.xs[t].value(xs_type, gin, query))
    }
}
