// Scattering transfer data: sparse group-to-group matrix with angular moments
use crate::error::{Error, Result};
use crate::utilities::legendre_series;
use serde::{Deserialize, Serialize};

/// How the angular dependence of each group-to-group transfer is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScatterFormat {
    /// Legendre moments P0..PL of the transfer cross section.
    Legendre,
    /// Equal-width bins in the scattering cosine over [-1, 1].
    Histogram,
}

impl ScatterFormat {
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "legendre" => Ok(ScatterFormat::Legendre),
            "histogram" => Ok(ScatterFormat::Histogram),
            other => Err(Error::data(format!(
                "unsupported scatter_format '{}' (expected legendre or histogram)",
                other
            ))),
        }
    }

    /// Number of stored coefficients per transfer for a library `order`
    /// attribute: L + 1 Legendre moments, or `order` histogram bins.
    pub fn coefficients_for_order(self, order: usize) -> usize {
        match self {
            ScatterFormat::Legendre => order + 1,
            ScatterFormat::Histogram => order,
        }
    }
}

/// Sparse scattering transfer table for one temperature.
///
/// For every incoming group only the contiguous outgoing range
/// `gmin..=gmax` is stored. Each (gin, gout) entry holds `n_coeffs`
/// coefficients of the nu-scatter transfer cross section and the scattering
/// multiplicity (nu-scatter / scatter) of that transfer.
///
/// `nu_scatter[gin]` is the row sum of p0 over outgoing groups, where p0 is
/// the Legendre P0 moment or the sum of all histogram bins. `scatter[gin]`
/// is the same sum with multiplicity divided out.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterMatrix {
    format: ScatterFormat,
    n_coeffs: usize,
    gmin: Vec<usize>,
    gmax: Vec<usize>,
    /// First transfer slot of each incoming row.
    offsets: Vec<usize>,
    coeffs: Vec<f64>,
    mult: Vec<f64>,
    nu_scatter: Vec<f64>,
    scatter: Vec<f64>,
}

impl ScatterMatrix {
    /// Build the table from flattened library arrays.
    ///
    /// `g_min`/`g_max` are 1-based inclusive bounds per incoming group.
    /// `matrix` is ordered gin-major, then gout, then coefficient;
    /// `multiplicity` (if present) has one value per stored transfer.
    pub fn from_library(
        format: ScatterFormat,
        n_coeffs: usize,
        num_groups: usize,
        g_min: &[i64],
        g_max: &[i64],
        matrix: &[f64],
        multiplicity: Option<&[f64]>,
    ) -> Result<Self> {
        if n_coeffs == 0 {
            return Err(Error::data("scattering data needs at least one coefficient"));
        }
        if g_min.len() != num_groups || g_max.len() != num_groups {
            return Err(Error::data(format!(
                "g_min/g_max have {}/{} entries, expected {}",
                g_min.len(),
                g_max.len(),
                num_groups
            )));
        }

        let mut gmin = Vec::with_capacity(num_groups);
        let mut gmax = Vec::with_capacity(num_groups);
        for gin in 0..num_groups {
            let (lo, hi) = (g_min[gin], g_max[gin]);
            if lo < 1 || hi < lo || hi as usize > num_groups {
                return Err(Error::data(format!(
                    "invalid outgoing range [{}, {}] for incoming group {} (1-based, {} groups)",
                    lo,
                    hi,
                    gin + 1,
                    num_groups
                )));
            }
            gmin.push((lo - 1) as usize);
            gmax.push((hi - 1) as usize);
        }

        let mut out = Self::zeros(format, n_coeffs, gmin, gmax);
        if matrix.len() != out.coeffs.len() {
            return Err(Error::data(format!(
                "scatter_matrix has {} entries, expected {}",
                matrix.len(),
                out.coeffs.len()
            )));
        }
        out.coeffs.copy_from_slice(matrix);

        if let Some(mult) = multiplicity {
            if mult.len() != out.mult.len() {
                return Err(Error::data(format!(
                    "multiplicity_matrix has {} entries, expected {}",
                    mult.len(),
                    out.mult.len()
                )));
            }
            if mult.iter().any(|m| !m.is_finite() || *m <= 0.0) {
                return Err(Error::data("multiplicity_matrix values must be positive"));
            }
            out.mult.copy_from_slice(mult);
        }

        if out.coeffs.iter().any(|c| !c.is_finite()) {
            return Err(Error::data("scatter_matrix contains non-finite values"));
        }
        for slot in 0..out.mult.len() {
            let c = &out.coeffs[slot * n_coeffs..(slot + 1) * n_coeffs];
            let negative = match format {
                ScatterFormat::Legendre => c[0] < 0.0,
                ScatterFormat::Histogram => c.iter().any(|v| *v < 0.0),
            };
            if negative {
                return Err(Error::data("scatter_matrix has negative transfer probability"));
            }
        }

        out.finalize();
        Ok(out)
    }

    fn zeros(format: ScatterFormat, n_coeffs: usize, gmin: Vec<usize>, gmax: Vec<usize>) -> Self {
        let mut offsets = Vec::with_capacity(gmin.len());
        let mut slots = 0usize;
        for (lo, hi) in gmin.iter().zip(&gmax) {
            offsets.push(slots);
            slots += hi - lo + 1;
        }
        let num_groups = gmin.len();
        Self {
            format,
            n_coeffs,
            gmin,
            gmax,
            offsets,
            coeffs: vec![0.0; slots * n_coeffs],
            mult: vec![1.0; slots],
            nu_scatter: vec![0.0; num_groups],
            scatter: vec![0.0; num_groups],
        }
    }

    fn finalize(&mut self) {
        for gin in 0..self.gmin.len() {
            let mut nu = 0.0;
            let mut plain = 0.0;
            for gout in self.gmin[gin]..=self.gmax[gin] {
                let slot = self.slot(gin, gout);
                let p0 = self.p0_at(slot);
                nu += p0;
                plain += p0 / self.mult[slot];
            }
            self.nu_scatter[gin] = nu;
            self.scatter[gin] = plain;
        }
    }

    #[inline]
    fn slot(&self, gin: usize, gout: usize) -> usize {
        self.offsets[gin] + gout - self.gmin[gin]
    }

    #[inline]
    fn p0_at(&self, slot: usize) -> f64 {
        let c = &self.coeffs[slot * self.n_coeffs..(slot + 1) * self.n_coeffs];
        match self.format {
            ScatterFormat::Legendre => c[0],
            ScatterFormat::Histogram => c.iter().sum(),
        }
    }

    pub fn format(&self) -> ScatterFormat {
        self.format
    }

    pub fn n_coeffs(&self) -> usize {
        self.n_coeffs
    }

    pub fn num_groups(&self) -> usize {
        self.gmin.len()
    }

    /// Inclusive outgoing group range stored for `gin`.
    pub fn outgoing_range(&self, gin: usize) -> (usize, usize) {
        (self.gmin[gin], self.gmax[gin])
    }

    /// Coefficients of one transfer, `None` outside the stored range.
    pub fn coeffs(&self, gin: usize, gout: usize) -> Option<&[f64]> {
        if gout < self.gmin[gin] || gout > self.gmax[gin] {
            return None;
        }
        let slot = self.slot(gin, gout);
        Some(&self.coeffs[slot * self.n_coeffs..(slot + 1) * self.n_coeffs])
    }

    /// Angle-integrated nu-scatter transfer cross section.
    pub fn p0(&self, gin: usize, gout: usize) -> f64 {
        if gout < self.gmin[gin] || gout > self.gmax[gin] {
            return 0.0;
        }
        self.p0_at(self.slot(gin, gout))
    }

    /// Scattering multiplicity of a transfer (1 outside the stored range).
    pub fn multiplicity(&self, gin: usize, gout: usize) -> f64 {
        if gout < self.gmin[gin] || gout > self.gmax[gin] {
            return 1.0;
        }
        self.mult[self.slot(gin, gout)]
    }

    /// Total nu-scatter cross section of an incoming group.
    pub fn nu_scatter(&self, gin: usize) -> f64 {
        self.nu_scatter[gin]
    }

    /// Total scatter cross section (multiplicity removed) of an incoming group.
    pub fn scatter(&self, gin: usize) -> f64 {
        self.scatter[gin]
    }

    /// Normalized angular density f(mu) of a transfer; integrates to one over
    /// [-1, 1] whenever the transfer is nonzero.
    pub fn angular_density(&self, gin: usize, gout: usize, mu: f64) -> f64 {
        let Some(c) = self.coeffs(gin, gout) else {
            return 0.0;
        };
        match self.format {
            ScatterFormat::Legendre => {
                if c[0] > 0.0 {
                    legendre_series(c, mu) / c[0]
                } else {
                    0.0
                }
            }
            ScatterFormat::Histogram => {
                let total: f64 = c.iter().sum();
                if total <= 0.0 {
                    return 0.0;
                }
                let n = c.len();
                let dmu = 2.0 / n as f64;
                let bin = (((mu + 1.0) / dmu).floor().max(0.0) as usize).min(n - 1);
                c[bin] / total / dmu
            }
        }
    }

    /// Scatter-family lookup.
    ///
    /// Sums over the stored outgoing groups (or only `gout`) of the
    /// transfer cross section, with multiplicity divided out unless
    /// `include_multiplicity`, weighted by f(mu) when a cosine is given.
    pub fn value(
        &self,
        gin: usize,
        gout: Option<usize>,
        mu: Option<f64>,
        include_multiplicity: bool,
    ) -> f64 {
        let term = |g: usize| {
            let slot = self.slot(gin, g);
            let mut v = self.p0_at(slot);
            if !include_multiplicity {
                v /= self.mult[slot];
            }
            if let Some(mu) = mu {
                v *= self.angular_density(gin, g, mu);
            }
            v
        };
        match (gout, mu) {
            (Some(g), _) => {
                if g < self.gmin[gin] || g > self.gmax[gin] {
                    0.0
                } else {
                    term(g)
                }
            }
            (None, None) if include_multiplicity => self.nu_scatter[gin],
            (None, None) => self.scatter[gin],
            (None, Some(_)) => (self.gmin[gin]..=self.gmax[gin]).map(term).sum(),
        }
    }

    /// Density-weighted mixture of several tables on the same group count.
    ///
    /// Outgoing ranges become the union of the constituents' ranges and
    /// Legendre orders are padded to the largest one. Histogram tables must
    /// share their bin count, and formats cannot be mixed.
    pub fn mix(parts: &[(&ScatterMatrix, f64)], num_groups: usize) -> Result<Self> {
        let Some((first, _)) = parts.first() else {
            return Err(Error::config("cannot mix scattering data of an empty composition"));
        };
        let format = first.format;
        let mut n_coeffs = first.n_coeffs;
        for (m, _) in parts {
            if m.format != format {
                return Err(Error::config(
                    "cannot mix nuclides with legendre and histogram scattering",
                ));
            }
            if m.num_groups() != num_groups {
                return Err(Error::config(format!(
                    "scattering data has {} groups, expected {}",
                    m.num_groups(),
                    num_groups
                )));
            }
            match format {
                ScatterFormat::Legendre => n_coeffs = n_coeffs.max(m.n_coeffs),
                ScatterFormat::Histogram if m.n_coeffs != n_coeffs => {
                    return Err(Error::config(format!(
                        "cannot mix histogram scattering with {} and {} bins",
                        n_coeffs, m.n_coeffs
                    )));
                }
                ScatterFormat::Histogram => {}
            }
        }

        let gmin: Vec<usize> = (0..num_groups)
            .map(|g| parts.iter().map(|(m, _)| m.gmin[g]).min().unwrap_or(g))
            .collect();
        let gmax: Vec<usize> = (0..num_groups)
            .map(|g| parts.iter().map(|(m, _)| m.gmax[g]).max().unwrap_or(g))
            .collect();

        let mut out = Self::zeros(format, n_coeffs, gmin, gmax);
        let mut plain = vec![0.0; out.mult.len()];
        for (m, density) in parts {
            for gin in 0..num_groups {
                for gout in m.gmin[gin]..=m.gmax[gin] {
                    let src = m.slot(gin, gout);
                    let dst = out.slot(gin, gout);
                    let src_c = &m.coeffs[src * m.n_coeffs..(src + 1) * m.n_coeffs];
                    let dst_c = &mut out.coeffs[dst * n_coeffs..dst * n_coeffs + m.n_coeffs];
                    for (d, s) in dst_c.iter_mut().zip(src_c) {
                        *d += density * s;
                    }
                    plain[dst] += density * m.p0_at(src) / m.mult[src];
                }
            }
        }
        for slot in 0..out.mult.len() {
            let nu = out.p0_at(slot);
            out.mult[slot] = if plain[slot] > 0.0 { nu / plain[slot] } else { 1.0 };
        }
        out.finalize();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Two groups, P1 Legendre, full 2x2 transfer.
    fn p1_matrix() -> ScatterMatrix {
        ScatterMatrix::from_library(
            ScatterFormat::Legendre,
            2,
            2,
            &[1, 1],
            &[2, 2],
            &[
                0.6, 0.1, 0.2, 0.0, // gin 0 -> gout 0, 1
                0.0, 0.0, 1.5, 0.3, // gin 1 -> gout 0, 1
            ],
            Some(&[1.0, 2.0, 1.0, 1.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_row_sums_match_total_scatter() {
        let m = p1_matrix();
        for gin in 0..2 {
            let row: f64 = (0..2).map(|g| m.p0(gin, g)).sum();
            assert_abs_diff_eq!(row, m.nu_scatter(gin), epsilon = 1e-14);
        }
        assert_abs_diff_eq!(m.nu_scatter(0), 0.8, epsilon = 1e-14);
        // the 0 -> 1 transfer has multiplicity 2
        assert_abs_diff_eq!(m.scatter(0), 0.6 + 0.1, epsilon = 1e-14);
    }

    #[test]
    fn test_value_variants() {
        let m = p1_matrix();
        assert_abs_diff_eq!(m.value(0, None, None, true), 0.8, epsilon = 1e-14);
        assert_abs_diff_eq!(m.value(0, Some(1), None, true), 0.2, epsilon = 1e-14);
        assert_abs_diff_eq!(m.value(0, Some(1), None, false), 0.1, epsilon = 1e-14);
        // isotropic transfer (P1 = 0) has density 1/2
        assert_abs_diff_eq!(m.value(0, Some(1), Some(0.9), true), 0.1, epsilon = 1e-14);
        // integrating the cosine-resolved value over gout at mu
        let mu = 0.4;
        let expected = 0.6 * m.angular_density(0, 0, mu) + 0.2 * m.angular_density(0, 1, mu);
        assert_abs_diff_eq!(m.value(0, None, Some(mu), true), expected, epsilon = 1e-14);
    }

    #[test]
    fn test_legendre_density_integrates_to_one() {
        let m = p1_matrix();
        let n = 2000;
        let dmu = 2.0 / n as f64;
        let integral: f64 = (0..n)
            .map(|i| m.angular_density(1, 1, -1.0 + (i as f64 + 0.5) * dmu) * dmu)
            .sum();
        assert_abs_diff_eq!(integral, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_histogram_density() {
        let m = ScatterMatrix::from_library(
            ScatterFormat::Histogram,
            4,
            1,
            &[1],
            &[1],
            &[0.0, 1.0, 1.0, 2.0],
            None,
        )
        .unwrap();
        assert_abs_diff_eq!(m.nu_scatter(0), 4.0, epsilon = 1e-14);
        // bin width 0.5; last bin holds half of the probability
        assert_abs_diff_eq!(m.angular_density(0, 0, 0.9), 0.5 / 0.5, epsilon = 1e-14);
        assert_abs_diff_eq!(m.angular_density(0, 0, -0.9), 0.0, epsilon = 1e-14);
        assert_abs_diff_eq!(m.angular_density(0, 0, 1.0), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_sparse_rows_and_out_of_range_outgoing() {
        // gin 0 scatters only into group 1 and 2 (1-based 2..3)
        let m = ScatterMatrix::from_library(
            ScatterFormat::Legendre,
            1,
            3,
            &[2, 2, 3],
            &[3, 2, 3],
            &[0.5, 0.25, 1.0, 2.0],
            None,
        )
        .unwrap();
        assert_eq!(m.outgoing_range(0), (1, 2));
        assert_eq!(m.p0(0, 0), 0.0);
        assert_eq!(m.coeffs(0, 0), None);
        assert_eq!(m.value(0, Some(0), None, true), 0.0);
        assert_abs_diff_eq!(m.nu_scatter(0), 0.75, epsilon = 1e-14);
        assert_abs_diff_eq!(m.nu_scatter(2), 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_library_validation() {
        let bad_len = ScatterMatrix::from_library(
            ScatterFormat::Legendre,
            1,
            2,
            &[1, 1],
            &[2, 2],
            &[1.0, 1.0, 1.0],
            None,
        );
        assert!(matches!(bad_len, Err(Error::DataIntegrity(_))));

        let bad_range = ScatterMatrix::from_library(
            ScatterFormat::Legendre,
            1,
            2,
            &[0, 1],
            &[2, 2],
            &[1.0, 1.0, 1.0],
            None,
        );
        assert!(matches!(bad_range, Err(Error::DataIntegrity(_))));

        let negative = ScatterMatrix::from_library(
            ScatterFormat::Legendre,
            1,
            1,
            &[1],
            &[1],
            &[-0.1],
            None,
        );
        assert!(matches!(negative, Err(Error::DataIntegrity(_))));

        let bad_mult = ScatterMatrix::from_library(
            ScatterFormat::Legendre,
            1,
            1,
            &[1],
            &[1],
            &[0.1],
            Some(&[0.0]),
        );
        assert!(matches!(bad_mult, Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_mix_pads_orders_and_unions_ranges() {
        let p0_only = ScatterMatrix::from_library(
            ScatterFormat::Legendre,
            1,
            2,
            &[1, 2],
            &[1, 2],
            &[1.0, 2.0],
            None,
        )
        .unwrap();
        let p1 = p1_matrix();
        let mixed = ScatterMatrix::mix(&[(&p0_only, 2.0), (&p1, 1.0)], 2).unwrap();
        assert_eq!(mixed.n_coeffs(), 2);
        assert_eq!(mixed.outgoing_range(0), (0, 1));
        assert_abs_diff_eq!(mixed.p0(0, 0), 2.0 * 1.0 + 0.6, epsilon = 1e-14);
        assert_abs_diff_eq!(mixed.coeffs(0, 0).unwrap()[1], 0.1, epsilon = 1e-14);
        assert_abs_diff_eq!(mixed.nu_scatter(1), 2.0 * 2.0 + 1.5, epsilon = 1e-14);
        // only p1 contributes to 0 -> 1, so its multiplicity survives
        assert_abs_diff_eq!(mixed.multiplicity(0, 1), 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_mix_rejects_mixed_formats() {
        let hist = ScatterMatrix::from_library(
            ScatterFormat::Histogram,
            2,
            2,
            &[1, 1],
            &[1, 1],
            &[1.0, 1.0, 1.0, 1.0],
            None,
        )
        .unwrap();
        let err = ScatterMatrix::mix(&[(&hist, 1.0), (&p1_matrix(), 1.0)], 2).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(ScatterFormat::parse("Legendre").unwrap(), ScatterFormat::Legendre);
        assert_eq!(ScatterFormat::parse("histogram").unwrap(), ScatterFormat::Histogram);
        assert!(ScatterFormat::parse("tabular").is_err());
        assert_eq!(ScatterFormat::Legendre.coefficients_for_order(3), 4);
        assert_eq!(ScatterFormat::Histogram.coefficients_for_order(3), 3);
    }
}
