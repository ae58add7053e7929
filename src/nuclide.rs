// Multi-group data of one nuclide across its loaded temperatures
use crate::error::{Error, Result};
use crate::query::{XsQuery, XsType};
use crate::scatter::ScatterFormat;
use crate::temperature::{TemperatureSelection, TemperatureSelector};
use crate::xs_data::XsData;

/// Core data model for a single nuclide in a multi-group library.
///
/// Temperatures:
/// * `available_kts` lists every kT the library offers for this nuclide, even
///   when only some were loaded.
/// * `kts` lists the samples actually loaded, ascending, with one `XsData`
///   per entry of `xs`.
#[derive(Debug, Clone, PartialEq)]
pub struct NuclideMgxs {
    name: String,
    awr: f64,
    fissionable: bool,
    scatter_format: ScatterFormat,
    available_kts: Vec<f64>,
    kts: Vec<f64>,
    xs: Vec<XsData>,
}

impl NuclideMgxs {
    pub fn new(
        name: impl Into<String>,
        awr: f64,
        fissionable: bool,
        scatter_format: ScatterFormat,
        available_kts: Vec<f64>,
        mut samples: Vec<(f64, XsData)>,
    ) -> Result<Self> {
        let name = name.into();
        if samples.is_empty() {
            return Err(Error::data(format!("nuclide '{}' loaded without any temperature", name)));
        }
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        samples.dedup_by(|a, b| a.0 == b.0);

        let (g, d) = (samples[0].1.num_groups(), samples[0].1.num_delayed());
        if samples.iter().any(|(_, xs)| xs.num_groups() != g || xs.num_delayed() != d) {
            return Err(Error::data(format!(
                "nuclide '{}' has temperatures with different group counts",
                name
            )));
        }
        let (kts, xs) = samples.into_iter().unzip();
        Ok(Self {
            name,
            awr,
            fissionable,
            scatter_format,
            available_kts,
            kts,
            xs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn awr(&self) -> f64 {
        self.awr
    }

    /// Library flag; see `has_fission_data` for whether any data is nonzero.
    pub fn fissionable(&self) -> bool {
        self.fissionable
    }

    pub fn scatter_format(&self) -> ScatterFormat {
        self.scatter_format
    }

    pub fn available_kts(&self) -> &[f64] {
        &self.available_kts
    }

    /// Loaded kT samples (eV), ascending.
    pub fn kts(&self) -> &[f64] {
        &self.kts
    }

    /// Data of the `i`-th loaded sample.
    pub fn xs(&self, i: usize) -> &XsData {
        &self.xs[i]
    }

    pub fn num_groups(&self) -> usize {
        self.xs[0].num_groups()
    }

    pub fn num_delayed(&self) -> usize {
        self.xs[0].num_delayed()
    }

    pub fn has_fission_data(&self) -> bool {
        self.fissionable && self.xs.iter().any(XsData::has_fission_data)
    }

    /// Entries of `wanted` that are not loaded yet.
    pub fn missing_kts(&self, wanted: &[f64]) -> Vec<f64> {
        wanted
            .iter()
            .copied()
            .filter(|kt| !self.kts.contains(kt))
            .collect()
    }

    /// Absorb the samples of another load of the same nuclide. Samples that
    /// are already present are kept as they are.
    pub fn merge(&mut self, other: NuclideMgxs) -> Result<()> {
        if other.name != self.name {
            return Err(Error::programming(format!(
                "cannot merge nuclide '{}' into '{}'",
                other.name, self.name
            )));
        }
        if other.num_groups() != self.num_groups() || other.num_delayed() != self.num_delayed() {
            return Err(Error::data(format!(
                "nuclide '{}' changed group counts between loads",
                self.name
            )));
        }
        for (kt, xs) in other.kts.into_iter().zip(other.xs) {
            if self.kts.contains(&kt) {
                continue;
            }
            let at = self.kts.partition_point(|k| *k < kt);
            self.kts.insert(at, kt);
            self.xs.insert(at, xs);
        }
        Ok(())
    }

    /// Loaded sample(s) serving a request. No temperature selects the first
    /// (lowest) sample.
    pub fn select(&self, selector: &TemperatureSelector, sqrt_kt: Option<f64>) -> TemperatureSelection {
        match sqrt_kt {
            Some(s) => selector.select(&self.kts, s),
            None => TemperatureSelection::Single(0),
        }
    }

    /// General lookup, blending temperature samples as the selector decides.
    pub fn get_xs(
        &self,
        selector: &TemperatureSelector,
        xs_type: XsType,
        gin: usize,
        query: &XsQuery,
    ) -> Result<f64> {
        query.validate(xs_type, gin, self.num_groups(), self.num_delayed())?;
        if xs_type.requires_fission() && !self.fissionable {
            return Err(Error::programming(format!(
                "'{}' requested from non-fissionable nuclide '{}'",
                xs_type, self.name
            )));
        }
        Ok(self
            .select(selector, query.sqrt_kt)
            .weights()
            .map(|(i, w)| w * self.xs[i].value(xs_type, gin, query))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ScatterRecord, TemperatureRecord};
    use crate::temperature::TemperatureMethod;
    use crate::xs_data::DataLayout;
    use approx::assert_abs_diff_eq;

    fn sample(total: [f64; 2]) -> XsData {
        let record = TemperatureRecord {
            total: Some(total.to_vec()),
            absorption: Some(vec![0.5, 0.5]),
            scatter_data: Some(ScatterRecord {
                g_min: vec![1, 2],
                g_max: vec![1, 2],
                scatter_matrix: vec![0.5, 1.0],
                multiplicity_matrix: None,
            }),
            ..Default::default()
        };
        let layout = DataLayout {
            num_groups: 2,
            num_delayed: 0,
            fissionable: false,
            scatter_format: ScatterFormat::Legendre,
            n_coeffs: 1,
        };
        XsData::from_record(&record, &layout).unwrap()
    }

    fn water(kts: &[(f64, [f64; 2])]) -> NuclideMgxs {
        NuclideMgxs::new(
            "H1",
            0.99917,
            false,
            ScatterFormat::Legendre,
            vec![1.0, 2.0, 4.0],
            kts.iter().map(|(kt, t)| (*kt, sample(*t))).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_samples_are_sorted() {
        let nuc = water(&[(4.0, [3.0, 3.0]), (1.0, [1.0, 1.0])]);
        assert_eq!(nuc.kts(), &[1.0, 4.0]);
        assert_eq!(nuc.xs(0).total(), &[1.0, 1.0]);
        assert_eq!(nuc.available_kts(), &[1.0, 2.0, 4.0]);
    }

    #[test]
    fn test_merge_adds_only_missing_samples() {
        let mut nuc = water(&[(1.0, [1.0, 1.0]), (4.0, [3.0, 3.0])]);
        assert_eq!(nuc.missing_kts(&[1.0, 2.0]), vec![2.0]);
        nuc.merge(water(&[(2.0, [2.0, 2.0]), (4.0, [9.0, 9.0])])).unwrap();
        assert_eq!(nuc.kts(), &[1.0, 2.0, 4.0]);
        assert_eq!(nuc.xs(1).total(), &[2.0, 2.0]);
        // existing sample untouched
        assert_eq!(nuc.xs(2).total(), &[3.0, 3.0]);
        assert!(nuc.missing_kts(&[1.0, 2.0, 4.0]).is_empty());
    }

    #[test]
    fn test_get_xs_nearest_and_interpolated() {
        let nuc = water(&[(1.0, [1.0, 10.0]), (4.0, [4.0, 40.0])]);
        let nearest = TemperatureSelector::default();
        let interp = TemperatureSelector::new(TemperatureMethod::Interpolation, 10.0);
        let q = XsQuery::new().at_sqrt_kt(2.0);
        assert_eq!(nuc.get_xs(&nearest, XsType::Total, 1, &q).unwrap(), 40.0);
        assert_abs_diff_eq!(nuc.get_xs(&interp, XsType::Total, 1, &q).unwrap(), 40.0, epsilon = 1e-12);
        let q = XsQuery::new().at_sqrt_kt(2.0_f64.sqrt());
        assert_eq!(nuc.get_xs(&nearest, XsType::Total, 0, &q).unwrap(), 1.0);
        assert_abs_diff_eq!(nuc.get_xs(&interp, XsType::Total, 0, &q).unwrap(), 2.0, epsilon = 1e-12);
        // no temperature: first sample
        assert_eq!(nuc.get_xs(&interp, XsType::Total, 0, &XsQuery::new()).unwrap(), 1.0);
    }

    #[test]
    fn test_fission_query_on_non_fissionable_nuclide() {
        let nuc = water(&[(1.0, [1.0, 1.0])]);
        let err = nuc
            .get_xs(&TemperatureSelector::default(), XsType::NuFission, 0, &XsQuery::new())
            .unwrap_err();
        assert!(matches!(err, Error::Programming(_)));
        assert!(!nuc.has_fission_data());
    }

    #[test]
    fn test_empty_load_rejected() {
        let err = NuclideMgxs::new("H1", 1.0, false, ScatterFormat::Legendre, vec![], vec![]).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }
}
