// Multi-group cross section context shared by the transport kernel
use std::collections::HashMap;

use crate::energy_groups::EnergyGroupStructure;
use crate::error::{Error, Result};
use crate::library::{LibraryHeader, MgxsLibrary};
use crate::macro_xs::MacroMgxs;
use crate::material::MaterialSpec;
use crate::nuclide::NuclideMgxs;
use crate::query::{XsQuery, XsType};
use crate::temperature::{kelvin_from_kt, TemperatureSelector};

/// Loaded nuclides, mixed materials and the lookup surface over them.
///
/// Built once during initialization:
/// 1. [`MgxsInterface::from_header`] with the library's discovery pass.
/// 2. [`MgxsInterface::set_nuclides_to_read`] validates the materials and
///    records which nuclides they reference.
/// 3. [`MgxsInterface::set_nuclide_temperatures_to_read`] resolves the
///    temperatures each nuclide is needed at.
/// 4. [`MgxsInterface::init`] loads the nuclides and mixes the materials.
///
/// Afterwards the interface is only read, typically through an `Arc` shared
/// by every worker thread. [`MgxsInterface::build`] runs all four steps.
#[derive(Debug, Clone)]
pub struct MgxsInterface {
    header: LibraryHeader,
    selector: TemperatureSelector,
    default_temperature: f64,
    materials: Vec<MaterialSpec>,
    xs_to_read: Vec<String>,
    xs_temps_to_read: Vec<Vec<f64>>,
    nuclides: Vec<NuclideMgxs>,
    nuclide_map: HashMap<String, usize>,
    macro_xs: Vec<MacroMgxs>,
}

impl MgxsInterface {
    pub fn from_header(header: LibraryHeader, selector: TemperatureSelector, default_temperature: f64) -> Self {
        log::info!(
            "MGXS library: {} energy groups, {} delayed groups, {} nuclides",
            header.num_energy_groups,
            header.num_delayed_groups,
            header.nuclides.len()
        );
        Self {
            header,
            selector,
            default_temperature,
            materials: Vec::new(),
            xs_to_read: Vec::new(),
            xs_temps_to_read: Vec::new(),
            nuclides: Vec::new(),
            nuclide_map: HashMap::new(),
            macro_xs: Vec::new(),
        }
    }

    /// Run the whole initialization sequence against `library`.
    pub fn build(
        library: &dyn MgxsLibrary,
        materials: &[MaterialSpec],
        selector: TemperatureSelector,
        default_temperature: f64,
    ) -> Result<Self> {
        let mut interface = Self::from_header(library.read_header()?, selector, default_temperature);
        interface.set_nuclides_to_read(materials)?;
        interface.set_nuclide_temperatures_to_read()?;
        interface.init(library)?;
        Ok(interface)
    }

    /// Reject materials that cannot be served by this library.
    pub fn check_materials(&self, materials: &[MaterialSpec]) -> Result<()> {
        for material in materials {
            material.validate()?;
            if let Some(unknown) = material
                .nuclides
                .iter()
                .find(|n| self.header.find(&n.name).is_none())
            {
                return Err(Error::config(format!(
                    "material '{}' references nuclide '{}' which is not in the cross section library",
                    material.name, unknown.name
                )));
            }
        }
        Ok(())
    }

    /// Record the materials to build and the nuclides they reference, in
    /// order of first use.
    pub fn set_nuclides_to_read(&mut self, materials: &[MaterialSpec]) -> Result<()> {
        self.check_materials(materials)?;
        self.materials = materials.to_vec();
        self.xs_to_read.clear();
        for material in materials {
            for n in &material.nuclides {
                if !self.xs_to_read.contains(&n.name) {
                    self.xs_to_read.push(n.name.clone());
                }
            }
        }
        Ok(())
    }

    /// Union of the temperatures (K) every recorded nuclide is needed at.
    pub fn set_nuclide_temperatures_to_read(&mut self) -> Result<()> {
        let mut temps = vec![Vec::new(); self.xs_to_read.len()];
        for material in &self.materials {
            let wanted = material.temperatures_or(self.default_temperature);
            for n in &material.nuclides {
                let i = self
                    .xs_to_read
                    .iter()
                    .position(|name| *name == n.name)
                    .ok_or_else(|| Error::programming("set_nuclides_to_read must run first"))?;
                for &t in &wanted {
                    if !temps[i].contains(&t) {
                        temps[i].push(t);
                    }
                }
            }
        }
        for t in &mut temps {
            t.sort_by(f64::total_cmp);
        }
        self.xs_temps_to_read = temps;
        Ok(())
    }

    /// Load every recorded nuclide, then mix the materials.
    pub fn init(&mut self, library: &dyn MgxsLibrary) -> Result<()> {
        let work: Vec<(String, Vec<f64>)> = self
            .xs_to_read
            .iter()
            .cloned()
            .zip(self.xs_temps_to_read.iter().cloned())
            .collect();
        for (name, temps) in work {
            self.add_mgxs(library, &name, &temps)?;
        }
        self.create_macro_xs()
    }

    /// Load `name` at the samples needed for `temperatures` (K). A nuclide
    /// that is already loaded only reads the samples it is missing.
    pub fn add_mgxs(&mut self, library: &dyn MgxsLibrary, name: &str, temperatures: &[f64]) -> Result<usize> {
        let entry = self
            .header
            .find(name)
            .ok_or_else(|| Error::config(format!("nuclide '{}' is not in the cross section library", name)))?;
        let kts = self.selector.kts_to_read(name, &entry.kts, temperatures)?;

        if let Some(&index) = self.nuclide_map.get(name) {
            let missing = self.nuclides[index].missing_kts(&kts);
            if missing.is_empty() {
                log::debug!("reusing loaded data for '{}'", name);
                return Ok(index);
            }
            let extra = library.read_nuclide(name, &missing)?;
            self.check_shape(&extra)?;
            self.nuclides[index].merge(extra)?;
            log::info!("Loaded {} more temperature(s) of '{}'", missing.len(), name);
            return Ok(index);
        }

        let nuclide = library.read_nuclide(name, &kts)?;
        self.check_shape(&nuclide)?;
        log::info!(
            "Loaded MGXS for '{}' at {:?} K",
            name,
            nuclide.kts().iter().map(|kt| kelvin_from_kt(*kt).round()).collect::<Vec<_>>()
        );
        let index = self.nuclides.len();
        self.nuclide_map.insert(name.to_string(), index);
        self.nuclides.push(nuclide);
        Ok(index)
    }

    fn check_shape(&self, nuclide: &NuclideMgxs) -> Result<()> {
        if nuclide.num_groups() != self.header.num_energy_groups
            || nuclide.num_delayed() != self.header.num_delayed_groups
        {
            return Err(Error::data(format!(
                "nuclide '{}' has {} groups / {} delayed groups, library declares {} / {}",
                nuclide.name(),
                nuclide.num_groups(),
                nuclide.num_delayed(),
                self.header.num_energy_groups,
                self.header.num_delayed_groups
            )));
        }
        Ok(())
    }

    /// Distinct kT values (eV) material `mat` is evaluated at.
    pub fn get_mat_kts(&self, mat: usize) -> Result<Vec<f64>> {
        self.materials
            .get(mat)
            .map(|m| m.kts(self.default_temperature))
            .ok_or_else(|| self.material_out_of_range(mat))
    }

    /// Build one `MacroMgxs` per recorded material. Every constituent must
    /// already be loaded.
    pub fn create_macro_xs(&mut self) -> Result<()> {
        let mut built = Vec::with_capacity(self.materials.len());
        for (i, material) in self.materials.iter().enumerate() {
            let constituents = material
                .nuclides
                .iter()
                .map(|n| {
                    self.nuclide_map
                        .get(&n.name)
                        .map(|&idx| (&self.nuclides[idx], n.density))
                        .ok_or_else(|| Error::programming(format!("nuclide '{}' has not been loaded", n.name)))
                })
                .collect::<Result<Vec<_>>>()?;
            let kts = self.get_mat_kts(i)?;
            built.push(MacroMgxs::mix(&material.name, &constituents, &kts, &self.selector)?);
        }
        self.macro_xs = built;
        log::info!("Built macroscopic cross sections for {} material(s)", self.macro_xs.len());
        Ok(())
    }

    /// Fissionable flag of every material, in material order.
    pub fn mark_fissionable_mgxs_materials(&self) -> Vec<bool> {
        self.macro_xs.iter().map(MacroMgxs::fissionable).collect()
    }

    /// Hot-path lookup of (total, absorption, nu-fission) for a material.
    /// `direction` is accepted for angle-dependent data and not used by
    /// isotropic libraries.
    ///
    /// # Panics
    /// Panics on an out-of-range material or group.
    #[inline]
    pub fn calculate_xs(&self, mat: usize, gin: usize, sqrt_kt: f64, _direction: &[f64; 3]) -> (f64, f64, f64) {
        match self.macro_xs.get(mat) {
            Some(m) => m.calculate_xs(gin, sqrt_kt),
            None => panic!("{}", self.material_out_of_range(mat)),
        }
    }

    pub fn try_get_macro_xs(&self, mat: usize, xs_type: XsType, gin: usize, query: &XsQuery) -> Result<f64> {
        self.macro_xs
            .get(mat)
            .ok_or_else(|| self.material_out_of_range(mat))?
            .get_xs(xs_type, gin, query)
    }

    /// # Panics
    /// Panics on any lookup contract violation; see [`Self::try_get_macro_xs`].
    pub fn get_macro_xs(&self, mat: usize, xs_type: XsType, gin: usize, query: &XsQuery) -> f64 {
        self.try_get_macro_xs(mat, xs_type, gin, query)
            .unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn try_get_nuclide_xs(&self, index: usize, xs_type: XsType, gin: usize, query: &XsQuery) -> Result<f64> {
        self.nuclides
            .get(index)
            .ok_or_else(|| self.nuclide_out_of_range(index))?
            .get_xs(&self.selector, xs_type, gin, query)
    }

    /// # Panics
    /// Panics on any lookup contract violation; see [`Self::try_get_nuclide_xs`].
    pub fn get_nuclide_xs(&self, index: usize, xs_type: XsType, gin: usize, query: &XsQuery) -> f64 {
        self.try_get_nuclide_xs(index, xs_type, gin, query)
            .unwrap_or_else(|e| panic!("{}", e))
    }

    pub fn get_name(&self, index: usize) -> &str {
        match self.nuclides.get(index) {
            Some(n) => n.name(),
            None => panic!("{}", self.nuclide_out_of_range(index)),
        }
    }

    pub fn get_awr(&self, index: usize) -> f64 {
        match self.nuclides.get(index) {
            Some(n) => n.awr(),
            None => panic!("{}", self.nuclide_out_of_range(index)),
        }
    }

    pub fn num_energy_groups(&self) -> usize {
        self.header.num_energy_groups
    }

    pub fn num_delayed_groups(&self) -> usize {
        self.header.num_delayed_groups
    }

    pub fn energy_groups(&self) -> &EnergyGroupStructure {
        &self.header.group_structure
    }

    pub fn header(&self) -> &LibraryHeader {
        &self.header
    }

    pub fn selector(&self) -> &TemperatureSelector {
        &self.selector
    }

    /// Nuclide names available in the library, with their temperatures in K.
    pub fn nuc_temps(&self) -> Vec<(&str, Vec<f64>)> {
        self.header
            .nuclides
            .iter()
            .map(|n| (n.name.as_str(), n.kts.iter().map(|kt| kelvin_from_kt(*kt)).collect()))
            .collect()
    }

    pub fn num_materials(&self) -> usize {
        self.macro_xs.len()
    }

    pub fn num_nuclides(&self) -> usize {
        self.nuclides.len()
    }

    pub fn macro_xs(&self, mat: usize) -> Option<&MacroMgxs> {
        self.macro_xs.get(mat)
    }

    pub fn nuclide(&self, index: usize) -> Option<&NuclideMgxs> {
        self.nuclides.get(index)
    }

    pub fn nuclide_index(&self, name: &str) -> Option<usize> {
        self.nuclide_map.get(name).copied()
    }

    pub fn is_fissionable(&self, mat: usize) -> bool {
        self.macro_xs.get(mat).is_some_and(MacroMgxs::fissionable)
    }

    fn material_out_of_range(&self, mat: usize) -> Error {
        Error::programming(format!(
            "material index {} out of range [0, {})",
            mat,
            self.macro_xs.len().max(self.materials.len())
        ))
    }

    fn nuclide_out_of_range(&self, index: usize) -> Error {
        Error::programming(format!(
            "nuclide index {} out of range [0, {})",
            index,
            self.nuclides.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::JsonLibrary;
    use crate::temperature::{TemperatureMethod, K_BOLTZMANN};
    use std::cell::Cell;

    const LIBRARY: &str = r#"{
        "energy_groups": 2,
        "group_structure": [1e-5, 0.625, 2e7],
        "nuclides": {
            "H1": {
                "atomic_weight_ratio": 0.99917,
                "kTs": {"294K": 0.025335, "600K": 0.051704},
                "temperatures": {
                    "294K": {"total": [1.0, 2.0], "absorption": [0.5, 1.0],
                             "scatter_data": {"g_min": [1, 2], "g_max": [2, 2], "scatter_matrix": [0.25, 0.25, 1.0]}},
                    "600K": {"total": [1.5, 2.5], "absorption": [0.5, 1.0],
                             "scatter_data": {"g_min": [1, 2], "g_max": [2, 2], "scatter_matrix": [0.5, 0.5, 1.5]}}
                }
            },
            "U235": {
                "atomic_weight_ratio": 233.0248,
                "fissionable": true,
                "kTs": {"294K": 0.025335},
                "temperatures": {
                    "294K": {"total": [2.0, 20.0], "absorption": [1.0, 18.0], "fission": [0.5, 15.0],
                             "nu-fission": [1.25, 36.0], "chi": [1.0, 0.0],
                             "scatter_data": {"g_min": [1, 2], "g_max": [2, 2], "scatter_matrix": [0.9, 0.1, 2.0]}}
                }
            }
        }
    }"#;

    /// Counts nuclide reads to check that loaded data is reused.
    struct CountingLibrary {
        inner: JsonLibrary,
        reads: Cell<usize>,
    }

    impl MgxsLibrary for CountingLibrary {
        fn read_header(&self) -> Result<LibraryHeader> {
            self.inner.read_header()
        }

        fn read_nuclide(&self, name: &str, kts: &[f64]) -> Result<NuclideMgxs> {
            self.reads.set(self.reads.get() + 1);
            self.inner.read_nuclide(name, kts)
        }
    }

    fn library() -> CountingLibrary {
        CountingLibrary {
            inner: JsonLibrary::from_str(LIBRARY).unwrap(),
            reads: Cell::new(0),
        }
    }

    fn material(name: &str, nuclides: &[(&str, f64)], temps: &[f64]) -> MaterialSpec {
        let mut m = MaterialSpec::new(name);
        for (n, d) in nuclides {
            m.add_nuclide(n, *d).unwrap();
        }
        m.temperatures = temps.to_vec();
        m
    }

    fn selector() -> TemperatureSelector {
        TemperatureSelector::new(TemperatureMethod::Nearest, 10.0)
    }

    #[test]
    fn test_unknown_nuclide_fails_before_loading() {
        let lib = library();
        let mats = vec![material("fuel", &[("U-238x", 0.02)], &[])];
        let err = MgxsInterface::build(&lib, &mats, selector(), 294.0).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(format!("{err}").contains("U-238x"));
        assert_eq!(lib.reads.get(), 0);
    }

    #[test]
    fn test_shared_nuclide_is_read_once_per_temperature() {
        let lib = library();
        let mats = vec![
            material("cold water", &[("H1", 1.0)], &[294.0]),
            material("fuel", &[("U235", 0.01), ("H1", 0.5)], &[294.0]),
        ];
        let xs = MgxsInterface::build(&lib, &mats, selector(), 294.0).unwrap();
        assert_eq!(lib.reads.get(), 2);
        assert_eq!(xs.num_nuclides(), 2);
        assert_eq!(xs.get_name(0), "H1");
        assert_eq!(xs.nuclide_index("U235"), Some(1));
        assert_eq!(xs.mark_fissionable_mgxs_materials(), vec![false, true]);
    }

    #[test]
    fn test_add_mgxs_reads_only_missing_temperatures() {
        let lib = library();
        let mut xs = MgxsInterface::from_header(lib.read_header().unwrap(), selector(), 294.0);
        let i = xs.add_mgxs(&lib, "H1", &[294.0]).unwrap();
        let j = xs.add_mgxs(&lib, "H1", &[296.0]).unwrap();
        assert_eq!((i, j, lib.reads.get()), (0, 0, 1));
        xs.add_mgxs(&lib, "H1", &[600.0]).unwrap();
        assert_eq!(lib.reads.get(), 2);
        assert_eq!(xs.nuclide(0).unwrap().kts(), &[0.025335, 0.051704]);
    }

    #[test]
    fn test_temperature_outside_tolerance_is_configuration_error() {
        let lib = library();
        let mats = vec![material("hot", &[("H1", 1.0)], &[450.0])];
        let err = MgxsInterface::build(&lib, &mats, selector(), 294.0).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_material_temperatures_and_lookups() {
        let lib = library();
        let mats = vec![material("water", &[("H1", 2.0)], &[294.0, 600.0])];
        let xs = MgxsInterface::build(&lib, &mats, selector(), 294.0).unwrap();
        assert_eq!(xs.get_mat_kts(0).unwrap(), vec![K_BOLTZMANN * 294.0, K_BOLTZMANN * 600.0]);
        let hot = (K_BOLTZMANN * 600.0).sqrt();
        assert_eq!(xs.calculate_xs(0, 1, hot, &[1.0, 0.0, 0.0]), (5.0, 2.0, 0.0));
        assert_eq!(xs.get_macro_xs(0, XsType::Total, 0, &XsQuery::new()), 2.0);
        assert_eq!(xs.get_nuclide_xs(0, XsType::Total, 0, &XsQuery::new().at_sqrt_kt(hot)), 1.5);
        assert!((xs.get_awr(0) - 0.99917).abs() < 1e-12);
        assert!(!xs.is_fissionable(0));
        assert!(matches!(
            xs.try_get_macro_xs(3, XsType::Total, 0, &XsQuery::new()),
            Err(Error::Programming(_))
        ));
    }

    #[test]
    #[should_panic(expected = "non-fissionable material")]
    fn test_fission_lookup_on_water_panics() {
        let lib = library();
        let mats = vec![material("water", &[("H1", 2.0)], &[])];
        let xs = MgxsInterface::build(&lib, &mats, selector(), 294.0).unwrap();
        xs.get_macro_xs(0, XsType::NuFission, 0, &XsQuery::new());
    }

    #[test]
    fn test_nuc_temps_in_kelvin() {
        let lib = library();
        let xs = MgxsInterface::from_header(lib.read_header().unwrap(), selector(), 294.0);
        let temps = xs.nuc_temps();
        assert_eq!(temps[0].0, "H1");
        assert!((temps[0].1[1] - 600.0).abs() < 0.01);
        assert_eq!(xs.num_energy_groups(), 2);
        assert_eq!(xs.num_delayed_groups(), 0);
        assert_eq!(xs.energy_groups().num_groups(), 2);
    }
}
