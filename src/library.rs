// Multi-group cross section library access
//
// A library holds a header (group structure, delayed groups, nuclide names and
// temperatures) and per-nuclide, per-temperature datasets. Readers for each
// on-disk format convert a nuclide into the shared record types below, so the
// validation in `XsData::from_record` is the same for every format.

use crate::energy_groups::EnergyGroupStructure;
use crate::error::{Error, Result};
use crate::nuclide::NuclideMgxs;
use crate::scatter::ScatterFormat;
use crate::xs_data::{DataLayout, XsData};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::path::Path;

/// A dataset together with its extents.
///
/// Spectra and production data come in several layouts whose flattened
/// lengths can coincide (`[D][G]` and `[G][G]` when D == G), so the shape
/// travels with the values. In JSON a flat list is one-dimensional and
/// nested lists keep their nesting; HDF5 datasets carry their own shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    values: Vec<f64>,
    shape: Vec<usize>,
}

impl Dataset {
    pub fn new(values: Vec<f64>, shape: Vec<usize>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(Error::data(format!(
                "dataset of shape {:?} holds {} values",
                shape,
                values.len()
            )));
        }
        Ok(Self { values, shape })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Vec<f64>> for Dataset {
    fn from(values: Vec<f64>) -> Self {
        let shape = vec![values.len()];
        Self { values, shape }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Nested {
    Value(f64),
    List(Vec<Nested>),
}

fn nest(values: &[f64], shape: &[usize]) -> Nested {
    match shape.split_first() {
        None => Nested::Value(values.first().copied().unwrap_or(0.0)),
        Some((&n, rest)) => {
            let stride: usize = rest.iter().product();
            Nested::List(
                (0..n)
                    .map(|i| nest(&values[i * stride..(i + 1) * stride], rest))
                    .collect(),
            )
        }
    }
}

fn flatten_into(node: Nested, shape: &[usize], out: &mut Vec<f64>) -> std::result::Result<(), String> {
    match (node, shape.split_first()) {
        (Nested::Value(v), None) => {
            out.push(v);
            Ok(())
        }
        (Nested::List(items), Some((&n, rest))) if items.len() == n => {
            items.into_iter().try_for_each(|item| flatten_into(item, rest, out))
        }
        _ => Err(format!("ragged nested array, expected shape {:?}", shape)),
    }
}

impl Serialize for Dataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        nest(&self.values, &self.shape).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Dataset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let node = Nested::deserialize(deserializer)?;
        // extents follow the first element at every depth
        let mut shape = Vec::new();
        let mut probe = &node;
        while let Nested::List(items) = probe {
            shape.push(items.len());
            match items.first() {
                Some(first) => probe = first,
                None => break,
            }
        }
        let mut values = Vec::with_capacity(shape.iter().product());
        flatten_into(node, &shape, &mut values).map_err(serde::de::Error::custom)?;
        Ok(Self { values, shape })
    }
}

/// Raw `scatter_data` of one temperature, as stored in the library.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScatterRecord {
    /// 1-based lowest outgoing group per incoming group.
    pub g_min: Vec<i64>,
    /// 1-based highest outgoing group per incoming group.
    pub g_max: Vec<i64>,
    pub scatter_matrix: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity_matrix: Option<Vec<f64>>,
}

/// Raw datasets of one temperature. Every dataset is optional here; which
/// ones are required is decided when the record is converted to `XsData`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorption: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fission: Option<Vec<f64>>,
    #[serde(default, rename = "kappa-fission", skip_serializing_if = "Option::is_none")]
    pub kappa_fission: Option<Vec<f64>>,
    #[serde(default, rename = "nu-fission", skip_serializing_if = "Option::is_none")]
    pub nu_fission: Option<Dataset>,
    #[serde(default, rename = "prompt-nu-fission", skip_serializing_if = "Option::is_none")]
    pub prompt_nu_fission: Option<Vec<f64>>,
    #[serde(default, rename = "delayed-nu-fission", skip_serializing_if = "Option::is_none")]
    pub delayed_nu_fission: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chi: Option<Dataset>,
    #[serde(default, rename = "chi-prompt", skip_serializing_if = "Option::is_none")]
    pub chi_prompt: Option<Dataset>,
    #[serde(default, rename = "chi-delayed", skip_serializing_if = "Option::is_none")]
    pub chi_delayed: Option<Dataset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<Dataset>,
    #[serde(default, rename = "decay-rate", skip_serializing_if = "Option::is_none")]
    pub decay_rate: Option<Vec<f64>>,
    #[serde(default, rename = "inverse-velocity", skip_serializing_if = "Option::is_none")]
    pub inverse_velocity: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scatter_data: Option<ScatterRecord>,
}

fn default_representation() -> String {
    "isotropic".to_string()
}

fn default_scatter_format() -> String {
    "legendre".to_string()
}

/// Per-nuclide attributes shared by all temperatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuclideAttributes {
    pub atomic_weight_ratio: f64,
    #[serde(default)]
    pub fissionable: bool,
    #[serde(default = "default_representation")]
    pub representation: String,
    #[serde(default = "default_scatter_format")]
    pub scatter_format: String,
    /// Legendre order, or number of histogram bins.
    #[serde(default)]
    pub order: usize,
}

/// One nuclide of a JSON library document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuclideRecord {
    #[serde(flatten)]
    pub attributes: NuclideAttributes,
    /// Temperature label -> kT in eV.
    #[serde(rename = "kTs")]
    pub kts: BTreeMap<String, f64>,
    /// Temperature label -> datasets.
    #[serde(default)]
    pub temperatures: BTreeMap<String, TemperatureRecord>,
}

/// Top level of a JSON library document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryDocument {
    pub energy_groups: usize,
    #[serde(default)]
    pub delayed_groups: usize,
    /// Group boundaries in eV, ascending.
    pub group_structure: Vec<f64>,
    pub nuclides: BTreeMap<String, NuclideRecord>,
}

/// Name and stored temperatures of a library nuclide.
#[derive(Debug, Clone, PartialEq)]
pub struct NuclideEntry {
    pub name: String,
    /// Stored kT values in eV, ascending.
    pub kts: Vec<f64>,
}

/// Everything the discovery pass reads: no cross section tables.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryHeader {
    pub num_energy_groups: usize,
    pub num_delayed_groups: usize,
    pub group_structure: EnergyGroupStructure,
    pub nuclides: Vec<NuclideEntry>,
}

impl LibraryHeader {
    /// Assemble a header, checking the group structure against the declared
    /// group count and sorting each nuclide's temperatures.
    pub fn new(
        num_energy_groups: usize,
        num_delayed_groups: usize,
        boundaries: Vec<f64>,
        nuclides: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let group_structure = EnergyGroupStructure::with_group_count(boundaries, num_energy_groups)?;
        let mut entries = Vec::with_capacity(nuclides.len());
        for (name, mut kts) in nuclides {
            if kts.iter().any(|kt| !kt.is_finite() || *kt < 0.0) {
                return Err(Error::data(format!(
                    "nuclide '{}' has a negative or non-finite kT",
                    name
                )));
            }
            kts.sort_by(f64::total_cmp);
            entries.push(NuclideEntry { name, kts });
        }
        Ok(Self {
            num_energy_groups,
            num_delayed_groups,
            group_structure,
            nuclides: entries,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nuclides.iter().map(|n| n.name.as_str())
    }

    pub fn find(&self, name: &str) -> Option<&NuclideEntry> {
        self.nuclides.iter().find(|n| n.name == name)
    }
}

/// Read access to a multi-group library.
pub trait MgxsLibrary {
    /// Discovery pass: group structure, delayed groups, nuclide temperatures.
    fn read_header(&self) -> Result<LibraryHeader>;

    /// Load `name` at exactly the given kT samples (eV). Every sample must be
    /// one of the kTs reported for the nuclide by `read_header`.
    fn read_nuclide(&self, name: &str, kts: &[f64]) -> Result<NuclideMgxs>;
}

/// Find the label stored for a kT value.
pub(crate) fn label_for_kt<'a, I>(name: &str, labels: I, kt: f64) -> Result<&'a str>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    labels
        .into_iter()
        .find(|(_, stored)| (stored - kt).abs() <= 1e-12 * kt.abs().max(1e-12))
        .map(|(label, _)| label)
        .ok_or_else(|| Error::data(format!("nuclide '{}' has no data at kT = {} eV", name, kt)))
}

/// Prefix integrity errors with the nuclide and temperature they came from.
fn in_context(name: &str, label: &str, err: Error) -> Error {
    match err {
        Error::DataIntegrity(msg) => Error::data(format!("{} [{}]: {}", name, label, msg)),
        other => other,
    }
}

/// Shared conversion from raw records into a `NuclideMgxs`.
pub(crate) fn build_nuclide(
    name: &str,
    attributes: &NuclideAttributes,
    num_groups: usize,
    num_delayed: usize,
    available_kts: Vec<f64>,
    samples: Vec<(String, f64, TemperatureRecord)>,
) -> Result<NuclideMgxs> {
    if !attributes.representation.trim().eq_ignore_ascii_case("isotropic") {
        return Err(Error::data(format!(
            "nuclide '{}' uses the unsupported '{}' representation",
            name, attributes.representation
        )));
    }
    let awr = attributes.atomic_weight_ratio;
    if !awr.is_finite() || awr <= 0.0 {
        return Err(Error::data(format!(
            "nuclide '{}' has invalid atomic_weight_ratio {}",
            name, awr
        )));
    }
    let scatter_format = ScatterFormat::parse(&attributes.scatter_format)?;
    let layout = DataLayout {
        num_groups,
        num_delayed,
        fissionable: attributes.fissionable,
        scatter_format,
        n_coeffs: scatter_format.coefficients_for_order(attributes.order),
    };

    let mut data = Vec::with_capacity(samples.len());
    for (label, kt, record) in samples {
        let xs = XsData::from_record(&record, &layout).map_err(|e| in_context(name, &label, e))?;
        data.push((kt, xs));
    }
    NuclideMgxs::new(
        name,
        awr,
        attributes.fissionable,
        scatter_format,
        available_kts,
        data,
    )
}

/// Library held in memory as a JSON document.
#[derive(Debug, Clone)]
pub struct JsonLibrary {
    document: LibraryDocument,
}

impl JsonLibrary {
    pub fn new(document: LibraryDocument) -> Self {
        Self { document }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Reading MGXS library {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    pub fn document(&self) -> &LibraryDocument {
        &self.document
    }
}

impl MgxsLibrary for JsonLibrary {
    fn read_header(&self) -> Result<LibraryHeader> {
        let doc = &self.document;
        let nuclides = doc
            .nuclides
            .iter()
            .map(|(name, rec)| (name.clone(), rec.kts.values().copied().collect()))
            .collect();
        LibraryHeader::new(
            doc.energy_groups,
            doc.delayed_groups,
            doc.group_structure.clone(),
            nuclides,
        )
    }

    fn read_nuclide(&self, name: &str, kts: &[f64]) -> Result<NuclideMgxs> {
        let record = self
            .document
            .nuclides
            .get(name)
            .ok_or_else(|| Error::config(format!("nuclide '{}' is not in the library", name)))?;

        let mut samples = Vec::with_capacity(kts.len());
        for &kt in kts {
            let label = label_for_kt(
                name,
                record.kts.iter().map(|(label, kt)| (label.as_str(), *kt)),
                kt,
            )?;
            let data = record.temperatures.get(label).ok_or_else(|| {
                Error::data(format!("nuclide '{}' lists {} but has no data for it", name, label))
            })?;
            samples.push((label.to_string(), kt, data.clone()));
        }

        let mut available: Vec<f64> = record.kts.values().copied().collect();
        available.sort_by(f64::total_cmp);
        build_nuclide(
            name,
            &record.attributes,
            self.document.energy_groups,
            self.document.delayed_groups,
            available,
            samples,
        )
    }
}

/// Open a library file, choosing the reader from the file extension
/// (`.json`, or `.h5`/`.hdf5` with the `hdf5` feature).
pub fn open_library<P: AsRef<Path>>(path: P) -> Result<Box<dyn MgxsLibrary>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "json" => Ok(Box::new(JsonLibrary::from_file(path)?)),
        #[cfg(feature = "hdf5")]
        "h5" | "hdf5" => Ok(Box::new(crate::library_hdf5::Hdf5Library::open(path)?)),
        #[cfg(not(feature = "hdf5"))]
        "h5" | "hdf5" => Err(Error::config(format!(
            "cannot read {}: built without the 'hdf5' feature",
            path.display()
        ))),
        _ => Err(Error::config(format!(
            "unrecognised cross section library format: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{XsQuery, XsType};
    use crate::temperature::K_BOLTZMANN;

    const LIBRARY: &str = r#"{
        "energy_groups": 2,
        "delayed_groups": 0,
        "group_structure": [1e-5, 0.625, 2e7],
        "nuclides": {
            "H1": {
                "atomic_weight_ratio": 0.99917,
                "order": 0,
                "kTs": {"294K": 0.025335, "600K": 0.051704},
                "temperatures": {
                    "294K": {
                        "total": [1.0, 2.0],
                        "absorption": [0.1, 0.2],
                        "scatter_data": {"g_min": [1, 2], "g_max": [2, 2], "scatter_matrix": [0.6, 0.3, 1.8]}
                    },
                    "600K": {
                        "total": [1.5, 2.5],
                        "absorption": [0.1, 0.2],
                        "scatter_data": {"g_min": [1, 2], "g_max": [2, 2], "scatter_matrix": [0.9, 0.5, 2.3]}
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_header_reads_names_groups_and_temperatures() {
        let lib = JsonLibrary::from_str(LIBRARY).unwrap();
        let header = lib.read_header().unwrap();
        assert_eq!(header.num_energy_groups, 2);
        assert_eq!(header.num_delayed_groups, 0);
        assert_eq!(header.names().collect::<Vec<_>>(), vec!["H1"]);
        assert_eq!(header.find("H1").unwrap().kts, vec![0.025335, 0.051704]);
        assert!(header.find("H2").is_none());
        assert_eq!(header.group_structure.energy_bins(), &[2e7, 0.625, 1e-5]);
    }

    #[test]
    fn test_read_only_requested_temperature() {
        let lib = JsonLibrary::from_str(LIBRARY).unwrap();
        let h1 = lib.read_nuclide("H1", &[0.051704]).unwrap();
        assert_eq!(h1.kts(), &[0.051704]);
        assert_eq!(h1.available_kts(), &[0.025335, 0.051704]);
        assert_eq!(h1.xs(0).total(), &[1.5, 2.5]);
        assert!((h1.awr() - 0.99917).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_temperature_is_data_error() {
        let lib = JsonLibrary::from_str(LIBRARY).unwrap();
        let err = lib.read_nuclide("H1", &[K_BOLTZMANN * 1200.0]).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_group_structure_mismatch() {
        let text = LIBRARY.replace("\"energy_groups\": 2", "\"energy_groups\": 3");
        let lib = JsonLibrary::from_str(&text).unwrap();
        assert!(matches!(lib.read_header(), Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_bad_dataset_names_the_nuclide_and_temperature() {
        let text = LIBRARY.replace("\"total\": [1.5, 2.5]", "\"total\": [1.5]");
        let lib = JsonLibrary::from_str(&text).unwrap();
        let err = lib.read_nuclide("H1", &[0.051704]).unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("H1 [600K]"), "{msg}");
        assert!(msg.contains("'total' has 1 entries"), "{msg}");
    }

    #[test]
    fn test_unsupported_representation() {
        let text = LIBRARY.replace("\"order\": 0", "\"order\": 0, \"representation\": \"angle\"");
        let lib = JsonLibrary::from_str(&text).unwrap();
        let err = lib.read_nuclide("H1", &[0.025335]).unwrap_err();
        assert!(format!("{err}").contains("unsupported 'angle' representation"));
    }

    #[test]
    fn test_open_library_by_extension() {
        assert!(matches!(open_library("library.xml"), Err(Error::Configuration(_))));
        assert!(matches!(open_library("does/not/exist.json"), Err(Error::Io(_))));
    }

    #[test]
    fn test_dataset_keeps_nesting_as_shape() {
        let flat: Dataset = serde_json::from_str("[1, 0.5]").unwrap();
        assert_eq!(flat.shape(), &[2]);
        assert_eq!(flat.values(), &[1.0, 0.5]);

        let nested: Dataset = serde_json::from_str("[[1.0, 0.0], [0.0, 1.0], [0.5, 0.5]]").unwrap();
        assert_eq!(nested.shape(), &[3, 2]);
        assert_eq!(nested.ndim(), 2);
        assert_eq!(nested.values(), &[1.0, 0.0, 0.0, 1.0, 0.5, 0.5]);
        assert_eq!(serde_json::to_string(&nested).unwrap(), "[[1.0,0.0],[0.0,1.0],[0.5,0.5]]");

        assert!(serde_json::from_str::<Dataset>("[[1.0, 0.0], [1.0]]").is_err());
        assert!(matches!(Dataset::new(vec![1.0; 3], vec![2, 2]), Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_nested_chi_delayed_in_json_library() {
        let json = r#"{
            "energy_groups": 2,
            "delayed_groups": 2,
            "group_structure": [1e-5, 0.625, 2e7],
            "nuclides": {"U235": {
                "atomic_weight_ratio": 233.0248,
                "fissionable": true,
                "kTs": {"294K": 0.025335},
                "temperatures": {"294K": {
                    "absorption": [1.0, 18.0],
                    "nu-fission": [1.25, 36.0],
                    "chi": [1.0, 0.0],
                    "beta": [0.002, 0.004],
                    "chi-delayed": [[1.0, 0.0], [0.0, 1.0]],
                    "scatter_data": {"g_min": [1, 2], "g_max": [2, 2], "scatter_matrix": [0.9, 0.1, 2.0]}
                }}
            }}
        }"#;
        let library = JsonLibrary::from_str(json).unwrap();
        let record = &library.document().nuclides["U235"].temperatures["294K"];
        assert_eq!(record.chi_delayed.as_ref().unwrap().shape(), &[2, 2]);

        let nuclide = library.read_nuclide("U235", &[0.025335]).unwrap();
        let q = XsQuery::new().delayed_group(1).outgoing(1);
        assert_eq!(nuclide.xs(0).value(XsType::ChiDelayed, 0, &q), 1.0);
    }
}
