// HDF5 reader for multi-group libraries
// Matches OpenMC's MGXS library layout:
//   file attrs: energy_groups, delayed_groups, "group structure"
//   /<nuclide> attrs: atomic_weight_ratio, fissionable, representation,
//                     scatter_format, order
//   /<nuclide>/kTs/<label>: scalar kT in eV
//   /<nuclide>/<label>/...: datasets and scatter_data/

use hdf5::types::{FixedAscii, VarLenAscii, VarLenUnicode};
use hdf5::{File, Group};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::library::{
    build_nuclide, label_for_kt, Dataset, LibraryHeader, MgxsLibrary, NuclideAttributes,
    ScatterRecord, TemperatureRecord,
};
use crate::nuclide::NuclideMgxs;

/// Library backed by an HDF5 file, opened once and read on demand.
pub struct Hdf5Library {
    path: PathBuf,
    file: File,
}

impl Hdf5Library {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::info!("Reading MGXS library {}", path.display());
        let file = File::open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn num_groups(&self) -> Result<(usize, usize)> {
        let groups = read_count_attr(&self.file, "energy_groups")?
            .ok_or_else(|| Error::data("library has no 'energy_groups' attribute"))?;
        let delayed = read_count_attr(&self.file, "delayed_groups")?.unwrap_or(0);
        Ok((groups, delayed))
    }

    /// (label, kT) pairs stored under `<nuclide>/kTs`.
    fn nuclide_kts(group: &Group) -> Result<Vec<(String, f64)>> {
        let kts = group
            .group("kTs")
            .map_err(|_| Error::data(format!("nuclide '{}' has no 'kTs' group", group.name())))?;
        let mut out = Vec::new();
        for label in kts.member_names()? {
            let kt = kts.dataset(&label)?.read_scalar::<f64>()?;
            out.push((label, kt));
        }
        Ok(out)
    }
}

/// Helper to read a string attribute from HDF5
/// Handles variable-length unicode, variable-length ASCII and fixed-size
/// ASCII strings of various lengths
fn read_string_attr(group: &Group, name: &str) -> Result<Option<String>> {
    let Ok(attr) = group.attr(name) else {
        return Ok(None);
    };
    if let Ok(s) = attr.read_scalar::<VarLenUnicode>() {
        return Ok(Some(s.to_string()));
    }
    if let Ok(s) = attr.read_scalar::<VarLenAscii>() {
        return Ok(Some(s.to_string()));
    }

    // Largest first: a short FixedAscii reads a longer string truncated
    macro_rules! try_fixed_ascii_largest_first {
        ($($n:expr),*) => {
            $(
                if let Ok(s) = attr.read_scalar::<FixedAscii<$n>>() {
                    let trimmed = s.to_string().trim_end_matches('\0').to_string();
                    if !trimmed.is_empty() {
                        return Ok(Some(trimmed));
                    }
                }
            )*
        }
    }
    try_fixed_ascii_largest_first!(64, 32, 16, 12, 10, 9, 8, 7, 6, 5, 4, 3);

    Err(Error::data(format!(
        "could not read string attribute '{}' of {}",
        name,
        group.name()
    )))
}

fn read_count_attr(group: &Group, name: &str) -> Result<Option<usize>> {
    let Ok(attr) = group.attr(name) else {
        return Ok(None);
    };
    let value = attr.read_scalar::<i64>()?;
    usize::try_from(value)
        .map(Some)
        .map_err(|_| Error::data(format!("attribute '{}' is negative ({})", name, value)))
}

/// h5py stores booleans as an enum; fall back to integers for other writers.
fn read_bool_attr(group: &Group, name: &str) -> Result<bool> {
    let Ok(attr) = group.attr(name) else {
        return Ok(false);
    };
    if let Ok(b) = attr.read_scalar::<bool>() {
        return Ok(b);
    }
    Ok(attr.read_scalar::<i64>()? != 0)
}

fn read_optional(group: &Group, name: &str) -> Result<Option<Vec<f64>>> {
    match group.dataset(name) {
        Ok(ds) => Ok(Some(ds.read_raw::<f64>()?)),
        Err(_) => Ok(None),
    }
}

/// Like `read_optional`, keeping the dataset's extents.
fn read_shaped(group: &Group, name: &str) -> Result<Option<Dataset>> {
    match group.dataset(name) {
        Ok(ds) => Ok(Some(Dataset::new(ds.read_raw::<f64>()?, ds.shape())?)),
        Err(_) => Ok(None),
    }
}

fn read_scatter(group: &Group) -> Result<Option<ScatterRecord>> {
    let Ok(scatter) = group.group("scatter_data") else {
        return Ok(None);
    };
    let g_min = scatter.dataset("g_min")?.read_raw::<i64>()?;
    let g_max = scatter.dataset("g_max")?.read_raw::<i64>()?;
    let scatter_matrix = scatter.dataset("scatter_matrix")?.read_raw::<f64>()?;
    let multiplicity_matrix = read_optional(&scatter, "multiplicity_matrix")?;
    Ok(Some(ScatterRecord {
        g_min,
        g_max,
        scatter_matrix,
        multiplicity_matrix,
    }))
}

fn read_temperature(group: &Group) -> Result<TemperatureRecord> {
    Ok(TemperatureRecord {
        total: read_optional(group, "total")?,
        absorption: read_optional(group, "absorption")?,
        fission: read_optional(group, "fission")?,
        kappa_fission: read_optional(group, "kappa-fission")?,
        nu_fission: read_shaped(group, "nu-fission")?,
        prompt_nu_fission: read_optional(group, "prompt-nu-fission")?,
        delayed_nu_fission: read_optional(group, "delayed-nu-fission")?,
        chi: read_shaped(group, "chi")?,
        chi_prompt: read_shaped(group, "chi-prompt")?,
        chi_delayed: read_shaped(group, "chi-delayed")?,
        beta: read_shaped(group, "beta")?,
        decay_rate: read_optional(group, "decay-rate")?,
        inverse_velocity: read_optional(group, "inverse-velocity")?,
        scatter_data: read_scatter(group)?,
    })
}

fn read_attributes(group: &Group) -> Result<NuclideAttributes> {
    let atomic_weight_ratio = group
        .attr("atomic_weight_ratio")
        .map_err(|_| Error::data(format!("{} has no atomic_weight_ratio", group.name())))?
        .read_scalar::<f64>()?;
    Ok(NuclideAttributes {
        atomic_weight_ratio,
        fissionable: read_bool_attr(group, "fissionable")?,
        representation: read_string_attr(group, "representation")?
            .unwrap_or_else(|| "isotropic".to_string()),
        scatter_format: read_string_attr(group, "scatter_format")?
            .unwrap_or_else(|| "legendre".to_string()),
        order: read_count_attr(group, "order")?.unwrap_or(0),
    })
}

impl MgxsLibrary for Hdf5Library {
    fn read_header(&self) -> Result<LibraryHeader> {
        let (groups, delayed) = self.num_groups()?;
        let boundaries = self
            .file
            .attr("group structure")
            .map_err(|_| Error::data("library has no 'group structure' attribute"))?
            .read_raw::<f64>()?;

        let mut nuclides = Vec::new();
        for name in self.file.member_names()? {
            let group = self.file.group(&name)?;
            let kts = Self::nuclide_kts(&group)?.into_iter().map(|(_, kt)| kt).collect();
            nuclides.push((name, kts));
        }
        LibraryHeader::new(groups, delayed, boundaries, nuclides)
    }

    fn read_nuclide(&self, name: &str, kts: &[f64]) -> Result<NuclideMgxs> {
        let (groups, delayed) = self.num_groups()?;
        let group = self
            .file
            .group(name)
            .map_err(|_| Error::config(format!("nuclide '{}' is not in the library", name)))?;
        let attributes = read_attributes(&group)?;
        let stored = Self::nuclide_kts(&group)?;

        let mut samples = Vec::with_capacity(kts.len());
        for &kt in kts {
            let label = label_for_kt(name, stored.iter().map(|(l, k)| (l.as_str(), *k)), kt)?;
            let data = group.group(label).map_err(|_| {
                Error::data(format!("nuclide '{}' lists {} but has no data for it", name, label))
            })?;
            samples.push((label.to_string(), kt, read_temperature(&data)?));
        }

        let mut available: Vec<f64> = stored.iter().map(|(_, kt)| *kt).collect();
        available.sort_by(f64::total_cmp);
        build_nuclide(name, &attributes, groups, delayed, available, samples)
    }
}
