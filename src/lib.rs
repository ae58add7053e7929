//! Multi-group cross section (MGXS) data model, lookup engine and variance
//! reduction controller for Monte Carlo particle transport.
//!
//! Typical use: build an [`MgxsInterface`] once (directly, or from a
//! [`Config`]), wrap it in an `Arc`, and share it with the worker threads
//! that call [`MgxsInterface::calculate_xs`] and the general lookups.
//!
//! ```no_run
//! use std::sync::Arc;
//! use yamc_mg::{Config, XsQuery, XsType};
//!
//! let config = Config::from_file("run.json")?;
//! let xs = Arc::new(config.build_interface()?);
//! let (total, absorption, nu_fission) = xs.calculate_xs(0, 0, 0.16, &[0.0, 0.0, 1.0]);
//! let chi = xs.get_macro_xs(0, XsType::ChiPrompt, 0, &XsQuery::new().outgoing(1));
//! # let _ = (total, absorption, nu_fission, chi);
//! # Ok::<(), yamc_mg::Error>(())
//! ```

mod bank;
mod config;
mod energy_groups;
mod error;
mod fast_rng;
mod interface;
mod library;
#[cfg(feature = "hdf5")]
mod library_hdf5;
mod macro_xs;
mod material;
mod nuclide;
mod particle;
mod query;
mod scatter;
mod temperature;
mod utilities;
mod variance_reduction;
mod xs_data;

pub use bank::ParticleBank;
pub use config::Config;
pub use energy_groups::EnergyGroupStructure;
pub use error::{Error, Result};
pub use fast_rng::{future_seed, FastRng, PRN_STRIDE};
pub use interface::MgxsInterface;
pub use library::{
    open_library, Dataset, JsonLibrary, LibraryDocument, LibraryHeader, MgxsLibrary,
    NuclideAttributes, NuclideEntry, NuclideRecord, ScatterRecord, TemperatureRecord,
};
#[cfg(feature = "hdf5")]
pub use library_hdf5::Hdf5Library;
pub use macro_xs::MacroMgxs;
pub use material::{MaterialNuclide, MaterialSpec};
pub use nuclide::NuclideMgxs;
pub use particle::Particle;
pub use query::{XsQuery, XsType};
pub use scatter::{ScatterFormat, ScatterMatrix};
pub use temperature::{
    kelvin_from_kt, sqrt_kt_from_kelvin, TemperatureMethod, TemperatureSelection,
    TemperatureSelector, K_BOLTZMANN,
};
pub use utilities::{find_interval, legendre_series};
pub use variance_reduction::{
    read_importances, read_variance_reduction, read_weight_windows, Outcome,
    SharedVarianceReduction, VarianceReduction, WeightWindow, DEFAULT_MAX_SPLIT,
};
pub use xs_data::{DataLayout, XsData};

#[allow(dead_code)]
fn assert_shareable() {
    fn is_send_sync<T: Send + Sync>() {}
    is_send_sync::<MgxsInterface>();
    is_send_sync::<SharedVarianceReduction>();
}
