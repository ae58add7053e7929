use crate::error::{Error, Result};
use crate::utilities::find_interval;

/// Energy group boundaries shared by every nuclide and material of a library.
///
/// Groups follow the transport convention: group 0 is the highest energy
/// group. Three views are precomputed at load time:
/// * `energy_bins` - boundaries in descending order (group `g` spans
///   `energy_bins[g + 1]..energy_bins[g]`)
/// * `rev_energy_bins` - the same boundaries ascending, used for searching
/// * `energy_bin_avg` - midpoint energy of each group
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGroupStructure {
    energy_bins: Vec<f64>,
    rev_energy_bins: Vec<f64>,
    energy_bin_avg: Vec<f64>,
}

impl EnergyGroupStructure {
    /// Build the structure from library boundaries in eV.
    ///
    /// Boundaries may be given ascending (the library convention) or
    /// descending; anything not strictly monotonic, non-finite or negative is
    /// a data integrity error.
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if boundaries.len() < 2 {
            return Err(Error::data(format!(
                "group structure needs at least 2 boundaries, found {}",
                boundaries.len()
            )));
        }
        if boundaries.iter().any(|e| !e.is_finite() || *e < 0.0) {
            return Err(Error::data(
                "group structure boundaries must be finite and non-negative",
            ));
        }

        let ascending = boundaries.windows(2).all(|w| w[1] > w[0]);
        let descending = boundaries.windows(2).all(|w| w[1] < w[0]);
        let rev_energy_bins = if ascending {
            boundaries
        } else if descending {
            boundaries.into_iter().rev().collect()
        } else {
            return Err(Error::data("group structure must be strictly monotonic"));
        };

        let energy_bins: Vec<f64> = rev_energy_bins.iter().rev().copied().collect();
        let energy_bin_avg = energy_bins
            .windows(2)
            .map(|w| 0.5 * (w[0] + w[1]))
            .collect();

        Ok(Self {
            energy_bins,
            rev_energy_bins,
            energy_bin_avg,
        })
    }

    /// Build the structure and check it against the group count declared by
    /// the library header.
    pub fn with_group_count(boundaries: Vec<f64>, num_groups: usize) -> Result<Self> {
        if boundaries.len() != num_groups + 1 {
            return Err(Error::data(format!(
                "group structure has {} boundaries but the library declares {} groups",
                boundaries.len(),
                num_groups
            )));
        }
        Self::new(boundaries)
    }

    pub fn num_groups(&self) -> usize {
        self.energy_bin_avg.len()
    }

    /// Boundaries in descending energy order (length G + 1).
    pub fn energy_bins(&self) -> &[f64] {
        &self.energy_bins
    }

    /// Boundaries in ascending energy order (length G + 1).
    pub fn rev_energy_bins(&self) -> &[f64] {
        &self.rev_energy_bins
    }

    /// Midpoint energy of each group, indexed by group.
    pub fn energy_bin_avg(&self) -> &[f64] {
        &self.energy_bin_avg
    }

    /// Lower and upper energy of a group.
    ///
    /// # Panics
    /// Panics if `group` is not a valid group index.
    pub fn group_bounds(&self, group: usize) -> (f64, f64) {
        assert!(
            group < self.num_groups(),
            "group {} out of range for {} groups",
            group,
            self.num_groups()
        );
        (self.energy_bins[group + 1], self.energy_bins[group])
    }

    /// Group containing `energy`, or `None` outside the structure.
    ///
    /// Each group includes its lower boundary; the top boundary of the
    /// structure belongs to group 0.
    pub fn find_group(&self, energy: f64) -> Option<usize> {
        let lowest = self.rev_energy_bins[0];
        let highest = self.rev_energy_bins[self.rev_energy_bins.len() - 1];
        if !(lowest..=highest).contains(&energy) {
            return None;
        }
        let ascending_bin = find_interval(&self.rev_energy_bins, energy);
        Some(self.num_groups() - 1 - ascending_bin)
    }
}
