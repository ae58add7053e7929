// Importance splitting / Russian roulette and weight windows
//
// Every operation keeps the expected total weight of a history unchanged:
// splitting divides weight evenly over the copies, roulette scales the
// survivor's weight by one over its survival probability.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bank::ParticleBank;
use crate::error::{Error, Result};
use crate::particle::Particle;

/// Split count cap used when the configuration does not set `max_split`.
pub const DEFAULT_MAX_SPLIT: u32 = 10;

/// Acceptable weight band of one (region, group) cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightWindow {
    pub lower: f64,
    pub upper: f64,
    /// Weight of split copies and roulette survivors.
    pub target: f64,
}

impl WeightWindow {
    /// `target` defaults to the geometric mean of the bounds.
    pub fn new(lower: f64, upper: f64, target: Option<f64>) -> Result<Self> {
        if !(lower.is_finite() && upper.is_finite()) || lower <= 0.0 || upper <= 0.0 {
            return Err(Error::config(format!(
                "weight window bounds must be positive and finite, got [{}, {}]",
                lower, upper
            )));
        }
        if lower > upper {
            return Err(Error::config(format!(
                "weight window lower bound {} exceeds upper bound {}",
                lower, upper
            )));
        }
        let target = target.unwrap_or_else(|| (lower * upper).sqrt());
        if !(lower..=upper).contains(&target) {
            return Err(Error::config(format!(
                "weight window target {} outside [{}, {}]",
                target, lower, upper
            )));
        }
        Ok(Self { lower, upper, target })
    }
}

/// What a variance reduction check did to the particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    /// Split into `copies` particles in total; `copies - 1` were banked.
    Split { copies: u32 },
    /// Survived roulette with increased weight.
    Survived,
    /// Lost roulette and was killed.
    Killed,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImportanceEntry {
    region: u32,
    importance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WeightWindowEntry {
    region: u32,
    #[serde(default)]
    group: Option<usize>,
    lower: f64,
    upper: f64,
    #[serde(default)]
    target: Option<f64>,
}

/// Importance map and weight window table, read once from configuration
/// and only read during tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceReduction {
    num_groups: usize,
    max_split: u32,
    importances: HashMap<u32, f64>,
    /// region -> one slot per energy group
    windows: HashMap<u32, Vec<Option<WeightWindow>>>,
}

impl VarianceReduction {
    pub fn new(num_groups: usize) -> Self {
        Self {
            num_groups,
            max_split: DEFAULT_MAX_SPLIT,
            importances: HashMap::new(),
            windows: HashMap::new(),
        }
    }

    pub fn set_max_split(&mut self, max_split: u32) -> Result<()> {
        if max_split == 0 {
            return Err(Error::config("max_split must be at least 1"));
        }
        self.max_split = max_split;
        Ok(())
    }

    pub fn set_importance(&mut self, region: u32, importance: f64) -> Result<()> {
        if !importance.is_finite() || importance <= 0.0 {
            return Err(Error::config(format!(
                "importance of region {} must be positive, got {}",
                region, importance
            )));
        }
        if self.importances.insert(region, importance).is_some() {
            return Err(Error::config(format!("duplicate importance for region {}", region)));
        }
        Ok(())
    }

    /// Set the window of one group of `region`, or of every group when
    /// `group` is `None`.
    pub fn set_weight_window(&mut self, region: u32, group: Option<usize>, window: WeightWindow) -> Result<()> {
        let num_groups = self.num_groups;
        let groups = match group {
            Some(g) if g >= num_groups => {
                return Err(Error::config(format!(
                    "weight window for region {} names group {} but there are {} groups",
                    region, g, num_groups
                )));
            }
            Some(g) => g..g + 1,
            None => 0..num_groups,
        };
        let slots = self
            .windows
            .entry(region)
            .or_insert_with(|| vec![None; num_groups]);
        if let Some(g) = groups.clone().find(|g| slots[*g].is_some()) {
            return Err(Error::config(format!(
                "duplicate weight window for region {} group {}",
                region, g
            )));
        }
        for g in groups {
            slots[g] = Some(window);
        }
        Ok(())
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn max_split(&self) -> u32 {
        self.max_split
    }

    pub fn has_importances(&self) -> bool {
        !self.importances.is_empty()
    }

    pub fn has_weight_windows(&self) -> bool {
        !self.windows.is_empty()
    }

    /// Importance of a region; regions without an entry have importance 1.
    #[inline]
    pub fn importance(&self, region: u32) -> f64 {
        self.importances.get(&region).copied().unwrap_or(1.0)
    }

    #[inline]
    pub fn weight_window(&self, region: u32, group: usize) -> Option<&WeightWindow> {
        self.windows.get(&region)?.get(group)?.as_ref()
    }

    /// Split into `n` copies of equal weight, banking all but the primary.
    fn split(&self, particle: &mut Particle, n: u32, bank: &mut ParticleBank) -> Outcome {
        if n <= 1 {
            return Outcome::Unchanged;
        }
        particle.weight /= f64::from(n);
        for _ in 1..n {
            bank.bank_split(particle.clone());
        }
        Outcome::Split { copies: n }
    }

    /// Survive with `probability`, taking `survivor_weight`.
    fn roulette<R: Rng + ?Sized>(particle: &mut Particle, probability: f64, survivor_weight: f64, rng: &mut R) -> Outcome {
        if rng.gen::<f64>() < probability {
            particle.weight = survivor_weight;
            Outcome::Survived
        } else {
            particle.kill();
            Outcome::Killed
        }
    }

    /// Move `particle` into `new_region`, splitting or rouletting it by the
    /// importance ratio of the two regions.
    pub fn apply_importance<R: Rng + ?Sized>(
        &self,
        particle: &mut Particle,
        new_region: u32,
        rng: &mut R,
        bank: &mut ParticleBank,
    ) -> Outcome {
        let ratio = self.importance(new_region) / self.importance(particle.region);
        particle.region = new_region;
        if ratio > 1.0 {
            let n = (ratio.round() as u32).clamp(1, self.max_split);
            self.split(particle, n, bank)
        } else if ratio < 1.0 {
            let weight = particle.weight / ratio;
            Self::roulette(particle, ratio, weight, rng)
        } else {
            Outcome::Unchanged
        }
    }

    /// Check the particle's weight against the window of its current region
    /// and group.
    ///
    /// A heavy particle is split into `ceil(W / target)` copies, at most
    /// `max_split`. When the cap binds the copies keep weight `W / max_split`,
    /// which can still be above `upper`; they are split further at their next
    /// window check.
    pub fn apply_weight_window<R: Rng + ?Sized>(
        &self,
        particle: &mut Particle,
        rng: &mut R,
        bank: &mut ParticleBank,
    ) -> Outcome {
        let Some(window) = self.weight_window(particle.region, particle.group) else {
            return Outcome::Unchanged;
        };
        let weight = particle.weight;
        if weight > window.upper {
            let wanted = (weight / window.target).ceil();
            let n = (wanted as u32).clamp(1, self.max_split);
            if wanted > f64::from(self.max_split) {
                log::debug!(
                    "split of weight {} capped at {} copies, leaving {} above the window [{}, {}]",
                    weight,
                    n,
                    weight / f64::from(n),
                    window.lower,
                    window.upper
                );
            }
            self.split(particle, n, bank)
        } else if weight < window.lower {
            Self::roulette(particle, weight / window.target, window.target, rng)
        } else {
            Outcome::Unchanged
        }
    }

    /// Region crossing: importance first, then the new region's window.
    /// Returns the importance outcome, or the window outcome when the
    /// importance step left the particle unchanged.
    pub fn on_region_crossing<R: Rng + ?Sized>(
        &self,
        particle: &mut Particle,
        new_region: u32,
        rng: &mut R,
        bank: &mut ParticleBank,
    ) -> Outcome {
        let first = if self.has_importances() {
            self.apply_importance(particle, new_region, rng, bank)
        } else {
            particle.region = new_region;
            Outcome::Unchanged
        };
        if !particle.alive || !self.has_weight_windows() {
            return first;
        }
        match self.apply_weight_window(particle, rng, bank) {
            Outcome::Unchanged => first,
            second => second,
        }
    }

    /// Collision: only the weight window applies.
    pub fn on_collision<R: Rng + ?Sized>(&self, particle: &mut Particle, rng: &mut R, bank: &mut ParticleBank) -> Outcome {
        self.apply_weight_window(particle, rng, bank)
    }
}

/// Parse the `importances` list: `[{"region": 1, "importance": 2.0}, ...]`.
pub fn read_importances(node: &Value) -> Result<Vec<(u32, f64)>> {
    let entries: Vec<ImportanceEntry> =
        serde_json::from_value(node.clone()).map_err(|e| Error::config(format!("invalid importances: {}", e)))?;
    Ok(entries.into_iter().map(|e| (e.region, e.importance)).collect())
}

/// Parse the `weight_windows` list:
/// `[{"region": 1, "group": 0, "lower": 0.5, "upper": 2.0, "target": 1.0}, ...]`
/// where `group` and `target` are optional.
pub fn read_weight_windows(node: &Value) -> Result<Vec<(u32, Option<usize>, WeightWindow)>> {
    let entries: Vec<WeightWindowEntry> =
        serde_json::from_value(node.clone()).map_err(|e| Error::config(format!("invalid weight_windows: {}", e)))?;
    entries
        .into_iter()
        .map(|e| Ok((e.region, e.group, WeightWindow::new(e.lower, e.upper, e.target)?)))
        .collect()
}

/// Build the controller from a configuration node with optional
/// `importances`, `weight_windows` and `max_split` members.
pub fn read_variance_reduction(node: &Value, num_groups: usize) -> Result<VarianceReduction> {
    let mut vr = VarianceReduction::new(num_groups);
    if let Some(max_split) = node.get("max_split") {
        let n = max_split
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| Error::config(format!("invalid max_split {}", max_split)))?;
        vr.set_max_split(n)?;
    }
    if let Some(list) = node.get("importances") {
        for (region, importance) in read_importances(list)? {
            vr.set_importance(region, importance)?;
        }
    }
    if let Some(list) = node.get("weight_windows") {
        for (region, group, window) in read_weight_windows(list)? {
            vr.set_weight_window(region, group, window)?;
        }
    }
    log::info!(
        "Variance reduction: {} importance region(s), {} weight window region(s), max split {}",
        vr.importances.len(),
        vr.windows.len(),
        vr.max_split
    );
    Ok(vr)
}

/// Active variance reduction tables, replaceable between batches.
///
/// Workers take a [`snapshot`](Self::snapshot) at the start of a batch and
/// keep using it; [`replace`](Self::replace) swaps in a new table for later
/// snapshots without touching the one in use.
#[derive(Debug)]
pub struct SharedVarianceReduction {
    active: RwLock<Arc<VarianceReduction>>,
}

impl SharedVarianceReduction {
    pub fn new(vr: VarianceReduction) -> Self {
        Self {
            active: RwLock::new(Arc::new(vr)),
        }
    }

    pub fn snapshot(&self) -> Arc<VarianceReduction> {
        match self.active.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Install `vr` and return the table it replaced.
    pub fn replace(&self, vr: VarianceReduction) -> Arc<VarianceReduction> {
        let new = Arc::new(vr);
        let mut guard = match self.active.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, new)
    }
}
