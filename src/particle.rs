/// Per-history state the variance reduction controller acts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: [f64; 3],
    pub direction: [f64; 3],
    /// Current energy group (0 is the highest energy group).
    pub group: usize,
    pub weight: f64,
    /// Region (cell) the particle is currently in.
    pub region: u32,
    /// sqrt(kT) of the material at the particle's position, in eV^1/2.
    pub sqrt_kt: f64,
    pub alive: bool,
    pub id: u64,
}

impl Particle {
    pub fn new(position: [f64; 3], direction: [f64; 3], group: usize) -> Self {
        Self {
            position,
            direction,
            group,
            weight: 1.0,
            region: 0,
            sqrt_kt: 0.0,
            alive: true,
            id: 0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn in_region(mut self, region: u32) -> Self {
        self.region = region;
        self
    }

    /// Terminate the history; its weight no longer contributes.
    pub fn kill(&mut self) {
        self.alive = false;
        self.weight = 0.0;
    }
}
