// Particle banking for split copies
//
// Splitting at a region crossing or weight window check leaves the primary
// in place and queues the extra copies here; the transport kernel drains the
// bank before starting the next history.

use crate::particle::Particle;
use std::collections::VecDeque;

/// FIFO of particles still to be transported within one history.
#[derive(Debug, Clone, Default)]
pub struct ParticleBank {
    queue: VecDeque<Particle>,
}

impl ParticleBank {
    pub fn new() -> Self {
        ParticleBank {
            queue: VecDeque::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ParticleBank {
            queue: VecDeque::with_capacity(capacity),
        }
    }

    /// Queue a split copy.
    pub fn bank_split(&mut self, particle: Particle) {
        self.queue.push_back(particle);
    }

    /// Next particle to transport, `None` once the history is finished.
    pub fn pop_particle(&mut self) -> Option<Particle> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Summed weight of every queued particle.
    pub fn total_weight(&self) -> f64 {
        self.queue.iter().map(|p| p.weight).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.queue.iter()
    }
}
