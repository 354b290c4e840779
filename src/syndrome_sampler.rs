use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Bernoulli, Distribution};

use crate::error::{CrosscheckError, Result};

/// A bit is true if the detector at that index fired
pub type Bitstring = Vec<bool>;

/// Draws batches of synthetic syndromes from one seeded ChaCha stream.
#[derive(Debug, Clone)]
pub struct SyndromeSampler {
    rng : ChaCha8Rng,
    firing : Bernoulli,
}

impl SyndromeSampler {
    /// Every detector fires independently with probability 1/2.
    pub fn new(seed : u64) -> Self {
        SyndromeSampler {
            rng: ChaCha8Rng::seed_from_u64(seed),
            firing: Bernoulli::new(0.5).unwrap_or_else(|_| unreachable!("1/2 is a probability")),
        }
    }

    pub fn with_density(seed : u64, density : f64) -> Result<Self> {
        let firing = Bernoulli::new(density)
            .map_err(|e| CrosscheckError::InvalidParameter(format!("firing density {}: {}", density, e)))?;
        Ok(SyndromeSampler { rng: ChaCha8Rng::seed_from_u64(seed), firing })
    }

    pub fn sample(self : &mut Self, width : usize) -> Bitstring {
        (0..width).map(|_| self.firing.sample(&mut self.rng)).collect()
    }

    pub fn sample_batch(self : &mut Self, n : usize, width : usize) -> Vec<Bitstring> {
        (0..n).map(|_| self.sample(width)).collect()
    }
}

/// `n` uniformly random syndromes of `width` bits from a single generator seeded with `rng_seed`.
pub fn sample_syndromes(n : usize, width : usize, rng_seed : u64) -> Vec<Bitstring> {
    SyndromeSampler::new(rng_seed).sample_batch(n, width)
}

/// Wire form: `0`/`1` tokens separated by single spaces.
pub fn format_syndrome(syndrome : &[bool]) -> String {
    syndrome.iter().map(|&b| if b { "1" } else { "0" }).collect::<Vec<_>>().join(" ")
}
