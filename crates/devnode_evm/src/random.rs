use devnode_eth::{keccak256, B256};

/// A pseudorandom hash generator that repeatedly hashes its seed to produce
/// a deterministic sequence of hashes.
#[derive(Clone, Debug)]
pub struct RandomHashGenerator {
    /// The seed the generator was created with.
    seed: String,
    /// The next value to be returned.
    next_value: B256,
}

impl RandomHashGenerator {
    /// Constructs an instance with the specified seed.
    pub fn with_seed(seed: impl Into<String>) -> Self {
        let seed = seed.into();
        let next_value = keccak256(seed.as_bytes());

        Self { seed, next_value }
    }

    /// Returns the next hash in the sequence, advancing the generator.
    pub fn generate_next(&mut self) -> B256 {
        let mut next_value = keccak256(self.next_value);

        std::mem::swap(&mut self.next_value, &mut next_value);

        next_value
    }

    /// Returns the next hash without advancing the generator.
    pub fn next_value(&self) -> B256 {
        self.next_value
    }

    /// Overwrites the next value, resuming the sequence from the provided
    /// hash.
    pub fn set_next(&mut self, next_value: B256) {
        self.next_value = next_value;
    }

    /// Returns the generator's seed.
    pub fn seed(&self) -> &str {
        &self.seed
    }
}
