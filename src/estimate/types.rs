//! Sample types

/// Sampling rates tried in order, as powers of two: one row in 2^16, in 2^8,
/// then every row
pub const SAMPLE_RATE_INV_POW2_SEQUENCE: [u32; 3] = [16, 8, 0];

/// How a sample was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Full sample at one row in 2^16
    Large,
    /// Full sample at one row in 2^8
    Medium,
    /// Full sample reading every row
    Small,
    /// Every row read, fewer than the sample size
    Tiny,
    /// No rows at all
    Empty,
}

impl SampleKind {
    /// Kind of a full sample taken at `sample_rate_inv_pow2`
    pub fn for_full_sample(sample_rate_inv_pow2: u32) -> Self {
        match sample_rate_inv_pow2 {
            16.. => SampleKind::Large,
            1..=15 => SampleKind::Medium,
            0 => SampleKind::Small,
        }
    }

    /// Accept `len` rows sampled at `sample_rate_inv_pow2`, or `None` to
    /// retry at the next, denser rate
    ///
    /// Only a full sample is accepted before reading every row.
    pub fn classify(
        sample_rate_inv_pow2: u32,
        len: usize,
        max_sample_size: usize,
    ) -> Option<Self> {
        if len >= max_sample_size {
            Some(Self::for_full_sample(sample_rate_inv_pow2))
        } else if sample_rate_inv_pow2 > 0 {
            None
        } else if len == 0 {
            Some(SampleKind::Empty)
        } else {
            Some(SampleKind::Tiny)
        }
    }

    /// Rows represented by one sampled row
    pub fn value_weight(self, sample_rate_inv_pow2: u32) -> u64 {
        match self {
            SampleKind::Tiny | SampleKind::Empty => 1,
            _ => 1u64 << sample_rate_inv_pow2.min(63),
        }
    }
}

/// Values derived from sampled rows
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<T> {
    /// One value per sampled row, in sample order
    pub sampled_values: Vec<T>,
    pub kind: SampleKind,
    /// Rows in the table represented by one sampled row
    pub value_weight: u64,
}

impl<T> Sample<T> {
    pub fn new(sampled_values: Vec<T>, kind: SampleKind, value_weight: u64) -> Self {
        Self {
            sampled_values,
            kind,
            value_weight,
        }
    }

    /// Sample of an empty range
    pub fn empty() -> Self {
        Self::new(Vec::new(), SampleKind::Empty, 1)
    }

    pub fn is_empty(&self) -> bool {
        self.sampled_values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sampled_values.len()
    }

    /// Transform every value, keeping kind and weight
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Sample<U> {
        Sample {
            sampled_values: self.sampled_values.iter().map(f).collect(),
            kind: self.kind,
            value_weight: self.value_weight,
        }
    }
}
