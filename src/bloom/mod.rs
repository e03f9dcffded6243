//! Bloom membership filters over symbol identifiers.
//!
//! Each upload carries an encoded filter describing the identifiers it
//! imports or implements. The remote search phase decodes these blobs to
//! shortlist candidate uploads before running an exact moniker search.
//!
//! The encoding is a zstd-compressed JSON payload holding the bit buckets and
//! the number of hash functions. Bit positions are derived by double hashing
//! two seeded 32-bit FNV-1a hashes of the identifier's UTF-8 bytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const SECOND_HASH_SEED: u32 = 0x5df3_d5c9;
const BITS_PER_BUCKET: usize = 32;
const COMPRESSION_LEVEL: i32 = 3;

/// Errors decoding or encoding a filter blob.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("failed to decompress filter: {0}")]
    Compression(#[from] std::io::Error),

    #[error("failed to parse filter payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("filter has no buckets")]
    Empty,

    #[error("filter has no hash functions")]
    NoHashFunctions,
}

#[derive(Serialize, Deserialize)]
struct FilterPayload {
    buckets: Vec<u32>,
    num_hash_functions: u32,
}

/// Probabilistic set of identifiers. May report false positives, never false
/// negatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    buckets: Vec<u32>,
    num_hash_functions: u32,
}

impl BloomFilter {
    /// Create an empty filter with at least `num_bits` bits.
    pub fn new(num_bits: usize, num_hash_functions: u32) -> Self {
        let num_buckets = num_bits.div_ceil(BITS_PER_BUCKET).max(1);
        Self {
            buckets: vec![0; num_buckets],
            num_hash_functions: num_hash_functions.max(1),
        }
    }

    /// Size a filter for `expected_items` at the given false positive rate.
    pub fn with_capacity(expected_items: usize, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);
        let ln2 = std::f64::consts::LN_2;

        let num_bits = (-(n * p.ln()) / (ln2 * ln2)).ceil() as usize;
        let num_hash_functions = ((num_bits as f64 / n) * ln2).round() as u32;

        Self::new(num_bits, num_hash_functions)
    }

    /// Build a filter containing every given identifier.
    pub fn from_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let identifiers: Vec<S> = identifiers.into_iter().collect();
        let mut filter = Self::with_capacity(identifiers.len(), 0.01);
        for identifier in &identifiers {
            filter.insert(identifier.as_ref());
        }
        filter
    }

    pub fn insert(&mut self, identifier: &str) {
        for bit in self.bit_positions(identifier) {
            self.buckets[bit / BITS_PER_BUCKET] |= 1 << (bit % BITS_PER_BUCKET);
        }
    }

    /// Returns true if the identifier was probably inserted.
    pub fn contains(&self, identifier: &str) -> bool {
        self.bit_positions(identifier)
            .all(|bit| self.buckets[bit / BITS_PER_BUCKET] & (1 << (bit % BITS_PER_BUCKET)) != 0)
    }

    /// Returns true if any of the identifiers was probably inserted.
    pub fn contains_any<'a, I>(&self, identifiers: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        identifiers.into_iter().any(|identifier| self.contains(identifier))
    }

    pub fn num_bits(&self) -> usize {
        self.buckets.len() * BITS_PER_BUCKET
    }

    pub fn num_hash_functions(&self) -> u32 {
        self.num_hash_functions
    }

    pub fn encode(&self) -> Result<Vec<u8>, FilterError> {
        let payload = serde_json::to_vec(&FilterPayload {
            buckets: self.buckets.clone(),
            num_hash_functions: self.num_hash_functions,
        })?;
        Ok(zstd::stream::encode_all(payload.as_slice(), COMPRESSION_LEVEL)?)
    }

    pub fn decode(encoded: &[u8]) -> Result<Self, FilterError> {
        let payload = zstd::stream::decode_all(encoded)?;
        let payload: FilterPayload = serde_json::from_slice(&payload)?;

        if payload.buckets.is_empty() {
            return Err(FilterError::Empty);
        }
        if payload.num_hash_functions == 0 {
            return Err(FilterError::NoHashFunctions);
        }

        Ok(Self {
            buckets: payload.buckets,
            num_hash_functions: payload.num_hash_functions,
        })
    }

    fn bit_positions(&self, identifier: &str) -> impl Iterator<Item = usize> {
        let m = self.num_bits() as u64;
        let first = u64::from(fnv1a(identifier, 0));
        let step = u64::from(fnv1a(identifier, SECOND_HASH_SEED));

        let mut x = first % m;
        (0..self.num_hash_functions).map(move |_| {
            let bit = x as usize;
            x = (x + step) % m;
            bit
        })
    }
}

/// Decode a filter blob and test whether it probably contains any of the
/// given identifiers.
pub fn test_filter<'a, I>(encoded: &[u8], identifiers: I) -> Result<bool, FilterError>
where
    I: IntoIterator<Item = &'a str>,
{
    Ok(BloomFilter::decode(encoded)?.contains_any(identifiers))
}

fn fnv1a(value: &str, seed: u32) -> u32 {
    let mut hash = FNV_OFFSET_BASIS ^ seed;
    for byte in value.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    mix(hash)
}

// Final avalanche so nearby identifiers spread across the bit space.
fn mix(mut a: u32) -> u32 {
    a = a.wrapping_add(a << 13);
    a ^= a >> 7;
    a = a.wrapping_add(a << 3);
    a ^= a >> 17;
    a.wrapping_add(a << 5)
}
