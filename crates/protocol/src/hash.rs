//! String hashing for the libudev monitor filter fields.
//!
//! libudev hashes subsystem/devtype names and tag strings with
//! MurmurHash2 (32-bit, seed 0) and matches them against the header's
//! filter fields on the receiving side. The implementation here must
//! produce bit-identical output or receivers will filter out every
//! forwarded event.

/// MurmurHash2, 32-bit, as shipped in libudev's `murmur_hash2.c`.
///
/// Chunk loads are little-endian regardless of host byte order.
pub fn murmur2(data: &[u8], seed: u32) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let mut h = seed ^ data.len() as u32;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Hash a name string the way libudev's `util_string_hash32` does.
#[must_use]
pub fn string_hash(s: &str) -> u32 {
    murmur2(s.as_bytes(), 0)
}

/// Bloom filter contribution of a single tag.
///
/// Four 6-bit slices of the tag's hash each select one bit of a 64-bit
/// filter. The filter for an event is the OR over all its tags.
#[must_use]
pub fn tag_bloom(tag: &str) -> u64 {
    let hash = string_hash(tag);
    let mut bits = 0u64;
    bits |= 1 << (hash & 63);
    bits |= 1 << ((hash >> 6) & 63);
    bits |= 1 << ((hash >> 12) & 63);
    bits |= 1 << ((hash >> 18) & 63);
    bits
}
