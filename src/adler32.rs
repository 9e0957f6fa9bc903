// Author: Lukas Bower
// Purpose: Compute Adler-32 checksums for the optional large-I/O extension.

//! Adler-32 (RFC 1950), used to checksum the optional large-I/O payloads.
//!
//! Not provided by any dependency already in the workspace; small enough to
//! hand-roll rather than pull in a crate for one function.

const MOD_ADLER: u32 = 65521;

/// Fold `data` into a running Adler-32 checksum. Seed with `1` (the identity
/// for an empty input) for a fresh computation.
pub fn adler32(seed: u32, data: &[u8]) -> u32 {
    let mut a = seed & 0xffff;
    let mut b = (seed >> 16) & 0xffff;
    for chunk in data.chunks(5552) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD_ADLER;
        b %= MOD_ADLER;
    }
    (b << 16) | a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_of_empty_input() {
        assert_eq!(adler32(1, &[]), 1);
    }

    #[test]
    fn known_vector() {
        // "Wikipedia" -> 0x11E60398, the canonical worked example.
        assert_eq!(adler32(1, b"Wikipedia"), 0x11E6_0398);
    }

    #[test]
    fn chunk_boundary_matches_single_pass() {
        let data = alloc::vec![0x5Au8; 5552 * 2 + 37];
        let whole = adler32(1, &data);
        let mut running = 1;
        for chunk in data.chunks(1000) {
            running = adler32(running, chunk);
        }
        assert_eq!(whole, running);
    }
}
