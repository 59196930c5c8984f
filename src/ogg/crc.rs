// Ogg page checksum
//
// Unreflected CRC-32 over polynomial 0x04C11DB7, initial value 0, no final xor.
// This is not the reflected CRC-32 used by zip/ethernet, so the usual crates
// (crc32fast and friends) produce different values.

const POLYNOMIAL: u32 = 0x04c1_1db7;

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            r = if r & 0x8000_0000 != 0 {
                (r << 1) ^ POLYNOMIAL
            } else {
                r << 1
            };
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

/// Lookup table, built at compile time.
pub static CRC_TABLE: [u32; 256] = make_table();

/// Continue a checksum from `seed` over `data`.
///
/// Feeding a page in several pieces gives the same result as one pass over
/// the concatenation, which is how the decoder checks header, segment table
/// and body as they arrive.
pub fn extend_crc32(mut seed: u32, data: &[u8]) -> u32 {
    for &b in data {
        seed = CRC_TABLE[((seed >> 24) as u8 ^ b) as usize] ^ (seed << 8);
    }
    seed
}

/// Checksum of `data` from a zero seed.
pub fn crc32(data: &[u8]) -> u32 {
    extend_crc32(0, data)
}
