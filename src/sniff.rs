//! Container sniffing

const BRANDS: [&[u8; 4]; 4] = [b"avif", b"avis", b"mif1", b"msf1"];

/// Whether `prefix` starts like an AVIF/HEIF file
///
/// Checks for an `ftyp` box with an AVIF-compatible major brand; 12 bytes
/// are enough.
pub fn is_avif(prefix: &[u8]) -> bool {
    prefix.len() >= 12 && &prefix[4..8] == b"ftyp" && BRANDS.iter().any(|b| &prefix[8..12] == *b)
}
