/// IMD format magic bytes and constants

/// Every IMD header line starts with this signature
pub const IMD_SIGNATURE: &[u8] = b"IMD ";

/// Byte that ends the comment block
pub const COMMENT_TERMINATOR: u8 = 0x1A;

/// Longest header line accepted, including the line ending
pub const MAX_HEADER_LINE: usize = 256;

/// Head byte flag: a cylinder map follows the sector map
pub const HFLAG_CYLINDER_MAP: u8 = 0x80;

/// Head byte flag: a head map follows the sector (and cylinder) map
pub const HFLAG_HEAD_MAP: u8 = 0x40;

/// Bits of the head byte holding the head number
pub const HEAD_MASK: u8 = 0x3F;

/// Maximum number of sectors per track (the count is a single byte)
pub const MAX_SECTORS_PER_TRACK: usize = 255;

/// Largest sector the format can describe
pub const MAX_SECTOR_SIZE: usize = 8192;

/// Fill value for unavailable sectors when the caller has no preference
pub const DEFAULT_FILL_BYTE: u8 = 0xE5;

/// Sector size code to byte size mapping
/// Index: size_code (0-6), Value: size in bytes
pub const SECTOR_SIZES: [usize; 7] = [
    128,  // 0
    256,  // 1
    512,  // 2
    1024, // 3
    2048, // 4
    4096, // 5
    8192, // 6
];

/// Convert a size code to a byte size, `None` for unsupported codes
#[inline]
pub fn size_code_to_bytes(size_code: u8) -> Option<usize> {
    SECTOR_SIZES.get(size_code as usize).copied()
}

/// Convert a byte size to a size code
#[inline]
pub fn bytes_to_size_code(bytes: usize) -> Option<u8> {
    SECTOR_SIZES
        .iter()
        .position(|&size| size == bytes)
        .map(|code| code as u8)
}
