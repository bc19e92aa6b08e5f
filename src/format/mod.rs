/// IMD format constants and data modes

/// Format constants
pub mod constants;
/// Track data modes
pub mod mode;

pub use constants::*;
pub use mode::{DataMode, Encoding, ModeTranslation, NUM_MODES};

/// Check whether a buffer starts with the IMD signature
pub fn is_imd_signature(magic: &[u8]) -> bool {
    magic.starts_with(IMD_SIGNATURE)
}
