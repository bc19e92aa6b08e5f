/// Track data modes (encoding and data rate)

use std::fmt;

/// Number of data modes the format defines
pub const NUM_MODES: usize = 6;

/// Recording encoding of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// FM (Frequency Modulation) - single density
    FM,
    /// MFM (Modified Frequency Modulation) - double density
    MFM,
}

/// Data mode byte of a track: encoding × data rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// 500 kbps FM
    Fm500 = 0,
    /// 300 kbps FM
    Fm300 = 1,
    /// 250 kbps FM
    Fm250 = 2,
    /// 500 kbps MFM
    Mfm500 = 3,
    /// 300 kbps MFM
    Mfm300 = 4,
    /// 250 kbps MFM
    Mfm250 = 5,
}

impl DataMode {
    /// All modes in code order
    pub const ALL: [DataMode; NUM_MODES] = [
        DataMode::Fm500,
        DataMode::Fm300,
        DataMode::Fm250,
        DataMode::Mfm500,
        DataMode::Mfm300,
        DataMode::Mfm250,
    ];

    /// Decode a mode byte
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Encode as a mode byte
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Data rate in kbps
    pub fn rate_kbps(self) -> u16 {
        match self {
            DataMode::Fm500 | DataMode::Mfm500 => 500,
            DataMode::Fm300 | DataMode::Mfm300 => 300,
            DataMode::Fm250 | DataMode::Mfm250 => 250,
        }
    }

    /// Recording encoding
    pub fn encoding(self) -> Encoding {
        match self {
            DataMode::Fm500 | DataMode::Fm300 | DataMode::Fm250 => Encoding::FM,
            _ => Encoding::MFM,
        }
    }

    /// Find the mode with the given encoding and rate
    pub fn with_rate(encoding: Encoding, rate_kbps: u16) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.encoding() == encoding && m.rate_kbps() == rate_kbps)
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enc = match self.encoding() {
            Encoding::FM => "FM",
            Encoding::MFM => "MFM",
        };
        write!(f, "{} kbps {}", self.rate_kbps(), enc)
    }
}

/// Mode byte translation applied when writing tracks
///
/// Index is the mode read, value is the mode written. Bytes outside the
/// defined modes are written unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTranslation(pub [u8; NUM_MODES]);

impl Default for ModeTranslation {
    fn default() -> Self {
        Self::identity()
    }
}

impl ModeTranslation {
    /// Translation that leaves every mode alone
    pub fn identity() -> Self {
        let mut table = [0u8; NUM_MODES];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = i as u8;
        }
        ModeTranslation(table)
    }

    /// Map every mode at `from_kbps` to the mode with the same encoding at `to_kbps`
    ///
    /// Returns false (leaving the table untouched) if either rate is not one
    /// of 250, 300 or 500.
    pub fn translate_rate(&mut self, from_kbps: u16, to_kbps: u16) -> bool {
        let mut updates = Vec::new();
        for mode in DataMode::ALL {
            if mode.rate_kbps() != from_kbps {
                continue;
            }
            match DataMode::with_rate(mode.encoding(), to_kbps) {
                Some(target) => updates.push((mode, target)),
                None => return false,
            }
        }
        if updates.is_empty() {
            return false;
        }
        for (from, to) in updates {
            self.0[from.code() as usize] = to.code();
        }
        true
    }

    /// Apply the translation to a mode byte
    pub fn apply(&self, mode: u8) -> u8 {
        self.0.get(mode as usize).copied().unwrap_or(mode)
    }

    /// Check whether this translation changes nothing
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_conversion() {
        assert_eq!(DataMode::from_code(0), Some(DataMode::Fm500));
        assert_eq!(DataMode::from_code(5), Some(DataMode::Mfm250));
        assert_eq!(DataMode::from_code(6), None);
        assert_eq!(DataMode::Mfm300.code(), 4);
    }

    #[test]
    fn test_mode_properties() {
        assert_eq!(DataMode::Fm250.rate_kbps(), 250);
        assert_eq!(DataMode::Fm250.encoding(), Encoding::FM);
        assert_eq!(DataMode::Mfm500.encoding(), Encoding::MFM);
        assert_eq!(DataMode::Mfm300.to_string(), "300 kbps MFM");
    }

    #[test]
    fn test_translate_rate_keeps_encoding() {
        let mut table = ModeTranslation::identity();
        assert!(table.is_identity());
        assert!(table.translate_rate(300, 250));

        assert_eq!(table.apply(DataMode::Fm300.code()), DataMode::Fm250.code());
        assert_eq!(table.apply(DataMode::Mfm300.code()), DataMode::Mfm250.code());
        assert_eq!(table.apply(DataMode::Mfm500.code()), DataMode::Mfm500.code());
        assert!(!table.is_identity());
    }

    #[test]
    fn test_translate_rate_invalid() {
        let mut table = ModeTranslation::identity();
        assert!(!table.translate_rate(400, 250));
        assert!(!table.translate_rate(250, 125));
        assert!(table.is_identity());
    }

    #[test]
    fn test_apply_unknown_mode() {
        let table = ModeTranslation::identity();
        assert_eq!(table.apply(9), 9);
    }
}
