//! Station characteristics reported by the Status-Chars-Get command.

use crate::internal::dma::VolatileCell;

/// Response longword holding the station type
const STATION_TYPE_WORD: usize = 5;
/// Response longword holding the SMT version id
const SMT_VERSION_WORD: usize = 6;
/// Response longword holding the module revision bytes
const MODULE_REV_WORD: usize = 9;
/// Response longwords holding the PHY types of ports A and B
const PHY_TYPE_WORD: usize = 40;
/// Response longwords holding the PMD types of ports A and B
const PMD_TYPE_WORD: usize = 42;

const SMT_VERSIONS: [&str; 4] = ["", "V6.2", "V7.2", "V7.3"];

const PHY_TYPES: [char; 4] = ['A', 'B', 'S', 'M'];

const PMD_TYPES0: [&str; 4] = [
    "ANSI Multi-Mode",
    "ANSI Single-Mode Type 1",
    "ANSI Single-Mode Type 2",
    "ANSI Sonet",
];

const PMD_TYPES100: [&str; 4] = [
    "Low Power",
    "Thin Wire",
    "Shielded Twisted Pair",
    "Unshielded Twisted Pair",
];

/// How the station attaches to the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StationType {
    /// Single attachment station
    Sas,
    /// Dual attachment concentrator
    Dac,
    /// Single attachment concentrator
    Sac,
    /// Null attachment concentrator
    Nac,
    /// Dual attachment station
    Das,
    /// Unrecognized value
    Unknown(u32),
}

impl StationType {
    /// Decode from the raw response value
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => StationType::Sas,
            1 => StationType::Dac,
            2 => StationType::Sac,
            3 => StationType::Nac,
            4 => StationType::Das,
            other => StationType::Unknown(other),
        }
    }

    /// Short name
    pub const fn name(self) -> &'static str {
        match self {
            StationType::Sas => "SAS",
            StationType::Dac => "DAC",
            StationType::Sac => "SAC",
            StationType::Nac => "NAC",
            StationType::Das => "DAS",
            StationType::Unknown(_) => "Unknown",
        }
    }
}

impl core::fmt::Display for StationType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Station characteristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StationChars {
    /// Attachment type
    pub station_type: StationType,
    /// Raw SMT version id
    pub smt_version_id: u32,
    /// Module revision bytes
    pub module_rev: [u8; 4],
    /// Raw PHY types of ports A and B
    pub phy_types: [u32; 2],
    /// Raw PMD types of ports A and B
    pub pmd_types: [u32; 2],
}

impl StationChars {
    /// Decode a Status-Chars-Get response buffer
    pub(crate) fn from_response(buf: &[VolatileCell<u32>]) -> Self {
        let word = |index: usize| buf.get(index).map_or(0, |cell| cell.get_le());
        Self {
            station_type: StationType::from_raw(word(STATION_TYPE_WORD)),
            smt_version_id: word(SMT_VERSION_WORD),
            module_rev: word(MODULE_REV_WORD).to_le_bytes(),
            phy_types: [word(PHY_TYPE_WORD), word(PHY_TYPE_WORD + 1)],
            pmd_types: [word(PMD_TYPE_WORD), word(PMD_TYPE_WORD + 1)],
        }
    }

    /// SMT version name, if known
    pub fn smt_version(&self) -> Option<&'static str> {
        SMT_VERSIONS.get(self.smt_version_id as usize).copied()
    }

    /// Whether both ports are in use
    pub fn is_dual_attach(&self) -> bool {
        self.station_type == StationType::Das
    }

    /// PHY type letter of port `port` (0 = A, 1 = B)
    pub fn phy_type(&self, port: usize) -> Option<char> {
        let raw = *self.phy_types.get(port)?;
        PHY_TYPES.get(raw as usize).copied()
    }

    /// PMD type name of port `port` (0 = A, 1 = B)
    ///
    /// Values below 100 are ANSI fiber types, 100 and up copper types.
    pub fn pmd_type(&self, port: usize) -> Option<&'static str> {
        let raw = *self.pmd_types.get(port)? as usize;
        let table: &[&'static str] = match raw / 100 {
            0 => &PMD_TYPES0,
            1 => &PMD_TYPES100,
            _ => return None,
        };
        table.get(raw % 100).copied()
    }

    /// Hardware revision character
    pub fn hardware_rev(&self) -> char {
        char::from(self.module_rev[0])
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;

    fn response(words: &[(usize, u32)]) -> Vec<VolatileCell<u32>> {
        let buf: Vec<VolatileCell<u32>> = (0..128).map(|_| VolatileCell::new(0)).collect();
        for &(index, value) in words {
            buf[index].set_le(value);
        }
        buf
    }

    #[test]
    fn decodes_dual_attach_station() {
        let buf = response(&[
            (STATION_TYPE_WORD, 4),
            (SMT_VERSION_WORD, 2),
            (MODULE_REV_WORD, u32::from_le_bytes(*b"F1.0")),
            (PHY_TYPE_WORD, 0),
            (PHY_TYPE_WORD + 1, 1),
            (PMD_TYPE_WORD, 0),
            (PMD_TYPE_WORD + 1, 103),
        ]);
        let chars = StationChars::from_response(&buf);

        assert_eq!(chars.station_type, StationType::Das);
        assert!(chars.is_dual_attach());
        assert_eq!(chars.smt_version(), Some("V7.2"));
        assert_eq!(chars.hardware_rev(), 'F');
        assert_eq!(chars.phy_type(0), Some('A'));
        assert_eq!(chars.phy_type(1), Some('B'));
        assert_eq!(chars.pmd_type(0), Some("ANSI Multi-Mode"));
        assert_eq!(chars.pmd_type(1), Some("Unshielded Twisted Pair"));
    }

    #[test]
    fn out_of_range_values_have_no_name() {
        let buf = response(&[
            (STATION_TYPE_WORD, 9),
            (SMT_VERSION_WORD, 7),
            (PHY_TYPE_WORD, 6),
            (PMD_TYPE_WORD, 250),
        ]);
        let chars = StationChars::from_response(&buf);

        assert_eq!(chars.station_type, StationType::Unknown(9));
        assert_eq!(chars.smt_version(), None);
        assert_eq!(chars.phy_type(0), None);
        assert_eq!(chars.pmd_type(0), None);
        assert_eq!(chars.phy_type(2), None);
    }
}
