//! Shadow filtering algorithm selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Shadow algorithm evaluated per fragment.
///
/// The discriminants match the `mode` field of the shadow uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    /// Single-texel depth comparison (hard shadows)
    #[default]
    Basic = 0,
    /// Fixed-radius percentage-closer filtering
    Pcf = 1,
    /// Percentage-closer soft shadows (blocker search + variable PCF)
    Pcss = 2,
    /// Variance soft shadows from the summed-area table
    Vssm = 3,
}

impl ShadowMode {
    pub const ALL: [ShadowMode; 4] = [Self::Basic, Self::Pcf, Self::Pcss, Self::Vssm];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Result<Self> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::InvalidShadowMode(index.to_string()))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pcf => "pcf",
            Self::Pcss => "pcss",
            Self::Vssm => "vssm",
        }
    }
}

impl fmt::Display for ShadowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShadowMode {
    type Err = Error;

    /// Accepts an index (`0`-`3`) or a case-insensitive name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(index) = s.parse::<u32>() {
            return Self::from_index(index);
        }
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidShadowMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        for mode in ShadowMode::ALL {
            assert_eq!(ShadowMode::from_index(mode.index()).unwrap(), mode);
        }
        assert!(ShadowMode::from_index(4).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("2".parse::<ShadowMode>().unwrap(), ShadowMode::Pcss);
        assert_eq!("VSSM".parse::<ShadowMode>().unwrap(), ShadowMode::Vssm);
        assert_eq!(" pcf ".parse::<ShadowMode>().unwrap(), ShadowMode::Pcf);
        assert!(matches!(
            "soft".parse::<ShadowMode>(),
            Err(Error::InvalidShadowMode(_))
        ));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ShadowMode::Pcss).unwrap();
        assert_eq!(json, "\"pcss\"");
        let mode: ShadowMode = serde_json::from_str("\"basic\"").unwrap();
        assert_eq!(mode, ShadowMode::Basic);
    }
}
