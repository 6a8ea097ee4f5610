//! Signal strength scale and fixed quality bands.
//!
//! All signal readings are held in dBm. The local store persists a 0-100
//! percentage of the valid range and converts through
//! [`SignalStrength::from_percent`] and [`SignalStrength::percent`] at its
//! boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MIN_DBM: f64 = -100.0;
pub const MAX_DBM: f64 = -30.0;
const SPAN_DB: f64 = MAX_DBM - MIN_DBM;

/// A received signal strength in dBm.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalStrength(f64);

impl SignalStrength {
    pub fn from_dbm(dbm: f64) -> Self {
        SignalStrength(dbm)
    }

    /// Maps a 0-100 quality percentage linearly onto [`MIN_DBM`]..=[`MAX_DBM`].
    /// Out of range input is clamped first. The result is kept to a
    /// thousandth of a dB so stored readings come back as they were written.
    pub fn from_percent(percent: f64) -> Self {
        let dbm = MIN_DBM + percent.clamp(0.0, 100.0) * SPAN_DB / 100.0;
        SignalStrength((dbm * 1000.0).round() / 1000.0)
    }

    pub fn dbm(self) -> f64 {
        self.0
    }

    /// Quality percentage, 0 at [`MIN_DBM`] and 100 at [`MAX_DBM`].
    pub fn percent(self) -> f64 {
        ((self.0 - MIN_DBM) * 100.0 / SPAN_DB).clamp(0.0, 100.0)
    }

    pub fn quality(self) -> SignalQuality {
        SignalQuality::of(self)
    }

    pub fn is_within_range(self) -> bool {
        (MIN_DBM..=MAX_DBM).contains(&self.0)
    }
}

impl fmt::Display for SignalStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} dBm", self.0)
    }
}

/// The four ordered signal bands used by the charts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SignalQuality {
    Excellent,
    Good,
    Fair,
    Weak,
}

impl SignalQuality {
    /// Bands in display order, strongest first.
    pub const ALL: [SignalQuality; 4] = [
        SignalQuality::Excellent,
        SignalQuality::Good,
        SignalQuality::Fair,
        SignalQuality::Weak,
    ];

    const EXCELLENT_DBM: f64 = -50.0;
    const GOOD_DBM: f64 = -60.0;
    const FAIR_DBM: f64 = -80.0;

    pub fn of(signal: SignalStrength) -> Self {
        let dbm = signal.dbm();
        if dbm >= Self::EXCELLENT_DBM {
            SignalQuality::Excellent
        } else if dbm >= Self::GOOD_DBM {
            SignalQuality::Good
        } else if dbm >= Self::FAIR_DBM {
            SignalQuality::Fair
        } else {
            SignalQuality::Weak
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SignalQuality::Excellent => "Excellent",
            SignalQuality::Good => "Good",
            SignalQuality::Fair => "Fair",
            SignalQuality::Weak => "Weak",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_conversion_is_symmetric() {
        for percent in [0.0, 25.0, 50.0, 75.0, 100.0] {
            let signal = SignalStrength::from_percent(percent);
            assert_eq!(signal.percent(), percent);
        }
        assert_eq!(SignalStrength::from_percent(100.0).dbm(), -30.0);
        assert_eq!(SignalStrength::from_percent(50.0).dbm(), -65.0);
        assert_eq!(SignalStrength::from_percent(0.0).dbm(), -100.0);
    }

    #[test]
    fn test_percent_saturates() {
        assert_eq!(SignalStrength::from_dbm(-30.0).percent(), 100.0);
        assert_eq!(SignalStrength::from_dbm(-20.0).percent(), 100.0);
        assert_eq!(SignalStrength::from_dbm(-110.0).percent(), 0.0);
        assert_eq!(SignalStrength::from_percent(140.0).dbm(), -30.0);
    }

    #[test]
    fn test_whole_range_survives_percent_round_trip() {
        let readings = (-100..=-30)
            .map(f64::from)
            .chain([-35.7, -62.4, -30.5, -99.999]);
        for dbm in readings {
            let signal = SignalStrength::from_dbm(dbm);
            assert_eq!(SignalStrength::from_percent(signal.percent()), signal);
        }
    }

    #[test]
    fn test_quality_bands() {
        let bands: Vec<SignalQuality> = [-40.0, -50.0, -60.0, -75.0, -80.0, -90.0]
            .iter()
            .map(|dbm| SignalStrength::from_dbm(*dbm).quality())
            .collect();
        assert_eq!(
            bands,
            vec![
                SignalQuality::Excellent,
                SignalQuality::Excellent,
                SignalQuality::Good,
                SignalQuality::Fair,
                SignalQuality::Fair,
                SignalQuality::Weak,
            ]
        );
    }

    #[test]
    fn test_range_check() {
        assert!(SignalStrength::from_dbm(-30.0).is_within_range());
        assert!(SignalStrength::from_dbm(-100.0).is_within_range());
        assert!(!SignalStrength::from_dbm(-20.0).is_within_range());
    }
}
