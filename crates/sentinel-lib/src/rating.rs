//! Digital carbon rating
//!
//! Maps a transfer weight to the Sustainable Web Design rating scale
//! (<https://sustainablewebdesign.org/digital-carbon-ratings/>). All rating
//! thresholds live here so the registry and any UI layer share one partition.

use crate::error::{Result, SentinelError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Upper bounds (exclusive, in KB) for each grade better than F
pub const THRESHOLDS_KB: [(Rating, f64); 6] = [
    (Rating::APlus, 272.51),
    (Rating::A, 531.15),
    (Rating::B, 975.85),
    (Rating::C, 1410.39),
    (Rating::D, 1875.01),
    (Rating::E, 2419.56),
];

/// Upper bound of grade E in KB; everything at or above is F
pub const WORST_THRESHOLD_KB: f64 = 2419.56;

/// Carbon rating grade, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    APlus,
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Rating {
    /// All grades from best to worst
    pub const ALL: [Rating; 7] = [
        Rating::APlus,
        Rating::A,
        Rating::B,
        Rating::C,
        Rating::D,
        Rating::E,
        Rating::F,
    ];

    /// Display label, e.g. "A+"
    pub fn label(self) -> &'static str {
        match self {
            Rating::APlus => "A+",
            Rating::A => "A",
            Rating::B => "B",
            Rating::C => "C",
            Rating::D => "D",
            Rating::E => "E",
            Rating::F => "F",
        }
    }

    /// Display color for the grade
    pub fn color(self) -> &'static str {
        match self {
            Rating::APlus => "#00a245",
            Rating::A => "#5cb82e",
            Rating::B => "#a3c51c",
            Rating::C => "#f2c500",
            Rating::D => "#f59a00",
            Rating::E => "#ec5a14",
            Rating::F => "#e01c1c",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Rating {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        Rating::ALL
            .into_iter()
            .find(|rating| rating.label() == s.trim())
            .ok_or_else(|| SentinelError::InvalidRating(s.to_string()))
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// Rate a transfer weight in bytes
pub fn rating_for(bytes: u64) -> Rating {
    let kb = bytes as f64 / 1024.0;
    THRESHOLDS_KB
        .iter()
        .find(|(_, limit)| kb < *limit)
        .map(|(rating, _)| *rating)
        .unwrap_or(Rating::F)
}

/// Look up the color for a textual grade
pub fn color_for(label: &str) -> Result<&'static str> {
    label.parse::<Rating>().map(Rating::color)
}
