//! Camelot wheel key notation
//!
//! Maps musical keys to wheel positions 1-12 with an A (minor) or B (major)
//! suffix so that harmonically compatible keys sit next to each other.

use crate::track::KeyScale;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wheel hemisphere: A = minor keys, B = major keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    A,
    B,
}

/// A position on the Camelot wheel, e.g. `8A` (A minor) or `8B` (C major)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CamelotKey {
    pub number: u8,
    pub wheel: Wheel,
}

/// Standard key -> wheel mapping.
///
/// Enharmonic spellings (C#/Db etc.) map to the same position.
const CAMELOT_WHEEL: &[(&str, KeyScale, u8, Wheel)] = &[
    ("C", KeyScale::Major, 8, Wheel::B),
    ("C", KeyScale::Minor, 5, Wheel::A),
    ("C#", KeyScale::Major, 3, Wheel::B),
    ("Db", KeyScale::Major, 3, Wheel::B),
    ("C#", KeyScale::Minor, 12, Wheel::A),
    ("Db", KeyScale::Minor, 12, Wheel::A),
    ("D", KeyScale::Major, 10, Wheel::B),
    ("D", KeyScale::Minor, 7, Wheel::A),
    ("D#", KeyScale::Major, 5, Wheel::B),
    ("Eb", KeyScale::Major, 5, Wheel::B),
    ("D#", KeyScale::Minor, 2, Wheel::A),
    ("Eb", KeyScale::Minor, 2, Wheel::A),
    ("E", KeyScale::Major, 12, Wheel::B),
    ("E", KeyScale::Minor, 9, Wheel::A),
    ("F", KeyScale::Major, 7, Wheel::B),
    ("F", KeyScale::Minor, 4, Wheel::A),
    ("F#", KeyScale::Major, 2, Wheel::B),
    ("Gb", KeyScale::Major, 2, Wheel::B),
    ("F#", KeyScale::Minor, 11, Wheel::A),
    ("Gb", KeyScale::Minor, 11, Wheel::A),
    ("G", KeyScale::Major, 9, Wheel::B),
    ("G", KeyScale::Minor, 6, Wheel::A),
    ("G#", KeyScale::Major, 4, Wheel::B),
    ("Ab", KeyScale::Major, 4, Wheel::B),
    ("G#", KeyScale::Minor, 1, Wheel::A),
    ("Ab", KeyScale::Minor, 1, Wheel::A),
    ("A", KeyScale::Major, 11, Wheel::B),
    ("A", KeyScale::Minor, 8, Wheel::A),
    ("A#", KeyScale::Major, 6, Wheel::B),
    ("Bb", KeyScale::Major, 6, Wheel::B),
    ("A#", KeyScale::Minor, 3, Wheel::A),
    ("Bb", KeyScale::Minor, 3, Wheel::A),
    ("B", KeyScale::Major, 1, Wheel::B),
    ("B", KeyScale::Minor, 10, Wheel::A),
];

impl CamelotKey {
    /// Look up the wheel position for a pitch class and scale.
    ///
    /// Returns `None` for unknown pitch-class spellings or `KeyScale::Unknown`.
    pub fn from_key(pitch_class: &str, scale: KeyScale) -> Option<Self> {
        CAMELOT_WHEEL
            .iter()
            .find(|(pc, s, _, _)| *pc == pitch_class && *s == scale)
            .map(|&(_, _, number, wheel)| CamelotKey { number, wheel })
    }
}

impl fmt::Display for CamelotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wheel = match self.wheel {
            Wheel::A => 'A',
            Wheel::B => 'B',
        };
        write!(f, "{}{}", self.number, wheel)
    }
}

impl FromStr for CamelotKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 2 {
            return Err(format!("Invalid camelot key: {s}"));
        }
        let (num, wheel) = s.split_at(s.len() - 1);
        let number: u8 = num
            .parse()
            .map_err(|_| format!("Invalid camelot number: {num}"))?;
        if !(1..=12).contains(&number) {
            return Err(format!("Camelot number out of range: {number}"));
        }
        let wheel = match wheel {
            "A" | "a" => Wheel::A,
            "B" | "b" => Wheel::B,
            other => return Err(format!("Invalid camelot wheel: {other}")),
        };
        Ok(CamelotKey { number, wheel })
    }
}

// Serialized as the conventional string form ("8A") so stored records and
// oracle payloads read naturally.
impl Serialize for CamelotKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CamelotKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
