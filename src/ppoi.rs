//! Primary Point of Interest.
//!
//! A PPOI is a normalized `(x, y)` focal point, both components in `[0, 1]`,
//! that biases where crops are framed. `(0.5, 0.5)` (the default) keeps the
//! center, `(0, 0)` keeps the top-left edge and `(1, 1)` the bottom-right.
//!
//! ## Serialized form
//!
//! PPOIs persist as `"{x}x{y}"`, e.g. `"0.25x0.25"`. Components are written
//! with a trailing `.0` for whole numbers (`"0.0x1.0"`) so the textual form is
//! stable no matter how the value was produced.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PpoiError {
    #[error(
        "{value} is an invalid primary point of interest: provide two coordinates \
         between 0 and 1, as a pair like (0.5, 0.5) or a string like '0.5x0.5'"
    )]
    Invalid { value: String },
}

/// Normalized focal point used to bias crop framing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ppoi {
    x: f64,
    y: f64,
}

impl Ppoi {
    pub const CENTER: Ppoi = Ppoi { x: 0.5, y: 0.5 };

    /// Build a PPOI, rejecting components outside `[0, 1]` (and NaN).
    pub fn new(x: f64, y: f64) -> Result<Self, PpoiError> {
        if in_unit_range(x) && in_unit_range(y) {
            Ok(Self { x, y })
        } else {
            Err(PpoiError::Invalid {
                value: format!("({x}, {y})"),
            })
        }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    /// Filename-safe discriminator: `c{x}__{y}` with `.` replaced by `-`.
    ///
    /// `Ppoi::new(0.25, 0.25)` → `c0-25__0-25`.
    pub fn discriminator(self) -> String {
        format!(
            "c{}__{}",
            decimal_repr(self.x).replace('.', "-"),
            decimal_repr(self.y).replace('.', "-")
        )
    }
}

impl Default for Ppoi {
    fn default() -> Self {
        Self::CENTER
    }
}

impl TryFrom<(f64, f64)> for Ppoi {
    type Error = PpoiError;

    fn try_from((x, y): (f64, f64)) -> Result<Self, Self::Error> {
        Ppoi::new(x, y)
    }
}

impl FromStr for Ppoi {
    type Err = PpoiError;

    /// Parse the `"{x}x{y}"` form. Exactly two numeric segments are required.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || PpoiError::Invalid {
            value: value.to_string(),
        };
        let segments: Vec<&str> = value.split('x').collect();
        let [x, y] = segments.as_slice() else {
            return Err(invalid());
        };
        let x: f64 = x.trim().parse().map_err(|_| invalid())?;
        let y: f64 = y.trim().parse().map_err(|_| invalid())?;
        Ppoi::new(x, y).map_err(|_| invalid())
    }
}

impl fmt::Display for Ppoi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", decimal_repr(self.x), decimal_repr(self.y))
    }
}

impl Serialize for Ppoi {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ppoi {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Pair(f64, f64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Raw::Pair(x, y) => Ppoi::new(x, y).map_err(serde::de::Error::custom),
        }
    }
}

fn in_unit_range(v: f64) -> bool {
    (0.0..=1.0).contains(&v)
}

/// Shortest round-trip decimal form without an exponent, always carrying a
/// fractional part (`0.5`, `0.25`, `1.0`, `0.00001`).
fn decimal_repr(v: f64) -> String {
    let repr = v.to_string();
    if repr.contains('.') {
        repr
    } else {
        format!("{repr}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_center() {
        assert_eq!(Ppoi::default(), Ppoi::CENTER);
        assert_eq!(Ppoi::default().to_string(), "0.5x0.5");
    }

    #[test]
    fn parses_string_form() {
        let p: Ppoi = "0.25x0.75".parse().unwrap();
        assert_eq!((p.x(), p.y()), (0.25, 0.75));
    }

    #[test]
    fn parses_whole_numbers() {
        let p: Ppoi = "0x1".parse().unwrap();
        assert_eq!((p.x(), p.y()), (0.0, 1.0));
        assert_eq!(p.to_string(), "0.0x1.0");
    }

    #[test]
    fn accepts_tuple() {
        let p = Ppoi::try_from((1.0, 0.0)).unwrap();
        assert_eq!((p.x(), p.y()), (1.0, 0.0));
    }

    #[test]
    fn rejects_out_of_range_components() {
        assert!(Ppoi::new(1.5, 0.5).is_err());
        assert!(Ppoi::new(0.5, -0.1).is_err());
        assert!(Ppoi::new(f64::NAN, 0.5).is_err());
        assert!("1.1x0.5".parse::<Ppoi>().is_err());
    }

    #[test]
    fn rejects_malformed_strings() {
        for raw in ["", "0.5", "0.5x0.5x0.5", "ax0.5", "0.5,0.5"] {
            assert!(raw.parse::<Ppoi>().is_err(), "{raw:?} should not parse");
        }
    }

    #[test]
    fn error_carries_offending_value() {
        let err = "2x3".parse::<Ppoi>().unwrap_err();
        assert_eq!(
            err,
            PpoiError::Invalid {
                value: "2x3".to_string()
            }
        );
        assert!(err.to_string().starts_with("2x3 is an invalid"));
    }

    #[test]
    fn discriminator_is_filename_safe() {
        assert_eq!(Ppoi::new(0.25, 0.25).unwrap().discriminator(), "c0-25__0-25");
        assert_eq!(Ppoi::CENTER.discriminator(), "c0-5__0-5");
        assert_eq!(Ppoi::new(0.0, 1.0).unwrap().discriminator(), "c0-0__1-0");
    }

    #[test]
    fn tiny_components_are_written_without_exponent() {
        let p = Ppoi::new(0.00001, 0.5).unwrap();
        assert_eq!(p.discriminator(), "c0-00001__0-5");
        assert_eq!(p.to_string(), "0.00001x0.5");
        assert_eq!(p.to_string().parse::<Ppoi>().unwrap(), p);
    }

    #[test]
    fn serde_accepts_string_and_pair() {
        let from_str: Ppoi = serde_json::from_str(r#""0.3x0.4""#).unwrap();
        let from_pair: Ppoi = serde_json::from_str("[0.3, 0.4]").unwrap();
        assert_eq!(from_str, from_pair);
        assert_eq!(serde_json::to_string(&from_str).unwrap(), r#""0.3x0.4""#);
        assert!(serde_json::from_str::<Ppoi>("[2.0, 0.4]").is_err());
    }
}
