/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 *
 * Licensed under the Apache License, Version 2.0 (the "License").
 * You may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use regex::Regex;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

/* =================================================
struct / enum / const
================================================= */

/// A DynamoDB number kept in its lossless wire form: a decimal string.
///
/// DynamoDB transmits every number as a string (the `N` attribute type) and
/// accepts up to 38 digits of precision, which exceeds what `f64` can carry.
/// `DynamoNumber` stores the validated string as-is and only converts to a
/// native float on explicit request, so values survive read-modify-write
/// cycles byte for byte.
///
/// Equality and hashing are by decimal string, the same rule DynamoDB
/// applies to `NS` set membership. `"10"` and `"10.0"` are distinct members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DynamoNumber(String);

#[derive(Debug, PartialEq)]
pub struct ParseNumberError {
    input: String,
}

impl ParseNumberError {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.to_owned(),
        }
    }
}

impl Display for ParseNumberError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid DynamoDB number: '{}'", self.input)
    }
}

impl std::error::Error for ParseNumberError {}

/// Accepts an optional sign, an integer part, an optional fraction, and an
/// optional exponent. Leading "." or trailing "." forms ("[-].5", "5.") are
/// rejected to keep the stored representation canonical for set membership.
fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?([eE][+-]?\d+)?$").unwrap())
}

/* =================================================
impl
================================================= */

impl DynamoNumber {
    /// Validates and wraps a decimal string.
    pub fn new(input: impl Into<String>) -> Result<Self, ParseNumberError> {
        let input = input.into();
        if number_pattern().is_match(&input) {
            Ok(Self(input))
        } else {
            Err(ParseNumberError::new(&input))
        }
    }

    /// The exact decimal string sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Lossy coercion to a native float. Integers beyond 2^53 and decimals
    /// with more than ~15 significant digits lose precision here.
    pub fn to_f64(&self) -> f64 {
        // the validated grammar is a strict subset of what f64::from_str accepts
        self.0.parse::<f64>().unwrap_or(f64::NAN)
    }

    /// Lossless coercion to i64 when the value is a plain integer in range.
    pub fn to_i64(&self) -> Option<i64> {
        self.0.parse::<i64>().ok()
    }

    pub fn is_negative(&self) -> bool {
        self.0.starts_with('-')
    }
}

impl Display for DynamoNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DynamoNumber {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, ParseNumberError> {
        Self::new(s)
    }
}

macro_rules! impl_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for DynamoNumber {
                fn from(v: $t) -> Self {
                    Self(v.to_string())
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for DynamoNumber {
    /// Non-finite floats have no wire representation and become "0".
    fn from(v: f64) -> Self {
        if v.is_finite() {
            Self(format!("{}", v))
        } else {
            Self(String::from("0"))
        }
    }
}

impl From<f32> for DynamoNumber {
    fn from(v: f32) -> Self {
        Self::from(v as f64)
    }
}

/* =================================================
Unit tests
================================================= */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_wire_grammar() {
        for ok in [
            "0",
            "1",
            "-1",
            "123456789012345678901234567890123456789", // beyond f64 precision
            "3.14159",
            "-0.5",
            "1e10",
            "1E-130",
            "9.9E+125",
            "-2.5e3",
        ] {
            assert_eq!(DynamoNumber::new(ok).unwrap().as_str(), ok);
        }
    }

    #[test]
    fn test_rejects_non_numbers() {
        for bad in ["", "abc", "1.2.3", ".5", "5.", "--3", "1e", "0x10", "NaN", "1 "] {
            assert_eq!(DynamoNumber::new(bad), Err(ParseNumberError::new(bad)));
        }
    }

    #[test]
    fn test_lossless_round_trip() {
        let big = "340282366920938463463374607431768211456"; // 2^128
        let n = DynamoNumber::new(big).unwrap();
        assert_eq!(n.to_string(), big);
        // the float path loses precision, the string path does not
        assert_ne!(format!("{}", n.to_f64()), big);
    }

    #[test]
    fn test_numeric_coercions() {
        assert_eq!(DynamoNumber::from(42_i64).as_str(), "42");
        assert_eq!(DynamoNumber::from(-7_i32).as_str(), "-7");
        assert_eq!(DynamoNumber::from(2.5_f64).as_str(), "2.5");
        assert_eq!(DynamoNumber::new("42").unwrap().to_i64(), Some(42));
        assert_eq!(DynamoNumber::new("2.5").unwrap().to_i64(), None);
        assert_eq!(DynamoNumber::new("2.5").unwrap().to_f64(), 2.5);
    }

    #[test]
    fn test_string_equality_semantics() {
        // distinct strings are distinct set members even when numerically equal
        assert_ne!(
            DynamoNumber::new("10").unwrap(),
            DynamoNumber::new("10.0").unwrap()
        );
        assert_eq!(
            DynamoNumber::new("10").unwrap(),
            DynamoNumber::new("10").unwrap()
        );
    }
}
