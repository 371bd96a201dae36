use std::{fmt::Display, str::FromStr};

use super::{to_twos_comp, twos_comp, ParseError};

/// Measuring system of a HID unit, stored in the lowest nibble of the unit value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSystem {
    None,
    SILinear,
    SIRotation,
    EnglishLinear,
    EnglishRotation,
}

impl UnitSystem {
    fn from_nibble(nibble: u32) -> Option<Self> {
        match nibble {
            0 => Some(Self::None),
            1 => Some(Self::SILinear),
            2 => Some(Self::SIRotation),
            3 => Some(Self::EnglishLinear),
            4 => Some(Self::EnglishRotation),
            _ => None,
        }
    }

    fn nibble(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::SILinear => 1,
            Self::SIRotation => 2,
            Self::EnglishLinear => 3,
            Self::EnglishRotation => 4,
        }
    }

    /// Symbols for length, mass, time, temperature, current and luminous
    /// intensity in this system.
    fn symbols(&self) -> [&'static str; 6] {
        match self {
            Self::None => ["", "", "", "", "", ""],
            Self::SILinear => ["cm", "g", "s", "K", "A", "cd"],
            Self::SIRotation => ["rad", "g", "s", "K", "A", "cd"],
            Self::EnglishLinear => ["in", "slug", "s", "F", "A", "cd"],
            Self::EnglishRotation => ["deg", "slug", "s", "F", "A", "cd"],
        }
    }
}

impl Display for UnitSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::SILinear => "SILinear",
            Self::SIRotation => "SIRotation",
            Self::EnglishLinear => "EnglishLinear",
            Self::EnglishRotation => "EnglishRotation",
        };
        write!(f, "{name}")
    }
}

impl FromStr for UnitSystem {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "None" => Ok(Self::None),
            "SILinear" => Ok(Self::SILinear),
            "SIRotation" => Ok(Self::SIRotation),
            "EnglishLinear" => Ok(Self::EnglishLinear),
            "EnglishRotation" => Ok(Self::EnglishRotation),
            other => Err(ParseError::Syntax {
                line: other.to_string(),
                reason: "unknown unit system".into(),
            }),
        }
    }
}

/// A HID unit: a measuring system plus signed 4 bit exponents for length,
/// mass, time, temperature, current and luminous intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HidUnit {
    pub system: UnitSystem,
    pub exponents: [i8; 6],
}

impl HidUnit {
    /// The canonical unit-less value
    pub const NONE: HidUnit = HidUnit {
        system: UnitSystem::None,
        exponents: [0; 6],
    };

    pub fn new(system: UnitSystem, exponents: [i8; 6]) -> Self {
        if system == UnitSystem::None || exponents.iter().all(|e| *e == 0) {
            return Self::NONE;
        }
        Self { system, exponents }
    }

    /// Decode the 32 bit unit value of a Unit item. Unknown systems and
    /// systems without any exponent collapse to [HidUnit::NONE].
    pub fn from_value(value: u32) -> Self {
        let Some(system) = UnitSystem::from_nibble(value & 0xF) else {
            return Self::NONE;
        };
        let mut exponents = [0i8; 6];
        for (i, exponent) in exponents.iter_mut().enumerate() {
            let nibble = (value >> (4 * (i + 1))) & 0xF;
            *exponent = twos_comp(nibble, 4) as i8;
        }
        Self::new(system, exponents)
    }

    pub fn value(&self) -> u32 {
        if self.is_none() {
            return 0;
        }
        let mut value = self.system.nibble();
        for (i, exponent) in self.exponents.iter().enumerate() {
            value |= to_twos_comp(*exponent as i64, 4) << (4 * (i + 1));
        }
        value
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    /// True if `value` decodes to a unit that encodes back to the same value
    pub fn is_canonical(value: u32) -> bool {
        Self::from_value(value).value() == value
    }
}

impl Default for HidUnit {
    fn default() -> Self {
        Self::NONE
    }
}

impl Display for HidUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            return write!(f, "None");
        }
        let symbols = self.system.symbols();
        let parts: Vec<String> = self
            .exponents
            .iter()
            .zip(symbols)
            .filter(|(exponent, _)| **exponent != 0)
            .map(|(exponent, symbol)| match exponent {
                1 => symbol.to_string(),
                e => format!("{symbol}^{e}"),
            })
            .collect();
        write!(f, "{}: {}", self.system, parts.join(" "))
    }
}

impl FromStr for HidUnit {
    type Err = ParseError;

    /// Parse strings like `SILinear: cm s^-2` or `None`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let syntax = |reason: &str| ParseError::Syntax {
            line: s.to_string(),
            reason: reason.to_string(),
        };
        let s = s.trim();
        if s == "None" {
            return Ok(Self::NONE);
        }
        let Some((system, rest)) = s.split_once(':') else {
            return Err(syntax("missing unit system"));
        };
        let system: UnitSystem = system.parse()?;
        let symbols = system.symbols();
        let mut exponents = [0i8; 6];
        for part in rest.split_whitespace() {
            let (symbol, exponent) = match part.split_once('^') {
                Some((symbol, exponent)) => {
                    let exponent: i8 = exponent
                        .parse()
                        .map_err(|_| syntax("invalid unit exponent"))?;
                    (symbol, exponent)
                }
                None => (part, 1),
            };
            if !(-8..=7).contains(&exponent) {
                return Err(syntax("unit exponent out of range"));
            }
            let Some(idx) = symbols.iter().position(|s| *s == symbol) else {
                return Err(syntax("unknown unit symbol"));
            };
            exponents[idx] = exponent;
        }
        Ok(Self::new(system, exponents))
    }
}
