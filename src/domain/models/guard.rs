//! Safety guard model.
//!
//! Guards arrive on task nodes as free-form strings. They are parsed into a
//! closed set of variants; anything else is kept as `Unrecognized`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::task_spec::TimeWindow;

/// Operating shift a time-window guard refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Configured night-operations window, 21:00-07:00 unless overridden.
    NightOps,
    /// Window given inline, e.g. `shift=22:00-06:00`.
    Explicit(TimeWindow),
}

/// Base units that SI prefixes may be applied to.
const BASE_UNITS: [&str; 8] = ["V", "A", "W", "K", "T", "Hz", "s", "Ω"];

/// Physical quantity such as `50 mV` or `20 mK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Parse `<number><unit>` with optional whitespace, e.g. `-0.5 V`, `50mV`.
    /// A leading `±` or `+/-` is read as a symmetric range and yields the
    /// magnitude.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('±').or_else(|| text.strip_prefix("+/-")) {
            let inner = Self::parse(rest)?;
            return Some(Self::new(inner.value.abs(), inner.unit));
        }
        let split = text
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
            .map_or(text.len(), |(i, _)| i);
        let (number, unit) = text.split_at(split);
        let value = number.parse::<f64>().ok()?;
        let unit = unit.trim();
        if unit.is_empty() || !unit.chars().all(|c| c.is_alphabetic() || c == '/' || c == 'µ') {
            return None;
        }
        Some(Self::new(value, unit))
    }

    /// Split the unit into an SI prefix multiplier and a base unit.
    fn base_unit(&self) -> Option<(f64, &str)> {
        let unit = self.unit.as_str();
        if BASE_UNITS.contains(&unit) {
            return Some((1.0, unit));
        }
        let mut chars = unit.chars();
        let factor = match chars.next()? {
            'p' => 1e-12,
            'n' => 1e-9,
            'µ' | 'μ' | 'u' => 1e-6,
            'm' => 1e-3,
            'k' => 1e3,
            'M' => 1e6,
            'G' => 1e9,
            _ => return None,
        };
        let base = chars.as_str();
        BASE_UNITS.contains(&base).then_some((factor, base))
    }

    /// Value expressed in `other`'s unit, when both share a base unit.
    pub fn value_in(&self, other: &Self) -> Option<f64> {
        if self.unit == other.unit {
            return Some(self.value);
        }
        let (from, base) = self.base_unit()?;
        let (to, other_base) = other.base_unit()?;
        (base == other_base).then(|| self.value * from / to)
    }

    /// Quantities mentioned in a parameter value: a single quantity or a
    /// range written as `a..b`, `a to b` or `a, b`.
    pub fn scan(text: &str) -> Vec<Self> {
        if let Some(q) = Self::parse(text) {
            return vec![q];
        }
        text.split("..")
            .flat_map(|part| part.split(" to "))
            .flat_map(|part| part.split(','))
            .filter_map(Self::parse)
            .collect()
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Parsed safety guard.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// `shift=night_ops`
    TimeWindow(Shift),
    /// `interlock.<name>`
    Interlock(String),
    /// `capability: <name> ≤ <limit>`
    Capability { name: String, limit: Quantity },
    Unrecognized(String),
}

impl Guard {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();

        if let Some(shift) = text.strip_prefix("shift=") {
            let shift = shift.trim();
            if shift.eq_ignore_ascii_case("night_ops") {
                return Self::TimeWindow(Shift::NightOps);
            }
            if let Ok(window) = TimeWindow::parse(shift) {
                return Self::TimeWindow(Shift::Explicit(window));
            }
            return Self::Unrecognized(raw.to_string());
        }

        if let Some(name) = text.strip_prefix("interlock.") {
            let name = name.trim();
            if !name.is_empty() {
                return Self::Interlock(name.to_string());
            }
            return Self::Unrecognized(raw.to_string());
        }

        if let Some(body) = text.strip_prefix("capability:") {
            let parsed = ["≤", "<="].iter().find_map(|op| {
                let (name, limit) = body.split_once(*op)?;
                let name = name.trim();
                let limit = Quantity::parse(limit)?;
                (!name.is_empty()).then(|| (name.to_string(), limit))
            });
            if let Some((name, limit)) = parsed {
                return Self::Capability { name, limit };
            }
        }

        Self::Unrecognized(raw.to_string())
    }
}

impl fmt::Display for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeWindow(Shift::NightOps) => f.write_str("shift=night_ops"),
            Self::TimeWindow(Shift::Explicit(window)) => write!(f, "shift={window}"),
            Self::Interlock(name) => write!(f, "interlock.{name}"),
            Self::Capability { name, limit } => write!(f, "capability: {name} ≤ {limit}"),
            Self::Unrecognized(text) => f.write_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_guards() {
        assert_eq!(Guard::parse("shift=night_ops"), Guard::TimeWindow(Shift::NightOps));
        assert_eq!(
            Guard::parse("shift=22:00-06:00"),
            Guard::TimeWindow(Shift::Explicit(TimeWindow::new(22, 6)))
        );
        assert_eq!(
            Guard::parse("interlock.cryostat_ok"),
            Guard::Interlock("cryostat_ok".to_string())
        );
        assert_eq!(
            Guard::parse("capability: DAC ≤ 50 mV"),
            Guard::Capability {
                name: "DAC".to_string(),
                limit: Quantity::new(50.0, "mV"),
            }
        );
        assert_eq!(
            Guard::parse("capability: heater <= 2mW"),
            Guard::Capability {
                name: "heater".to_string(),
                limit: Quantity::new(2.0, "mW"),
            }
        );
    }

    #[test]
    fn test_parse_unrecognized() {
        assert!(matches!(Guard::parse("operator_present"), Guard::Unrecognized(_)));
        assert!(matches!(Guard::parse("shift=weekend"), Guard::Unrecognized(_)));
        assert!(matches!(Guard::parse("capability: DAC is fine"), Guard::Unrecognized(_)));
    }

    #[test]
    fn test_quantity_parse() {
        assert_eq!(Quantity::parse("50 mV"), Some(Quantity::new(50.0, "mV")));
        assert_eq!(Quantity::parse("-0.5V"), Some(Quantity::new(-0.5, "V")));
        assert_eq!(Quantity::parse("auto"), None);
        assert_eq!(Quantity::parse("42"), None);
        assert_eq!(Quantity::parse("±10 mV"), Some(Quantity::new(10.0, "mV")));
        assert_eq!(Quantity::parse("+/- 2 V"), Some(Quantity::new(2.0, "V")));
        assert_eq!(Quantity::parse("±"), None);
    }

    #[test]
    fn test_value_in_converts_prefixes() {
        let limit = Quantity::new(50.0, "mV");
        let value = Quantity::new(0.08, "V").value_in(&limit).unwrap();
        assert!((value - 80.0).abs() < 1e-9);
        let value = Quantity::new(1.2, "K").value_in(&Quantity::new(20.0, "mK")).unwrap();
        assert!((value - 1200.0).abs() < 1e-9);
        assert_eq!(Quantity::new(20.0, "mK").value_in(&limit), None);
        assert_eq!(Quantity::new(3.0, "mW").value_in(&Quantity::new(3.0, "mW")), Some(3.0));
    }

    #[test]
    fn test_quantity_scan_ranges() {
        let found = Quantity::scan("-80 mV..80 mV");
        assert_eq!(found, vec![Quantity::new(-80.0, "mV"), Quantity::new(80.0, "mV")]);
        assert_eq!(Quantity::scan("0 mV to 20 mV").len(), 2);
        assert!(Quantity::scan("auto").is_empty());
        assert_eq!(Quantity::scan("±100 mV"), vec![Quantity::new(100.0, "mV")]);
    }
}
