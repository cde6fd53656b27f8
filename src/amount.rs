//! Display formatting for amounts held in the smallest unit

use std::fmt;

/// Display unit for amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Smallest unit, no scaling
    Sat,
    /// 100 sat
    #[default]
    Bit,
    /// 100,000,000 sat
    Btc,
}

impl Unit {
    /// Case-insensitive `sat`, `bit` or `btc`; anything else is `Bit`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sat" => Unit::Sat,
            "btc" => Unit::Btc,
            _ => Unit::Bit,
        }
    }

    pub fn factor(self) -> u64 {
        match self {
            Unit::Sat => 1,
            Unit::Bit => 100,
            Unit::Btc => 100_000_000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Unit::Sat => "sat",
            Unit::Bit => "bit",
            Unit::Btc => "btc",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Render `amount` (smallest unit) in `unit`, e.g. `1,234.5 bit`.
///
/// The scaled value is rounded to 12 significant digits, printed in its
/// shortest form, and the integer part gets thousands separators.
pub fn render(amount: u64, unit: Unit) -> String {
    let scaled = amount as f64 / unit.factor() as f64;
    let rounded: f64 = format!("{:.11e}", scaled).parse().unwrap_or(scaled);
    let text = rounded.to_string();

    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text.as_str(), None),
    };

    let mut out = group_thousands(integer);
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out.push(' ');
    out.push_str(unit.label());
    out
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
