//! Fixed-point values as the hub reports them.
//!
//! The hub sends numbers as an integer plus a `prec` (decimal places), e.g.
//! `value=2345 prec=2` means `23.45`. Values are kept in that form so nothing
//! passes through floating point before the scale is known.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest precision we accept. Anything above would overflow `i64` scaling.
pub const MAX_PRECISION: u8 = 12;

/// An integer scaled by `10^-precision`
///
/// Equality is structural: `125 @ 1` and `1250 @ 2` compare unequal even
/// though they denote the same number. Use [`FixedPoint::to_f64`] or
/// [`FixedPoint::normalized`] when comparing across precisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPoint {
    raw: i64,
    precision: u8,
}

impl FixedPoint {
    pub fn new(raw: i64, precision: u8) -> Self {
        Self {
            raw,
            precision: precision.min(MAX_PRECISION),
        }
    }

    pub fn integer(raw: i64) -> Self {
        Self::new(raw, 0)
    }

    /// Parse a hub value string at the given precision.
    ///
    /// Returns `None` for blank values, which is how the hub reports
    /// "unknown". Values already written with a decimal point (some firmware
    /// sends `72.5`) are scaled up exactly rather than parsed as floats.
    /// Anything finer than [`MAX_PRECISION`] or too large to scale is also
    /// `None`; digits are never dropped.
    pub fn parse(raw: &str, precision: u8) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || precision > MAX_PRECISION {
            return None;
        }

        match raw.split_once('.') {
            None => raw.parse::<i64>().ok().map(|v| Self::new(v, precision)),
            Some((whole, frac)) => {
                if frac.is_empty() || !frac.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let digits = u8::try_from(frac.len())
                    .ok()
                    .filter(|digits| *digits <= MAX_PRECISION)?;
                let negative = whole.starts_with('-');
                let whole_abs: i64 = whole.trim_start_matches('-').parse().ok().or(
                    if whole == "-" || whole.is_empty() { Some(0) } else { None },
                )?;
                let scale = 10i64.checked_pow(u32::from(digits))?;
                let magnitude = whole_abs
                    .checked_mul(scale)?
                    .checked_add(frac.parse::<i64>().ok()?)?;
                let value = Self::new(if negative { -magnitude } else { magnitude }, digits);
                value.with_precision(precision.max(digits))
            }
        }
    }

    pub fn raw(&self) -> i64 {
        self.raw
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Rescale to a higher precision without loss. Lower targets are ignored.
    ///
    /// `None` when the target exceeds [`MAX_PRECISION`] or the scaled value
    /// overflows.
    pub fn with_precision(self, precision: u8) -> Option<Self> {
        if precision > MAX_PRECISION {
            return None;
        }
        if precision <= self.precision {
            return Some(self);
        }
        let factor = 10i64.pow(u32::from(precision - self.precision));
        let raw = self.raw.checked_mul(factor)?;
        Some(Self { raw, precision })
    }

    /// Exact division by two, used for half-degree thermostat readings.
    pub fn halved(self) -> Self {
        if self.raw % 2 == 0 {
            return Self::new(self.raw / 2, self.precision);
        }
        match self.raw.checked_mul(5) {
            Some(raw) if self.precision < MAX_PRECISION => Self::new(raw, self.precision + 1),
            _ => Self::new(self.raw / 2, self.precision),
        }
    }

    /// Strip trailing zero decimals: `1250 @ 2` becomes `125 @ 1`.
    pub fn normalized(self) -> Self {
        let mut value = self;
        while value.precision > 0 && value.raw % 10 == 0 {
            value.raw /= 10;
            value.precision -= 1;
        }
        value
    }

    /// Integer value when there is no fractional part.
    pub fn as_integer(&self) -> Option<i64> {
        let normalized = self.normalized();
        (normalized.precision == 0).then_some(normalized.raw)
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    pub fn to_f64(&self) -> f64 {
        self.raw as f64 / 10f64.powi(i32::from(self.precision))
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.precision == 0 {
            return write!(f, "{}", self.raw);
        }
        let scale = 10u64.pow(u32::from(self.precision));
        let magnitude = self.raw.unsigned_abs();
        let sign = if self.raw < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / scale,
            magnitude % scale,
            width = self.precision as usize
        )
    }
}
