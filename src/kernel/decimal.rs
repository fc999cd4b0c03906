//! Fixed-point 128-bit decimal used for `Dec128` values.

use std::cmp::Ordering;
use std::fmt;

/// Scale used when a quotient does not divide evenly
const DIVISION_SCALE: u32 = 18;

/// Decimal number `mantissa * 10^-scale`, kept normalized (no trailing zeros)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dec128 {
    mantissa: i128,
    scale: u32,
}

impl Dec128 {
    /// Build a normalized decimal
    pub fn new(mantissa: i128, scale: u32) -> Self {
        let mut dec = Self { mantissa, scale };
        while dec.scale > 0 && dec.mantissa % 10 == 0 {
            dec.mantissa /= 10;
            dec.scale -= 1;
        }
        if dec.mantissa == 0 {
            dec.scale = 0;
        }
        dec
    }

    /// Decimal from an integer
    pub fn from_i64(value: i64) -> Self {
        Self::new(value as i128, 0)
    }

    /// Parse decimal text such as `-12.050` or `3e2`
    pub fn parse(text: &str) -> Option<Self> {
        let (digits, exponent) = match text.find(['e', 'E']) {
            Some(pos) => (&text[..pos], text[pos + 1..].parse::<i32>().ok()?),
            None => (text, 0),
        };
        let (negative, digits) = match digits.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, digits),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        let mut mantissa: i128 = 0;
        for ch in whole.chars().chain(fraction.chars()) {
            let digit = ch.to_digit(10)? as i128;
            mantissa = mantissa.checked_mul(10)?.checked_add(digit)?;
        }
        if negative {
            mantissa = -mantissa;
        }
        let mut scale = fraction.len() as i32 - exponent;
        while scale < 0 {
            mantissa = mantissa.checked_mul(10)?;
            scale += 1;
        }
        Some(Self::new(mantissa, scale as u32))
    }

    fn rescale(&self, scale: u32) -> Option<i128> {
        let factor = 10i128.checked_pow(scale - self.scale)?;
        self.mantissa.checked_mul(factor)
    }

    fn aligned(&self, other: &Self) -> Option<(i128, i128, u32)> {
        let scale = self.scale.max(other.scale);
        Some((self.rescale(scale)?, other.rescale(scale)?, scale))
    }

    /// Checked addition
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        let (a, b, scale) = self.aligned(other)?;
        Some(Self::new(a.checked_add(b)?, scale))
    }

    /// Checked subtraction
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        let (a, b, scale) = self.aligned(other)?;
        Some(Self::new(a.checked_sub(b)?, scale))
    }

    /// Checked multiplication
    pub fn checked_mul(&self, other: &Self) -> Option<Self> {
        let mantissa = self.mantissa.checked_mul(other.mantissa)?;
        Some(Self::new(mantissa, self.scale + other.scale))
    }

    /// Checked division, exact when possible and rounded toward zero otherwise
    pub fn checked_div(&self, other: &Self) -> Option<Self> {
        if other.mantissa == 0 {
            return None;
        }
        let (a, b, _) = self.aligned(other)?;
        if a % b == 0 {
            return Some(Self::new(a / b, 0));
        }
        let scaled = a.checked_mul(10i128.checked_pow(DIVISION_SCALE)?)?;
        Some(Self::new(scaled / b, DIVISION_SCALE))
    }

    /// Checked remainder
    pub fn checked_rem(&self, other: &Self) -> Option<Self> {
        if other.mantissa == 0 {
            return None;
        }
        let (a, b, scale) = self.aligned(other)?;
        Some(Self::new(a % b, scale))
    }

    /// Negation
    pub fn checked_neg(&self) -> Option<Self> {
        Some(Self::new(self.mantissa.checked_neg()?, self.scale))
    }

    /// Lossy conversion to `f64`
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }
}

impl PartialOrd for Dec128 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dec128 {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.aligned(other) {
            Some((a, b, _)) => a.cmp(&b),
            None => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

impl fmt::Display for Dec128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{}{}", sign, digits);
        }
        let padded = format!("{:0>width$}", digits, width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{}{}.{}", sign, whole, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!(Dec128::parse("12.50").unwrap().to_string(), "12.5");
        assert_eq!(Dec128::parse("-0.05").unwrap().to_string(), "-0.05");
        assert_eq!(Dec128::parse("3e2").unwrap().to_string(), "300");
        assert!(Dec128::parse("1.2.3").is_none());
    }

    #[test]
    fn test_arithmetic() {
        let a = Dec128::parse("1.1").unwrap();
        let b = Dec128::parse("2.2").unwrap();
        assert_eq!(a.checked_add(&b).unwrap(), Dec128::parse("3.3").unwrap());
        assert_eq!(b.checked_div(&a).unwrap(), Dec128::from_i64(2));
        assert_eq!(a.checked_mul(&b).unwrap().to_string(), "2.42");
        assert!(a.checked_div(&Dec128::from_i64(0)).is_none());
        assert!(a < b);
    }
}
