//! Decimal strings to fixed-point integers and back

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("invalid decimal '{0}'")]
    Invalid(String),

    #[error("'{value}' has more than {decimals} fractional digits")]
    TooPrecise { value: String, decimals: u32 },

    #[error("'{0}' is too large")]
    Overflow(String),
}

/// Parse "2000.5" into an integer scaled by 10^decimals, exactly
pub fn parse_decimal(value: &str, decimals: u32) -> Result<u128, UnitsError> {
    let trimmed = value.trim().replace('_', "");
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed.as_str(), ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::Invalid(value.to_string()));
    }
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) {
        return Err(UnitsError::Invalid(value.to_string()));
    }
    if fraction.len() > decimals as usize {
        return Err(UnitsError::TooPrecise { value: value.to_string(), decimals });
    }

    let overflow = || UnitsError::Overflow(value.to_string());
    let scale = 10u128.checked_pow(decimals).ok_or_else(overflow)?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| overflow())? };
    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let fraction: u128 = if padded.is_empty() { 0 } else { padded.parse().map_err(|_| overflow())? };

    whole.checked_mul(scale).and_then(|w| w.checked_add(fraction)).ok_or_else(overflow)
}

/// Render a scaled integer with trailing zeros trimmed
pub fn format_decimal(value: u128, decimals: u32) -> String {
    let Some(scale) = 10u128.checked_pow(decimals) else {
        return value.to_string();
    };
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
