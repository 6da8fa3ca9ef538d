use serde_json::Value;

pub const PREFIXES: [&str; 9] = ["p", "n", "µ", "m", "", "k", "M", "G", "T"];
pub const MIN_EXPONENT: i32 = -4;
pub const MAX_EXPONENT: i32 = 4;
pub const MAX_SIGNIFICANT_FIGURES: u32 = 17;

#[derive(Debug, Clone, PartialEq)]
pub struct Scaled {
    pub value: f64,
    pub exponent: i32,
    pub prefix: &'static str,
}

/// Formats `value` for display. Never fails: non-numeric input is returned
/// verbatim with no prefix or unit.
pub fn format(value: &Value, unit: &str, significant_figures: u32) -> String {
    match numeric(value) {
        Some(number) => format_number(number, unit, significant_figures),
        None => verbatim(value),
    }
}

pub fn format_number(value: f64, unit: &str, significant_figures: u32) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let scaled = scale(value, significant_figures);
    let text = format!("{} {}{}", scaled.value, scaled.prefix, unit);
    text.trim_end().to_string()
}

pub fn scale(value: f64, significant_figures: u32) -> Scaled {
    let exponent = exponent_for(value);
    let divided = value / 1000_f64.powi(exponent);
    let rounded = round_significant(divided, significant_figures);

    if rounded == 0.0 {
        return Scaled {
            value: 0.0,
            exponent,
            prefix: "",
        };
    }

    Scaled {
        value: rounded,
        exponent,
        prefix: prefix_for(exponent),
    }
}

/// `floor(log10(|value|) / 3)` clamped to the prefix table.
pub fn exponent_for(value: f64) -> i32 {
    let magnitude = value.abs();
    if magnitude == 0.0 || !magnitude.is_finite() {
        return 0;
    }

    let mut exponent = (magnitude.log10() / 3.0).floor() as i32;

    // log10 is inexact near powers of ten; settle on the bucket where the
    // scaled magnitude lands in [1, 1000).
    if magnitude / 1000_f64.powi(exponent) >= 1000.0 {
        exponent += 1;
    } else if magnitude / 1000_f64.powi(exponent) < 1.0 {
        exponent -= 1;
    }

    exponent.clamp(MIN_EXPONENT, MAX_EXPONENT)
}

pub fn prefix_for(exponent: i32) -> &'static str {
    let clamped = exponent.clamp(MIN_EXPONENT, MAX_EXPONENT);
    PREFIXES[(clamped - MIN_EXPONENT) as usize]
}

/// Rounds half away from zero to `figures` significant digits.
pub fn round_significant(value: f64, figures: u32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }

    let figures = figures.clamp(1, MAX_SIGNIFICANT_FIGURES) as i32;
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = figures - 1 - magnitude;

    if decimals >= 0 {
        let factor = 10_f64.powi(decimals);
        (value * factor).round() / factor
    } else {
        let factor = 10_f64.powi(-decimals);
        (value / factor).round() * factor
    }
}

/// Finite numbers and numeric strings; everything else is not formatted.
pub fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };

    number.is_finite().then_some(number)
}

fn verbatim(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
