//! Number coercion and decimal rendering for aggregated column values.
//!
//! Column text arrives as display strings ("5", " 12.5 ", "0x1F", "1e3").
//! Coercion follows the API consumers' `Number(text)` rules: surrounding
//! whitespace is ignored, a whitespace-only string is zero, hex/octal/binary
//! integer prefixes are accepted, and the only accepted word is `Infinity`.
//! Sums are rendered the same way those consumers print numbers, so a sum of
//! `5` and `15` is `"20"`, not `"20.0"`.

/// Coerce display text to a number, or `None` when it is not numeric.
#[must_use]
pub fn coerce_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }

    if let Some(value) = parse_radix_literal(trimmed) {
        return Some(value);
    }

    let unsigned = trimmed.trim_start_matches(['+', '-']);
    // At most one leading sign.
    if trimmed.len() - unsigned.len() > 1 {
        return None;
    }
    if unsigned == "Infinity" {
        return if trimmed.starts_with('-') {
            Some(f64::NEG_INFINITY)
        } else {
            Some(f64::INFINITY)
        };
    }

    // Rust also accepts "inf", "nan" and friends; those are not numbers here.
    if !unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return None;
    }

    trimmed.parse::<f64>().ok().filter(|v| !v.is_nan())
}

#[allow(clippy::cast_precision_loss)]
fn parse_radix_literal(text: &str) -> Option<f64> {
    let lower = text.get(..2)?.to_ascii_lowercase();
    let radix = match lower.as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, radix).ok().map(|v| v as f64)
}

/// Render a number as decimal text the way the API's consumers print it.
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return format!("{value}");
    }

    // Exponent form: "1e21" -> "1e+21", "1.5e-7" stays.
    let rendered = format!("{value:e}");
    match rendered.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => rendered,
    }
}
