//! Parsing of raw vendor attribute values.
//!
//! Values arrive as display strings ("10µF", "25V", "-55°C ~ 125°C"). All
//! parsers are total: anything unparsable yields `None` instead of an error.

/// Placeholder strings vendors use for "no value".
const PLACEHOLDER_DASHES: &[&str] = &["-", "–", "—"];

/// Source values that mean a flag is not required.
const NEGATIVE_FLAG_TOKENS: &[&str] = &[
    "no",
    "n",
    "false",
    "0",
    "none",
    "n/a",
    "not required",
];

/// True when a value is empty, whitespace, or a placeholder dash.
pub fn is_missing_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || PLACEHOLDER_DASHES.contains(&trimmed)
}

/// True when the source value indicates the flag is required.
pub fn flag_required(value: &str) -> bool {
    if is_missing_value(value) {
        return false;
    }
    let lower = value.trim().to_lowercase();
    !NEGATIVE_FLAG_TOKENS.contains(&lower.as_str())
}

/// Unit symbols that may follow an SI prefix. A prefix letter not followed by
/// one of these is part of a unit word ("pins", "ppm", "min") and is ignored.
const PREFIXABLE_UNITS: &[&str] = &["V", "A", "F", "Ω", "Ohm", "ohm", "Hz", "H", "W", "s", "m", "g"];

/// Separators accepted between the two bounds of a declared range.
const RANGE_SEPARATORS: &[&str] = &["~", " to ", "..", " - ", " – ", " — ", "–", "—"];

/// Parse the leading number of a value, applying any SI prefix.
///
/// Accepts a sign, decimals, exponents ("1e3"), thousands separators, a
/// leading `±`/`+`, simple fractions ("1/10W") and the prefixes
/// `p n u µ μ m k K M G` when a unit symbol follows them ("10µF", "2.2MHz").
/// Any other trailing text is ignored.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    parse_leading(raw).map(|(value, _)| value)
}

/// Parse a declared range such as "-40°C ~ 125°C", "2.7V to 5.5V",
/// "1.8V - 5.5V" or "1..10".
///
/// A single value is treated as a degenerate range, but only when no further
/// number follows it. Bounds are returned ordered (min, max).
pub fn parse_range(raw: &str) -> Option<(f64, f64)> {
    let trimmed = raw.trim();
    let parts: Vec<&str> = RANGE_SEPARATORS
        .iter()
        .find(|sep| trimmed.contains(**sep))
        .map(|sep| trimmed.split(*sep).collect())
        .unwrap_or_else(|| vec![trimmed]);

    match parts.as_slice() {
        [single] => parse_bound(single).map(|v| (v, v)),
        [low, high] => {
            let a = parse_bound(low)?;
            let b = parse_bound(high)?;
            Some((a.min(b), a.max(b)))
        }
        _ => None,
    }
}

/// A range bound: one number with nothing numeric after it.
fn parse_bound(raw: &str) -> Option<f64> {
    match parse_leading(raw)? {
        (value, false) => Some(value),
        (_, true) => None,
    }
}

/// Leading value of `raw`, and whether more digits follow it.
fn parse_leading(raw: &str) -> Option<(f64, bool)> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['±', '+'])
        .chars()
        .filter(|c| *c != ',')
        .collect();

    let (mut number, mut rest) = split_number(&cleaned)?;

    if let Some(denominator) = rest.strip_prefix('/') {
        let (den, after) = split_number(denominator)?;
        if den == 0.0 {
            return None;
        }
        number /= den;
        rest = after;
    }

    let rest = rest.trim_start();
    let mut chars = rest.chars();
    let multiplier = chars
        .next()
        .and_then(si_multiplier)
        .filter(|_| {
            let unit = chars.as_str();
            PREFIXABLE_UNITS.iter().any(|u| unit.starts_with(u))
                // bare "10k" / "4.7M"; a lone "m" stays metres or minutes
                || (!rest.starts_with('m') && !unit.starts_with(char::is_alphabetic))
        })
        .unwrap_or(1.0);

    let value = number * multiplier;
    let trailing_digits = rest.chars().any(|c| c.is_ascii_digit());
    value.is_finite().then_some((value, trailing_digits))
}

fn si_multiplier(prefix: char) -> Option<f64> {
    match prefix {
        'p' => Some(1e-12),
        'n' => Some(1e-9),
        'u' | 'µ' | 'μ' => Some(1e-6),
        'm' => Some(1e-3),
        'k' | 'K' => Some(1e3),
        'M' => Some(1e6),
        'G' => Some(1e9),
        _ => None,
    }
}

/// Split a string into its leading decimal number and the remainder.
fn split_number(s: &str) -> Option<(f64, &str)> {
    let bytes = s.as_bytes();
    let mut end = usize::from(bytes.first() == Some(&b'-'));
    let mut seen_digit = false;
    let mut seen_dot = false;

    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            // ".." is a range separator, not a decimal point
            b'.' if !seen_dot && bytes.get(end + 1) != Some(&b'.') => seen_dot = true,
            _ => break,
        }
        end += 1;
    }

    if !seen_digit {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits = bytes[exp_end..].iter().take_while(|b| b.is_ascii_digit()).count();
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    let number = s[..end].parse::<f64>().ok()?;
    Some((number, &s[end..]))
}
