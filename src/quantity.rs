//! Normalisation of Kubernetes resource quantities.
//!
//! Both parsers are total: empty, malformed or out-of-range input yields `0`
//! rather than an error. Fractional results are truncated toward zero.

use serde_json::Value;

const BINARY_SUFFIXES: [(&str, f64); 4] = [
    ("Ki", 1024.0),
    ("Mi", 1024.0 * 1024.0),
    ("Gi", 1024.0 * 1024.0 * 1024.0),
    ("Ti", 1024.0 * 1024.0 * 1024.0 * 1024.0),
];

const DECIMAL_SUFFIXES: [(char, f64); 3] = [('k', 1e3), ('m', 1e6), ('g', 1e9)];

/// Converts a CPU quantity (`"250m"`, `"2"`, `"120034n"`) to millicores.
pub fn parse_cpu_to_millicores(input: &str) -> i64 {
    let s = input.trim();
    let Some(last) = s.chars().last() else {
        return 0;
    };

    let (number, scale) = match last {
        'n' | 'N' => (&s[..s.len() - 1], 1e-6),
        'u' | 'U' => (&s[..s.len() - 1], 1e-3),
        'm' => (&s[..s.len() - 1], 1.0),
        _ => (s, 1000.0),
    };

    parse_number(number).map_or(0, |v| truncate(v * scale))
}

/// Converts a memory quantity (`"128Mi"`, `"2G"`, `"1000"`) to bytes.
pub fn parse_memory_to_bytes(input: &str) -> i64 {
    let s = input.trim();
    if s.is_empty() {
        return 0;
    }

    for (suffix, multiplier) in BINARY_SUFFIXES {
        if let Some(number) = s.strip_suffix(suffix) {
            return parse_number(number).map_or(0, |v| truncate(v * multiplier));
        }
    }

    let last = s.chars().last().map(|c| c.to_ascii_lowercase());
    for (suffix, multiplier) in DECIMAL_SUFFIXES {
        if last == Some(suffix) {
            return parse_number(&s[..s.len() - 1]).map_or(0, |v| truncate(v * multiplier));
        }
    }

    parse_number(s).map_or(0, truncate)
}

/// Same as [`parse_cpu_to_millicores`] for a JSON usage value, which the
/// metrics API may encode either as a quantity string or a bare number.
pub fn cpu_millicores_from_json(value: &Value) -> i64 {
    match value {
        Value::String(s) => parse_cpu_to_millicores(s),
        Value::Number(n) => parse_cpu_to_millicores(&n.to_string()),
        _ => 0,
    }
}

/// Same as [`parse_memory_to_bytes`] for a JSON usage value.
pub fn memory_bytes_from_json(value: &Value) -> i64 {
    match value {
        Value::String(s) => parse_memory_to_bytes(s),
        Value::Number(n) => parse_memory_to_bytes(&n.to_string()),
        _ => 0,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let value: f64 = s.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

// `as` saturates on overflow.
fn truncate(value: f64) -> i64 {
    value.trunc() as i64
}
