//! Default-value parser for pin declarations.
//!
//! Accepts a bare float literal broadcast to every component, or a
//! `floatN(a, ..., n)` constructor whose arity matches the requested
//! dimension. Anything else is a parse failure, which callers turn into
//! a pin error carrying the offending text.

use regex::Regex;
use std::sync::LazyLock;

const FLOAT: &str = r"\s*([-+]?\s*(?:[0-9]+\.?[0-9]*|\.[0-9]+))f?\s*";

static RE_FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{FLOAT}$")).unwrap());

static RE_FLOAT2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\s*float2\s*\({FLOAT},{FLOAT}\)\s*$")).unwrap());

static RE_FLOAT3: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*float3\s*\({FLOAT},{FLOAT},{FLOAT}\)\s*$")).unwrap()
});

static RE_FLOAT4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*float4\s*\({FLOAT},{FLOAT},{FLOAT},{FLOAT}\)\s*$")).unwrap()
});

/// Parse one captured literal, tolerating space between sign and digits.
fn parse_float(text: &str) -> Option<f32> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    compact.parse().ok()
}

/// Parse a default-value expression for a pin of the given dimension
/// (1 to 4). Unused components are left at zero.
pub fn parse_default_value(text: &str, dimension: usize) -> Option<[f32; 4]> {
    debug_assert!((1..=4).contains(&dimension));

    // A bare literal broadcasts to all components
    if let Some(caps) = RE_FLOAT.captures(text) {
        let value = parse_float(&caps[1])?;
        let mut out = [0.0; 4];
        out[..dimension].fill(value);
        return Some(out);
    }
    if dimension == 1 {
        return None;
    }

    let re = match dimension {
        2 => &*RE_FLOAT2,
        3 => &*RE_FLOAT3,
        _ => &*RE_FLOAT4,
    };
    let caps = re.captures(text)?;

    let mut out = [0.0; 4];
    for (i, slot) in out.iter_mut().enumerate().take(dimension) {
        *slot = parse_float(&caps[i + 1])?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_scalar() {
        assert_eq!(parse_default_value("1.0", 1), Some([1.0, 0.0, 0.0, 0.0]));
        assert_eq!(parse_default_value("0.5f", 1), Some([0.5, 0.0, 0.0, 0.0]));
        assert_eq!(parse_default_value("-2", 1), Some([-2.0, 0.0, 0.0, 0.0]));
        assert_eq!(parse_default_value(".25", 1), Some([0.25, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn scalar_broadcasts_to_vector() {
        assert_eq!(parse_default_value("1", 3), Some([1.0, 1.0, 1.0, 0.0]));
        assert_eq!(parse_default_value("2.5", 4), Some([2.5, 2.5, 2.5, 2.5]));
    }

    #[test]
    fn constructor_exact_arity() {
        assert_eq!(
            parse_default_value("float3(1, 2, 3)", 3),
            Some([1.0, 2.0, 3.0, 0.0])
        );
        assert_eq!(
            parse_default_value("float4(1,2,3,4)", 4),
            Some([1.0, 2.0, 3.0, 4.0])
        );
        assert_eq!(
            parse_default_value("float2( 0.5f , -1.5 )", 2),
            Some([0.5, -1.5, 0.0, 0.0])
        );
    }

    #[test]
    fn constructor_wrong_arity_rejected() {
        assert_eq!(parse_default_value("float3(1, 2, 3)", 4), None);
        assert_eq!(parse_default_value("float4(1, 2, 3)", 4), None);
        assert_eq!(parse_default_value("float2(1, 2)", 1), None);
    }

    #[test]
    fn whitespace_tolerated() {
        assert_eq!(
            parse_default_value("  float3 ( 1 , 2 , 3 )  ", 3),
            Some([1.0, 2.0, 3.0, 0.0])
        );
        assert_eq!(parse_default_value(" 1.0f ", 1), Some([1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn garbage_rejected() {
        assert_eq!(parse_default_value("true", 1), None);
        assert_eq!(parse_default_value("float3(a, b, c)", 3), None);
        assert_eq!(parse_default_value("1.0 + 2.0", 1), None);
        assert_eq!(parse_default_value("", 1), None);
    }
}
