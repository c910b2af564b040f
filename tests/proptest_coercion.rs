//! Property-based tests for token coercion
//!
//! Coverage targets:
//! - Scalar coercion (coerce/mod.rs): well-formed tokens round-trip, garbage fails
//! - Default policy: separator splitting feeds list fields
//! - Fixed arrays: token count must match exactly

use proptest::prelude::*;
use reqbind::coerce::parse_duration;
use reqbind::{apply_tokens, DefaultPolicy, Leaf};
use std::time::Duration;

fn coerce<T: Leaf + Default>(tokens: Vec<String>) -> Result<T, reqbind::CoercionError> {
    let mut value = T::default();
    apply_tokens(&mut value, tokens, &DefaultPolicy::disabled("|"))?;
    Ok(value)
}

// =============================================================================
// Scalars
// =============================================================================

proptest! {
    #[test]
    fn test_i64_tokens_parse_exactly(n in any::<i64>()) {
        prop_assert_eq!(coerce::<i64>(vec![n.to_string()]).unwrap(), n);
    }

    #[test]
    fn test_u8_range_is_enforced(n in any::<i32>()) {
        let result = coerce::<u8>(vec![n.to_string()]);
        if (0..=255).contains(&n) {
            prop_assert_eq!(result.unwrap() as i32, n);
        } else {
            prop_assert!(result.is_err());
        }
    }

    #[test]
    fn test_finite_f64_tokens_parse(x in any::<f64>().prop_filter("finite", |x| x.is_finite())) {
        prop_assert_eq!(coerce::<f64>(vec![x.to_string()]).unwrap(), x);
    }

    #[test]
    fn test_strings_are_verbatim(s in ".*") {
        prop_assert_eq!(coerce::<String>(vec![s.clone()]).unwrap(), s);
    }

    #[test]
    fn test_unsigned_rejects_explicit_plus(n in any::<u32>()) {
        let plus_n = format!("+{n}");
        prop_assert!(coerce::<u32>(vec![plus_n]).is_err());
        prop_assert_eq!(coerce::<i64>(vec![format!("+{n}")]).unwrap(), i64::from(n));
    }

    #[test]
    fn test_alphabetic_tokens_never_coerce_to_ints(s in "[a-zA-Z]{1,12}") {
        prop_assert!(coerce::<i32>(vec![s.clone()]).is_err());
        prop_assert!(coerce::<u64>(vec![s]).is_err());
    }
}

// =============================================================================
// Defaults and sequences
// =============================================================================

proptest! {
    #[test]
    fn test_default_list_matches_joined_values(values in prop::collection::vec(any::<i32>(), 1..10)) {
        let raw = values.iter().map(ToString::to_string).collect::<Vec<_>>().join("|");
        let mut list: Vec<i32> = Vec::new();
        apply_tokens(&mut list, Vec::new(), &DefaultPolicy::new(raw, "|")).unwrap();
        prop_assert_eq!(list, values);
    }

    #[test]
    fn test_untouched_without_tokens_or_default(initial in any::<i64>()) {
        let mut value = initial;
        apply_tokens(&mut value, Vec::new(), &DefaultPolicy::disabled("|")).unwrap();
        prop_assert_eq!(value, initial);
    }

    #[test]
    fn test_array_requires_exact_count(values in prop::collection::vec(any::<u16>(), 0..8)) {
        let tokens: Vec<String> = values.iter().map(ToString::to_string).collect();
        let result = coerce::<[u16; 4]>(tokens);
        match values.len() {
            // No tokens and no default: untouched
            0 => prop_assert_eq!(result.unwrap(), [0_u16; 4]),
            4 => prop_assert_eq!(result.unwrap().to_vec(), values),
            _ => prop_assert!(result.is_err()),
        }
    }
}

// =============================================================================
// Durations
// =============================================================================

proptest! {
    #[test]
    fn test_compound_duration(h in 0u64..1000, m in 0u64..60, s in 0u64..60, ms in 0u64..1000) {
        let literal = format!("{h}h{m}m{s}s{ms}ms");
        let expected = Duration::from_secs(h * 3600 + m * 60 + s) + Duration::from_millis(ms);
        prop_assert_eq!(parse_duration(&literal), Ok(expected));
    }

    #[test]
    fn test_duration_parser_never_panics(s in "[-+.0-9a-zµ]{0,16}") {
        let _ = parse_duration(&s);
    }
}
