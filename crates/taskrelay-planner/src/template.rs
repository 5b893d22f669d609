//! `{in}` / `{inN}` argument placeholder substitution (C3, §4.3).
//!
//! Pure function, no side effects: given an argument vector and the
//! basenames of a plan item's local inputs, rewrite string arguments that
//! match a placeholder; everything else (non-matching strings, non-string
//! JSON values) passes through unchanged.

use serde_json::Value;

/// Substitute `{in}` and `{inN}` placeholders in `args` using `basenames`.
///
/// - `{in}` resolves to the single basename when exactly one is present;
///   otherwise the literal text is kept.
/// - `{inN}` resolves to `basenames[N]` when `N` is in range; otherwise the
///   literal text is kept.
/// - Any argument that isn't a string, or a string that isn't exactly one of
///   the two placeholder shapes, is returned unchanged.
pub fn template_args(args: &[Value], basenames: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| match arg.as_str() {
            Some(text) => Value::String(substitute(text, basenames)),
            None => arg.clone(),
        })
        .collect()
}

fn substitute(text: &str, basenames: &[String]) -> String {
    if text == "{in}" {
        if let [only] = basenames {
            return only.clone();
        }
        return text.to_string();
    }

    if let Some(index) = parse_indexed_placeholder(text) {
        if let Some(basename) = basenames.get(index) {
            return basename.clone();
        }
    }

    text.to_string()
}

/// Parse `{inN}` and return `N`, or `None` if `text` isn't exactly that shape.
fn parse_indexed_placeholder(text: &str) -> Option<usize> {
    let inner = text.strip_prefix("{in")?.strip_suffix('}')?;
    if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    inner.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn identity_when_no_placeholders() {
        let args = vec![json!("--flag"), json!(42), json!(true)];
        assert_eq!(template_args(&args, &["a.txt".into()]), args);
    }

    #[test]
    fn in_resolves_with_exactly_one_basename() {
        let args = vec![json!("{in}")];
        assert_eq!(template_args(&args, &["a.txt".into()]), vec![json!("a.txt")]);
    }

    #[test]
    fn in_is_literal_with_zero_or_many_basenames() {
        let args = vec![json!("{in}")];
        assert_eq!(template_args(&args, &[]), vec![json!("{in}")]);
        assert_eq!(
            template_args(&args, &["a.txt".into(), "b.txt".into()]),
            vec![json!("{in}")]
        );
    }

    #[test]
    fn indexed_placeholder_resolves_in_range() {
        let basenames = vec!["a.txt".to_string(), "b.txt".to_string()];
        let args = vec![json!("{in0}"), json!("{in1}")];
        assert_eq!(
            template_args(&args, &basenames),
            vec![json!("a.txt"), json!("b.txt")]
        );
    }

    #[test]
    fn indexed_placeholder_is_literal_out_of_range() {
        let basenames = vec!["a.txt".to_string()];
        let args = vec![json!("{in5}")];
        assert_eq!(template_args(&args, &basenames), vec![json!("{in5}")]);
    }

    #[test]
    fn non_string_values_pass_through() {
        let args = vec![json!(3.14), json!(null), json!({"k": "v"})];
        assert_eq!(template_args(&args, &["a.txt".into()]), args);
    }

    proptest! {
        #[test]
        fn in_n_always_matches_its_own_basename(n in 0usize..8) {
            let basenames: Vec<String> = (0..=n).map(|i| format!("file{i}.bin")).collect();
            let placeholder = format!("{{in{n}}}");
            let result = template_args(&[Value::String(placeholder)], &basenames);
            prop_assert_eq!(result, vec![Value::String(basenames[n].clone())]);
        }
    }
}
