pub mod check;
pub mod list;
pub mod new;
pub mod render;

use miette::Result;

/// Split repeated `key=value` arguments.
pub fn parse_pairs(raw: Vec<String>, flag: &str) -> Result<Vec<(String, String)>> {
    raw.into_iter()
        .map(|kv| match kv.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(miette::miette!(
                help = format!("Use {flag} key=value"),
                "Expected KEY=VALUE, got '{}'",
                kv
            )),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_pairs(vec!["a=1".into(), "b=x=y".into(), "c=".into()], "--data").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "x=y".to_string()),
                ("c".to_string(), String::new()),
            ]
        );
        assert!(parse_pairs(vec!["novalue".into()], "--data").is_err());
        assert!(parse_pairs(vec!["=1".into()], "--data").is_err());
    }
}
