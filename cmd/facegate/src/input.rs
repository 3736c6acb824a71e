//! Reading probe and enrollment embeddings from files or stdin.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use facegate_facematch::Embedding;
use serde_json::Value;

/// Reads a JSON array of numbers from `path`, or from stdin when `path`
/// is `-`.
pub fn read_embedding(path: &Path) -> Result<Embedding> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading embedding from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading embedding from {}", path.display()))?
    };
    parse_embedding(&text)
}

/// Parses a plain JSON array of numbers. Objects keyed by index and
/// other shapes are refused rather than converted.
///
/// Values are narrowed to `f32`. A non-zero value that would narrow to
/// zero is refused here; one too large for `f32` becomes infinite and is
/// left for enrollment validation to reject.
pub fn parse_embedding(text: &str) -> Result<Embedding> {
    let value: Value = serde_json::from_str(text).context("embedding is not valid JSON")?;
    let Value::Array(items) = value else {
        bail!("embedding must be a JSON array of numbers");
    };
    items
        .iter()
        .enumerate()
        .map(|(i, v)| match v.as_f64() {
            Some(x) if x != 0.0 && x as f32 == 0.0 => {
                bail!("embedding element {i} ({x:e}) underflows to zero as f32")
            }
            Some(x) => Ok(x as f32),
            None => bail!("embedding element {i} is not a number"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_array() {
        assert_eq!(parse_embedding("[0.5, -1, 2.5e-1]").unwrap(), vec![0.5, -1.0, 0.25]);
        assert!(parse_embedding("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_keyed_object() {
        let err = parse_embedding(r#"{"0": 0.1, "1": 0.2}"#).unwrap_err();
        assert!(err.to_string().contains("JSON array"), "got {err}");
    }

    #[test]
    fn rejects_non_numeric_element() {
        let err = parse_embedding(r#"[0.1, "x", 0.3]"#).unwrap_err();
        assert!(err.to_string().contains("element 1"), "got {err}");
        assert!(parse_embedding("[0.1, null]").is_err());
    }

    #[test]
    fn rejects_values_lost_to_f32_underflow() {
        let err = parse_embedding("[0.5, 1e-50]").unwrap_err();
        assert!(err.to_string().contains("element 1"), "got {err}");
        assert!(err.to_string().contains("underflows"), "got {err}");
        assert!(parse_embedding("[-1e-60]").is_err());

        // Zero itself and small normal values are fine.
        assert_eq!(parse_embedding("[0, 0.0, -0.0]").unwrap(), vec![0.0; 3]);
        assert!(parse_embedding("[1e-30]").unwrap()[0] > 0.0);
    }

    #[test]
    fn out_of_range_becomes_infinite() {
        // Left for the validator to reject as non-finite.
        let v = parse_embedding("[1e300]").unwrap();
        assert!(v[0].is_infinite());
    }

    #[test]
    fn reads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "[1.0, 2.0]").unwrap();
        assert_eq!(read_embedding(f.path()).unwrap(), vec![1.0, 2.0]);
    }
}
