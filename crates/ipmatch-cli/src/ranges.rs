//! Range list loading
//!
//! One CIDR per line. Blank lines are skipped and `#` starts a comment.

use anyhow::{Context, Result};
use ipmatch::Matcher;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const COMMENT: char = '#';

/// Add every range in the file at `path`, returning how many lines were read
pub fn load_file(matcher: &mut Matcher, path: &Path) -> Result<usize> {
    let file = File::open(path)
        .with_context(|| format!("failed to open range file {}", path.display()))?;
    load(matcher, BufReader::new(file), &path.display().to_string())
}

/// Add every range read from `reader`; `source` names it in errors
pub fn load(matcher: &mut Matcher, reader: impl BufRead, source: &str) -> Result<usize> {
    let mut count = 0;

    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", source))?;
        let entry = line.split(COMMENT).next().unwrap_or("").trim();
        if entry.is_empty() {
            continue;
        }

        matcher
            .add(entry)
            .with_context(|| format!("{}:{}: invalid range", source, index + 1))?;
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_skips_comments_and_blank_lines() {
        let input = "# private ranges\n10.0.0.0/8\n\n  fe80::/10   # link-local\n";
        let mut matcher = Matcher::new();

        let count = load(&mut matcher, input.as_bytes(), "inline").unwrap();

        assert_eq!(count, 2);
        assert!(matcher.has("10.2.3.4").unwrap());
        assert!(matcher.has("fe80::1").unwrap());
    }

    #[test]
    fn test_load_reports_line_number() {
        let input = "10.0.0.0/8\n10.0.0.0/33\n";
        let mut matcher = Matcher::new();

        let err = load(&mut matcher, input.as_bytes(), "ranges.txt").unwrap_err();

        assert_eq!(err.to_string(), "ranges.txt:2: invalid range");
        assert_eq!(
            err.root_cause().to_string(),
            "Invalid CIDR: 10.0.0.0/33"
        );
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "192.168.0.0/16").unwrap();
        writeln!(file, "::ffff:172.16.0.0/108").unwrap();

        let mut matcher = Matcher::new();
        let count = load_file(&mut matcher, file.path()).unwrap();

        assert_eq!(count, 2);
        assert!(matcher.has("192.168.7.7").unwrap());
        assert!(matcher.has("172.31.0.1").unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let mut matcher = Matcher::new();
        let err = load_file(&mut matcher, Path::new("/nonexistent/ranges.txt")).unwrap_err();
        assert!(err.to_string().contains("failed to open range file"));
    }
}
