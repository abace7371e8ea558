//! JSONL request reader.

use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

use crate::types::RequestRecord;
use crate::{Error, ErrorContext, Result};

/// Read one request per non-blank line. An unreadable file is fatal; malformed
/// lines are skipped with a warning.
pub fn read_requests(path: impl AsRef<Path>) -> Result<Vec<RequestRecord>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::configuration_with_context(
            format!("cannot open input file: {}", e),
            ErrorContext::new()
                .with_field_path(path.display().to_string())
                .with_source("dataset_reader"),
        )
    })?;
    parse_requests(BufReader::new(file))
}

/// Only a failing read of the underlying stream is an error. Lines that are
/// not UTF-8, not JSON, or not a usable request object are skipped.
pub fn parse_requests<R: BufRead>(reader: R) -> Result<Vec<RequestRecord>> {
    let mut records = Vec::new();
    for (line_no, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let value: Value = match serde_json::from_slice(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping undecodable input line");
                continue;
            }
        };
        match RequestRecord::from_json(records.len(), value) {
            Ok(rec) => records.push(rec),
            Err(reason) => {
                warn!(line = line_no + 1, "skipping input line: {}", reason);
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_skips_blank_and_malformed_lines() {
        let input = concat!(
            "{\"prompt\": \"a\", \"title\": \"A\"}\n",
            "\n",
            "{not json}\n",
            "   \n",
            "{\"title\": \"no prompt\"}\n",
            "{\"prompt\": \"b\"}\n",
            "{\"file_path\": \"/tmp/x.pdf\", \"prompt\": \"c\"}\n",
        );
        let records = parse_requests(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 3);
        let indices: Vec<usize> = records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(records[0].passthrough["title"], "A");
        assert_eq!(records[1].prompt, "b");
        assert!(records[2].attachment.is_some());
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let input: &[u8] = b"{\"prompt\":\"a\"}\n{\"prompt\":\"\xff\xfe\"}\n{\"prompt\":\"c\"}\r\n";
        let records = parse_requests(Cursor::new(input)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].prompt, "a");
        assert_eq!(records[1].prompt, "c");
        assert_eq!(records[1].index, 1);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = read_requests("/no/such/input.jsonl").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
