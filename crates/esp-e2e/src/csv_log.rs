//! CSV side files written during a run.
//!
//! `filename,nhs_number` maps scenario files to the identifiers they seeded;
//! `NhsNumber,RequestHeaders` feeds the load generator.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};

const IDENTIFIER_HEADER: [&str; 2] = ["filename", "nhs_number"];
const REQUEST_PARAMS_HEADER: [&str; 2] = ["NhsNumber", "RequestHeaders"];

/// Append-only `filename,nhs_number` log.
#[derive(Debug, Clone)]
pub struct IdentifierLog {
    path: PathBuf,
}

impl IdentifierLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, writing the header first if the file is new.
    pub fn append(&self, filename: &str, identifier: &str) -> E2eResult<()> {
        append_row(&self.path, IDENTIFIER_HEADER, [filename, identifier])
    }
}

/// Append one load-generation row. Headers are stored as a JSON object.
pub fn write_request_params(
    path: &Path,
    identifier: &str,
    headers: &BTreeMap<String, String>,
) -> E2eResult<()> {
    let headers = serde_json::to_string(headers)?;
    append_row(path, REQUEST_PARAMS_HEADER, [identifier, &headers])
}

fn append_row<const N: usize>(path: &Path, header: [&str; N], row: [&str; N]) -> E2eResult<()> {
    let is_new = !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| E2eError::io(path, err))?;

    let mut text = String::new();
    if is_new {
        text.push_str(&csv_line(&header));
    }
    text.push_str(&csv_line(&row));
    file.write_all(text.as_bytes())
        .map_err(|err| E2eError::io(path, err))
}

fn csv_line(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|field| quote_field(field))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_written_once() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = IdentifierLog::new(tmp.path().join("ids.csv"));
        log.append("a.json", "9000000001").unwrap();
        log.append("b.json", "9000000002").unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            text,
            "filename,nhs_number\r\na.json,9000000001\r\nb.json,9000000002\r\n"
        );
    }

    #[test]
    fn request_headers_are_quoted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("params.csv");
        let headers: BTreeMap<String, String> = [
            ("nhs-login-nhs-number".to_string(), "1".to_string()),
            ("NHSE-Product-ID".to_string(), "x".to_string()),
        ]
        .into_iter()
        .collect();
        write_request_params(&path, "1", &headers).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert_eq!(
            row,
            r#"1,"{""NHSE-Product-ID"":""x"",""nhs-login-nhs-number"":""1""}""#
        );
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(quote_field("abc"), "abc");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
    }
}
