//! Test-case import from CSV and JSON files.
//!
//! Column and property names are matched against a small set of synonyms so
//! hand-written files work without an exact schema.

use serde_json::Value;
use std::path::Path;
use thiserror::Error;

use crate::TestCase;

const PROMPT_KEYS: &[&str] = &["testprompt", "test_prompt", "test prompt", "prompt"];
const EXPECTED_KEYS: &[&str] = &[
    "expectedbehavior",
    "expected_behavior",
    "expected behavior",
    "expected",
    "behavior",
];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV file must have a header row and at least one data row")]
    CsvTooShort,

    #[error("CSV must have a \"testPrompt\" or \"prompt\" column")]
    MissingPromptColumn,

    #[error("CSV must have an \"expectedBehavior\" or \"expected\" column")]
    MissingExpectedColumn,

    #[error("No valid test prompts found in CSV file")]
    NoValidCsvRows,

    #[error("Invalid JSON format: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON must be an array of test prompt objects")]
    NotAnArray,

    #[error("JSON array is empty")]
    EmptyArray,

    #[error("No valid test prompts found in JSON file. Each object must have \"testPrompt\" and \"expectedBehavior\" properties.")]
    NoValidJsonItems,

    #[error("Unsupported file format. Please use CSV or JSON files.")]
    UnsupportedFormat,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Parse CSV content with a header row
pub fn parse_csv(content: &str) -> Result<Vec<TestCase>, ImportError> {
    let lines: Vec<&str> = content
        .trim()
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect();
    if lines.len() < 2 {
        return Err(ImportError::CsvTooShort);
    }

    let header: Vec<String> = split_csv_line(lines[0])
        .into_iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let prompt_idx = header
        .iter()
        .position(|h| PROMPT_KEYS.contains(&h.as_str()))
        .ok_or(ImportError::MissingPromptColumn)?;
    let expected_idx = header
        .iter()
        .position(|h| EXPECTED_KEYS.contains(&h.as_str()))
        .ok_or(ImportError::MissingExpectedColumn)?;

    let cases: Vec<TestCase> = lines[1..]
        .iter()
        .filter_map(|line| {
            let values = split_csv_line(line);
            let prompt = values.get(prompt_idx).map(|v| v.trim()).unwrap_or("");
            let expected = values.get(expected_idx).map(|v| v.trim()).unwrap_or("");
            (!prompt.is_empty() && !expected.is_empty()).then(|| TestCase::new(prompt, expected))
        })
        .collect();

    if cases.is_empty() {
        return Err(ImportError::NoValidCsvRows);
    }
    Ok(cases)
}

/// Split one CSV line, honoring double quotes and `""` escapes
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Parse a JSON array of test-case objects
pub fn parse_json(content: &str) -> Result<Vec<TestCase>, ImportError> {
    let data: Value = serde_json::from_str(content)?;
    let items = data.as_array().ok_or(ImportError::NotAnArray)?;
    if items.is_empty() {
        return Err(ImportError::EmptyArray);
    }

    let cases: Vec<TestCase> = items
        .iter()
        .filter_map(|item| {
            let prompt = lookup(item, &["testPrompt", "test_prompt", "test prompt", "prompt"])?;
            let expected = lookup(
                item,
                &[
                    "expectedBehavior",
                    "expected_behavior",
                    "expected behavior",
                    "expected",
                    "behavior",
                ],
            )?;
            Some(TestCase::new(prompt.trim(), expected.trim()))
        })
        .collect();

    if cases.is_empty() {
        return Err(ImportError::NoValidJsonItems);
    }
    Ok(cases)
}

/// First non-empty value among `keys`, stringified
fn lookup(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    })
}

/// Read a `.csv` or `.json` file from disk
pub fn parse_file(path: &Path) -> Result<Vec<TestCase>, ImportError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let read = || {
        std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.display().to_string(),
            source,
        })
    };

    match extension.as_deref() {
        Some("csv") => parse_csv(&read()?),
        Some("json") => parse_json(&read()?),
        _ => Err(ImportError::UnsupportedFormat),
    }
}
