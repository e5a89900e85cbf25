//! Heuristic split of OCR text into case note fields.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use casewise_core::defaults::NO_DATA_SENTINEL;
use casewise_core::ParsedFields;

/// Everything up to and including the prescription keyword and its separator.
static PRESCRIPTION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*?prescri\w*\s*[:\-]?\s*").expect("valid regex"));

/// Everything up to and including the notes keyword and its separator.
static NOTES_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^.*?(?:clinical\s*notes?|notes)\s*[:\-]?\s*").expect("valid regex")
});

/// Splits raw text into diagnosis, prescription, and clinical notes.
///
/// Lines are trimmed and blank lines skipped. A line containing a
/// prescription keyword (`prescri…`) sets the prescription to the rest of
/// the line after the keyword; a line containing `clinical note(s)` or
/// `notes` does the same for the notes. When several lines match, the last
/// one wins, even when nothing follows its keyword. The first line matching
/// neither becomes the diagnosis. Fields left unset or empty are filled with
/// the sentinel.
///
/// Deterministic and lossy: same input, same output, no attempt at
/// understanding the text.
#[derive(Debug, Clone)]
pub struct FieldParser {
    sentinel: String,
}

impl FieldParser {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    pub fn parse(&self, raw_text: &str) -> ParsedFields {
        let mut diagnosis: Option<&str> = None;
        let mut prescription: Option<&str> = None;
        let mut notes: Option<&str> = None;

        for line in raw_text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(m) = PRESCRIPTION_PREFIX.find(line) {
                prescription = remainder(line, m.end());
            } else if let Some(m) = NOTES_PREFIX.find(line) {
                notes = remainder(line, m.end());
            } else if diagnosis.is_none() {
                diagnosis = Some(line);
            }
        }

        ParsedFields {
            diagnosis: self.or_sentinel(diagnosis),
            prescription: self.or_sentinel(prescription),
            notes: self.or_sentinel(notes),
        }
    }

    /// Parse extractor output.
    ///
    /// OCR scripts may print a JSON object instead of plain text; when the
    /// output is an object with a string `notes` field, that field is parsed.
    /// Anything else is parsed as plain text.
    pub fn parse_output(&self, output: &str) -> ParsedFields {
        self.parse(&text_to_parse(output))
    }

    fn or_sentinel(&self, value: Option<&str>) -> String {
        value
            .map(str::to_string)
            .unwrap_or_else(|| self.sentinel.clone())
    }
}

impl Default for FieldParser {
    fn default() -> Self {
        Self::new(NO_DATA_SENTINEL)
    }
}

fn text_to_parse(output: &str) -> Cow<'_, str> {
    if !output.trim_start().starts_with('{') {
        return Cow::Borrowed(output);
    }
    match serde_json::from_str::<JsonValue>(output) {
        Ok(JsonValue::Object(mut object)) => match object.remove("notes") {
            Some(JsonValue::String(notes)) => Cow::Owned(notes),
            _ => Cow::Borrowed(output),
        },
        _ => Cow::Borrowed(output),
    }
}

/// Text after the keyword, `None` when nothing follows it.
fn remainder(line: &str, keyword_end: usize) -> Option<&str> {
    let rest = line[keyword_end..].trim();
    (!rest.is_empty()).then_some(rest)
}
