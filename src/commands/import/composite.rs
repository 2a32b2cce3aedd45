use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

pub const METRC_TAG_LEN: usize = 16;

/// Tag extracted from the "tag + item description" cell. `note` always keeps
/// the whole trimmed cell text, tag included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeField {
    pub tag: String,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct CompositeParser {
    tag_pattern: Regex,
}

impl CompositeParser {
    pub fn new() -> Result<Self> {
        let tag_pattern = Regex::new(&format!("[A-Z0-9]{{{METRC_TAG_LEN}}}"))
            .context("failed to compile METRC tag regex")?;
        Ok(Self { tag_pattern })
    }

    pub fn parse(&self, raw_text: &str) -> CompositeField {
        let note = raw_text.trim();
        let tag = self
            .tag_pattern
            .find(note)
            .map(|found| found.as_str().to_string())
            .unwrap_or_default();

        CompositeField {
            tag,
            note: note.to_string(),
        }
    }
}

pub fn is_valid_metrc_tag(tag: &str) -> bool {
    tag.len() == METRC_TAG_LEN
        && tag
            .bytes()
            .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
}
