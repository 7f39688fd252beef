//! Term/definition tables for matching activities.
//!
//! Authors paste a two-column table copied from a spreadsheet, a CSV file,
//! or a Markdown document. Each row is split on its own delimiter, so mixed
//! input still parses: a row containing `|` is treated as a Markdown table
//! row, otherwise a tab-separated row, otherwise comma-separated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Minimum number of valid rows a matching activity needs.
pub const MIN_PAIRS: usize = 2;

/// Title used when the author leaves it blank.
pub const DEFAULT_TITLE: &str = "Untitled matching activity";

/// Rejected tabular input. Messages are shown to authors verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Fewer than [`MIN_PAIRS`] rows had both a term and a definition.
    #[error("provide at least two valid rows")]
    TooFewRows {
        /// Number of valid rows found.
        found: usize,
    },

    /// The requested choice type is not supported.
    #[error("unsupported choice type `{0}`; use `text` or `image`")]
    UnsupportedChoiceType(String),
}

/// How the definitions of a matching activity are presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoiceType {
    /// Definitions are text.
    #[default]
    Text,
    /// Definitions are image references.
    Image,
}

impl ChoiceType {
    /// Lowercase name used in content documents.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ChoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChoiceType {
    type Err = GenerationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            _ => Err(GenerationError::UnsupportedChoiceType(value.trim().to_owned())),
        }
    }
}

fn split_row(line: &str) -> Vec<&str> {
    if line.contains('|') {
        let trimmed = line.trim();
        let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
        let inner = inner.strip_suffix('|').unwrap_or(inner);
        inner.split('|').map(str::trim).collect()
    } else if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split(',').map(str::trim).collect()
    }
}

fn first_two_fields(fields: &[&str]) -> Option<(String, String)> {
    let mut non_empty = fields.iter().filter(|field| !field.is_empty());
    let term = non_empty.next()?;
    let definition = non_empty.next()?;
    Some(((*term).to_owned(), (*definition).to_owned()))
}

fn is_header(fields: &[&str]) -> bool {
    let mut tokens = fields.iter().filter(|field| !field.is_empty());
    let first = tokens.next().map(|token| token.to_ascii_lowercase());
    let second = tokens.next().map(|token| token.to_ascii_lowercase());
    matches!(first.as_deref(), Some("term" | "terms"))
        && matches!(second.as_deref(), Some("definition" | "definitions"))
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed
            .chars()
            .all(|ch| matches!(ch, '|' | '-' | ':' | ' ' | '\t'))
}

/// Extracts `(term, definition)` pairs from pasted table text.
///
/// Blank lines are ignored. A leading `term`/`definition` header row is
/// dropped together with a Markdown separator row directly below it. Each
/// remaining row contributes its first two non-empty fields; rows with fewer
/// are skipped.
///
/// # Errors
///
/// Returns [`GenerationError::TooFewRows`] when fewer than two rows are
/// valid.
///
/// # Examples
///
/// ```
/// use h5pack_packager::tabular::parse_pairs;
///
/// let pairs = parse_pairs("| Term | Definition |\n|---|---|\n| PPE | Protective gear |\n| HAI | Hospital-acquired infection |")
///     .expect("two rows");
/// assert_eq!(pairs[0], ("PPE".to_owned(), "Protective gear".to_owned()));
/// assert_eq!(pairs.len(), 2);
/// ```
pub fn parse_pairs(raw: &str) -> Result<Vec<(String, String)>, GenerationError> {
    let mut lines = raw.lines().filter(|line| !line.trim().is_empty()).peekable();

    if lines
        .peek()
        .is_some_and(|line| is_header(&split_row(line)))
    {
        lines.next();
        if lines.peek().is_some_and(|line| is_separator(line)) {
            lines.next();
        }
    }

    let pairs: Vec<(String, String)> = lines
        .filter_map(|line| first_two_fields(&split_row(line)))
        .collect();
    if pairs.len() < MIN_PAIRS {
        return Err(GenerationError::TooFewRows { found: pairs.len() });
    }
    Ok(pairs)
}

/// Validated input for a generated matching activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingActivitySpec {
    /// Package title; never blank.
    pub title: String,
    /// Task description shown above the activity.
    pub description: String,
    /// Presentation of definitions.
    pub choice_type: ChoiceType,
    /// Ordered `(term, definition)` pairs.
    pub pairs: Vec<(String, String)>,
}

impl MatchingActivitySpec {
    /// Validates author input.
    ///
    /// A blank title becomes [`DEFAULT_TITLE`]; `choice_type` is matched
    /// case-insensitively after trimming.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::UnsupportedChoiceType`] for anything other
    /// than `text` or `image`, and [`GenerationError::TooFewRows`] when fewer
    /// than two pairs are supplied.
    pub fn validate(
        title: &str,
        description: &str,
        choice_type: &str,
        pairs: Vec<(String, String)>,
    ) -> Result<Self, GenerationError> {
        let choice_type = choice_type.parse()?;
        if pairs.len() < MIN_PAIRS {
            return Err(GenerationError::TooFewRows { found: pairs.len() });
        }
        let title = title.trim();
        Ok(Self {
            title: if title.is_empty() {
                DEFAULT_TITLE.to_owned()
            } else {
                title.to_owned()
            },
            description: description.trim().to_owned(),
            choice_type,
            pairs,
        })
    }

    /// Parses `raw` with [`parse_pairs`] and validates the result.
    ///
    /// # Errors
    ///
    /// Returns the first [`GenerationError`] raised by parsing or
    /// validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use h5pack_packager::{ChoiceType, MatchingActivitySpec};
    ///
    /// let spec = MatchingActivitySpec::from_table(
    ///     "",
    ///     "Match each term.",
    ///     " TEXT ",
    ///     "PPE,Protective gear\nHAI,Hospital-acquired infection",
    /// )
    /// .expect("valid table");
    /// assert_eq!(spec.title, "Untitled matching activity");
    /// assert_eq!(spec.choice_type, ChoiceType::Text);
    /// ```
    pub fn from_table(
        title: &str,
        description: &str,
        choice_type: &str,
        raw: &str,
    ) -> Result<Self, GenerationError> {
        let choice_type = choice_type.parse::<ChoiceType>()?;
        let pairs = parse_pairs(raw)?;
        Self::validate(title, description, choice_type.as_str(), pairs)
    }
}
