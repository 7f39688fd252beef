//! `content.json` document for generated matching activities.

use crate::tabular::{ChoiceType, MatchingActivitySpec};
use serde::Serialize;

/// Library rendering generated matching activities unless configured
/// otherwise.
pub const DEFAULT_MATCHING_LIBRARY: &str = "H5P.Matching";

/// One term/definition pair as the player expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchingPair {
    /// Term shown in the left column.
    pub source: String,
    /// Definition the term must be matched with.
    pub target: String,
}

/// Player behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingBehaviour {
    /// Whether the learner may retry.
    pub enable_retry: bool,
    /// Whether the learner may reveal the solution.
    pub enable_solutions_button: bool,
    /// Score percentage needed to pass.
    pub pass_percentage: u8,
}

impl Default for MatchingBehaviour {
    fn default() -> Self {
        Self {
            enable_retry: true,
            enable_solutions_button: true,
            pass_percentage: 100,
        }
    }
}

/// Player interface strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingL10n {
    /// Label of the check button.
    pub check_answer: String,
    /// Label of the retry button.
    pub try_again: String,
    /// Label of the solution button.
    pub show_solution: String,
    /// Score line; `:num` and `:total` are substituted by the player.
    pub score: String,
    /// Placeholder shown in an empty drop zone.
    pub drop_here: String,
    /// Feedback for a correct match.
    pub correct: String,
    /// Feedback for a wrong match.
    pub incorrect: String,
}

impl Default for MatchingL10n {
    fn default() -> Self {
        Self {
            check_answer: "Check".to_owned(),
            try_again: "Retry".to_owned(),
            show_solution: "Show solution".to_owned(),
            score: "You got :num out of :total points".to_owned(),
            drop_here: "Drop the matching definition here".to_owned(),
            correct: "Correct!".to_owned(),
            incorrect: "Incorrect".to_owned(),
        }
    }
}

/// The generated `content/content.json` document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingContent {
    /// Instructions shown above the activity.
    pub task_description: String,
    /// Presentation of definitions.
    pub choice_type: ChoiceType,
    /// Pairs in authored order.
    pub pairs: Vec<MatchingPair>,
    /// Player behaviour switches.
    pub behaviour: MatchingBehaviour,
    /// Interface strings.
    pub l10n: MatchingL10n,
}

impl From<&MatchingActivitySpec> for MatchingContent {
    fn from(spec: &MatchingActivitySpec) -> Self {
        Self {
            task_description: spec.description.clone(),
            choice_type: spec.choice_type,
            pairs: spec
                .pairs
                .iter()
                .map(|(source, target)| MatchingPair {
                    source: source.clone(),
                    target: target.clone(),
                })
                .collect(),
            behaviour: MatchingBehaviour::default(),
            l10n: MatchingL10n::default(),
        }
    }
}
