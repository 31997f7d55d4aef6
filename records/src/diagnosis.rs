//! Diagnosis payloads exchanged during the chat flow.
//!
//! DESIGN
//! ======
//! The server answers a diagnose request with exactly one of four result
//! shapes. `DiagnosisResult` is an internally tagged enum keyed on `type`, so
//! a payload can only carry the field that belongs to its tag. Whether that
//! field actually holds anything is a separate question answered by
//! [`DiagnosisResult::is_populated`]; callers must not present an
//! unpopulated result.

use serde::{Deserialize, Serialize};

use crate::service::{Issue, Problem};

string_enum! {
    /// Discriminator of [`DiagnosisResult`].
    DiagnosisKind: "diagnosis type" {
        ExistingSolutions => "existing_solutions",
        AiDiagnosis => "ai_diagnosis",
        IssueMatches => "issue_matches",
        ProblemMatches => "problem_matches",
    }
}

string_enum! {
    Severity: "severity" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Medium
    }
}

/// An open ticket that looks like the problem being described.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueMatch {
    pub issue: Issue,
    pub score: f64,
}

/// Model-generated diagnosis, used when nothing in the database matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiDiagnosis {
    pub summary: String,
    #[serde(default)]
    pub possible_causes: Vec<String>,
    #[serde(default)]
    pub recommended_steps: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub requires_technician: bool,
    /// Model self-reported confidence in `0.0..=1.0`.
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiagnosisResult {
    /// Known problems on this machine that already have solutions.
    ExistingSolutions { problems: Vec<Problem> },
    AiDiagnosis { diagnosis: AiDiagnosis },
    /// Active tickets that look like the same fault.
    IssueMatches { issues: Vec<IssueMatch> },
    /// Similar problems seen on comparable equipment.
    ProblemMatches { problems: Vec<Problem> },
}

impl DiagnosisResult {
    #[must_use]
    pub fn kind(&self) -> DiagnosisKind {
        match self {
            Self::ExistingSolutions { .. } => DiagnosisKind::ExistingSolutions,
            Self::AiDiagnosis { .. } => DiagnosisKind::AiDiagnosis,
            Self::IssueMatches { .. } => DiagnosisKind::IssueMatches,
            Self::ProblemMatches { .. } => DiagnosisKind::ProblemMatches,
        }
    }

    /// `true` when the payload for this result's tag is non-empty.
    ///
    /// Existing solutions additionally require every problem to carry at
    /// least one solution.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        match self {
            Self::ExistingSolutions { problems } => {
                !problems.is_empty() && problems.iter().all(|p| !p.solutions.is_empty())
            }
            Self::AiDiagnosis { diagnosis } => {
                !diagnosis.summary.trim().is_empty() || !diagnosis.possible_causes.is_empty()
            }
            Self::IssueMatches { issues } => !issues.is_empty(),
            Self::ProblemMatches { problems } => !problems.is_empty(),
        }
    }

    /// One-line summary suitable for an assistant chat message.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::ExistingSolutions { problems } => {
                let count: usize = problems.iter().map(|p| p.solutions.len()).sum();
                format!("Found {count} known solution(s) for {} matching problem(s).", problems.len())
            }
            Self::AiDiagnosis { diagnosis } => diagnosis.summary.clone(),
            Self::IssueMatches { issues } => {
                format!("Found {} open ticket(s) that look like the same fault.", issues.len())
            }
            Self::ProblemMatches { problems } => {
                format!("Found {} similar problem(s) on comparable equipment.", problems.len())
            }
        }
    }
}

/// Result of the description-enhancement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedDescription {
    pub original: String,
    pub enhanced: String,
}

/// Clarifying questions plus the server's view of whether it has enough
/// information to diagnose.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FollowUpQuestions {
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpAnswer {
    pub question: String,
    pub answer: String,
}
