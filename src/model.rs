use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A student's mark on one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Score {
    Graded(f64),
    #[default]
    Pending,
}

impl Score {
    pub fn value(self) -> Option<f64> {
        match self {
            Score::Graded(v) => Some(v),
            Score::Pending => None,
        }
    }

    pub fn is_graded(self) -> bool {
        matches!(self, Score::Graded(_))
    }
}

impl From<Option<f64>> for Score {
    fn from(v: Option<f64>) -> Self {
        v.map(Score::Graded).unwrap_or(Score::Pending)
    }
}

// Wire form is a number or null.
impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationState {
    #[default]
    Pending,
    Graded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: String,
    pub subject_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    pub weight: f64,
    #[serde(default)]
    pub state: EvaluationState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub evaluation_id: String,
    pub student_id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<NaiveDateTime>,
}

/// Grade entry as it arrives from the API, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGradeRecord {
    #[serde(default)]
    pub evaluation_id: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedGrade {
    pub evaluation_id: String,
    pub weight_percent: f64,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject_id: String,
    pub subject_name: String,
    pub average: f64,
    /// Sum of the weights that contributed to `average`.
    pub graded_weight: f64,
    pub graded_count: usize,
    pub pending_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    #[default]
    #[serde(alias = "active", alias = "Activa", alias = "activa")]
    Active,
    #[serde(alias = "approved", alias = "Aprobada", alias = "aprobada")]
    Approved,
    #[serde(alias = "failed", alias = "Reprobada", alias = "reprobada")]
    Failed,
    #[serde(alias = "withdrawn", alias = "Retirada", alias = "retirada")]
    Withdrawn,
}

/// One evaluation of a subject, seen from one student's record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEvaluation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub graded_at: Option<NaiveDateTime>,
    /// Evaluation-level state; derived from `score` when absent.
    #[serde(default)]
    pub state: Option<EvaluationState>,
}

impl StudentEvaluation {
    pub fn raw_record(&self) -> RawGradeRecord {
        RawGradeRecord {
            evaluation_id: self.id.clone(),
            weight: self.weight,
            score: self.score,
        }
    }

    pub fn effective_state(&self) -> EvaluationState {
        match (self.state, self.score) {
            (Some(s), _) => s,
            (None, Some(_)) => EvaluationState::Graded,
            (None, None) => EvaluationState::Pending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub credits: u32,
    #[serde(default)]
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub evaluations: Vec<StudentEvaluation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingEvaluation {
    pub evaluation_id: String,
    pub name: String,
    pub subject_name: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGrade {
    pub evaluation_id: String,
    pub evaluation_name: String,
    pub subject_name: String,
    pub score: f64,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graded_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicSummary {
    pub cumulative_average: f64,
    pub approved_credits: u32,
    pub total_credits: u32,
    pub enrolled_subjects: usize,
    pub upcoming_evaluations: Vec<UpcomingEvaluation>,
    pub recent_grades: Vec<RecentGrade>,
    pub best_subject: Option<SubjectAverage>,
    pub worst_subject: Option<SubjectAverage>,
    pub semester_progress: f64,
    pub issues: Vec<SummaryIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRow {
    pub id: String,
    pub code: String,
    pub name: String,
    pub credits: u32,
    pub status: EnrollmentStatus,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicHistory {
    pub subjects: Vec<HistoryRow>,
    pub general_average: f64,
    pub total_credits: u32,
    pub approved_credits: u32,
    pub issues: Vec<SummaryIssue>,
}
