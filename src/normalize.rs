use serde::Serialize;
use std::fmt;

use crate::config::GradeScale;
use crate::error::{EngineError, Issue};
use crate::model::{NormalizedGrade, RawGradeRecord, Score};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum RejectReason {
    MissingEvaluationId,
    MissingWeight,
    NotANumber,
    WeightOutOfRange(f64),
    ScoreOutOfRange(f64),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEvaluationId => write!(f, "missing evaluation id"),
            Self::MissingWeight => write!(f, "missing weight"),
            Self::NotANumber => write!(f, "weight or score is not a finite number"),
            Self::WeightOutOfRange(w) => write!(f, "weight {} outside [0, 100]", w),
            Self::ScoreOutOfRange(s) => write!(f, "score {} outside scale", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_id: Option<String>,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedBatch {
    pub valid: Vec<NormalizedGrade>,
    pub rejected: Vec<RejectedRecord>,
}

impl NormalizedBatch {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Strict mode: any rejected record fails the whole batch.
    pub fn into_result(self) -> Result<Vec<NormalizedGrade>, EngineError> {
        if self.rejected.is_empty() {
            return Ok(self.valid);
        }
        let issues = self
            .rejected
            .iter()
            .map(|r| Issue::new(r.index, r.evaluation_id.as_deref(), r.reason.to_string()))
            .collect();
        Err(EngineError::Validation {
            message: format!("{} grade record(s) rejected", self.rejected.len()),
            issues,
        })
    }
}

pub fn normalize_record(raw: &RawGradeRecord, scale: &GradeScale) -> Result<NormalizedGrade, RejectReason> {
    let evaluation_id = match raw.evaluation_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return Err(RejectReason::MissingEvaluationId),
    };
    let Some(weight) = raw.weight else {
        return Err(RejectReason::MissingWeight);
    };
    if !weight.is_finite() || raw.score.map(|s| !s.is_finite()).unwrap_or(false) {
        return Err(RejectReason::NotANumber);
    }
    if !(0.0..=100.0).contains(&weight) {
        return Err(RejectReason::WeightOutOfRange(weight));
    }
    let score = match raw.score {
        Some(s) if !scale.contains(s) => return Err(RejectReason::ScoreOutOfRange(s)),
        other => Score::from(other),
    };
    Ok(NormalizedGrade {
        evaluation_id,
        weight_percent: weight,
        score,
    })
}

/// Split raw records into canonical tuples and rejections. Nothing is clamped.
pub fn normalize_records(records: &[RawGradeRecord], scale: &GradeScale) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, raw) in records.iter().enumerate() {
        match normalize_record(raw, scale) {
            Ok(grade) => batch.valid.push(grade),
            Err(reason) => {
                tracing::debug!(index, evaluation_id = ?raw.evaluation_id, %reason, "grade record rejected");
                batch.rejected.push(RejectedRecord {
                    index,
                    evaluation_id: raw.evaluation_id.clone(),
                    reason,
                });
            }
        }
    }
    batch
}
