//! Evaluation lifecycle for one subject: create, edit, grade, delete.
//!
//! A [`SubjectBook`] is an owned snapshot of a subject's evaluations, grades
//! and roster. Mutations validate first and only then touch the book, so a
//! rejected call leaves it exactly as it was. Persisting the result is the
//! caller's job.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::GradeScale;
use crate::error::{EngineError, EngineResult, Issue};
use crate::model::{EnrollmentStatus, Evaluation, EvaluationState, Grade};

/// Capability to mutate a subject's evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grader {
    pub professor_id: String,
}

/// Read-only access to one student's own grades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub student_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    #[serde(default)]
    pub status: EnrollmentStatus,
}

impl RosterEntry {
    pub fn active(student_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            status: EnrollmentStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub date: NaiveDate,
    pub weight: f64,
}

/// Partial edit; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub student_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    pub index: usize,
    pub student_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingOutcome {
    pub evaluation_id: String,
    pub state: EvaluationState,
    pub recorded: usize,
    pub overwritten: usize,
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedEvaluation {
    pub evaluation: Evaluation,
    pub removed_grades: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectBook {
    pub subject_id: String,
    #[serde(default)]
    pub subject_name: String,
    #[serde(default)]
    pub professor_ids: Vec<String>,
    #[serde(default)]
    pub roster: Vec<RosterEntry>,
    #[serde(default)]
    pub evaluations: Vec<Evaluation>,
    #[serde(default)]
    pub grades: Vec<Grade>,
}

fn validate_name(name: &str) -> EngineResult<String> {
    let t = name.trim();
    if t.is_empty() {
        return Err(EngineError::validation("evaluation name must not be empty"));
    }
    Ok(t.to_string())
}

fn validate_weight(weight: f64) -> EngineResult<f64> {
    if !weight.is_finite() || !(0.0..=100.0).contains(&weight) {
        return Err(EngineError::Validation {
            message: format!("weight {} outside [0, 100]", weight),
            issues: Vec::new(),
        });
    }
    Ok(weight)
}

impl SubjectBook {
    pub fn new(subject_id: &str, subject_name: &str, professor_ids: Vec<String>) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            subject_name: subject_name.to_string(),
            professor_ids,
            ..Default::default()
        }
    }

    pub fn authorize(&self, grader: &Grader) -> EngineResult<()> {
        if self.professor_ids.iter().any(|p| *p == grader.professor_id) {
            Ok(())
        } else {
            Err(EngineError::NotOwner {
                professor_id: grader.professor_id.clone(),
            })
        }
    }

    pub fn evaluation(&self, evaluation_id: &str) -> EngineResult<&Evaluation> {
        self.evaluations
            .iter()
            .find(|e| e.id == evaluation_id)
            .ok_or_else(|| EngineError::NotFound {
                entity: "evaluation",
                id: evaluation_id.to_string(),
            })
    }

    fn evaluation_index(&self, evaluation_id: &str) -> EngineResult<usize> {
        self.evaluations
            .iter()
            .position(|e| e.id == evaluation_id)
            .ok_or_else(|| EngineError::NotFound {
                entity: "evaluation",
                id: evaluation_id.to_string(),
            })
    }

    pub fn assigned_weight(&self) -> f64 {
        self.evaluations.iter().map(|e| e.weight).sum()
    }

    fn warn_if_overassigned(&self) {
        let assigned = self.assigned_weight();
        if assigned > 100.0 {
            tracing::warn!(subject_id = %self.subject_id, assigned, "evaluation weights exceed 100");
        }
    }

    pub fn create_evaluation(
        &mut self,
        grader: &Grader,
        draft: EvaluationDraft,
    ) -> EngineResult<Evaluation> {
        self.authorize(grader)?;
        let name = validate_name(&draft.name)?;
        let weight = validate_weight(draft.weight)?;

        let evaluation = Evaluation {
            id: Uuid::new_v4().to_string(),
            subject_id: self.subject_id.clone(),
            name,
            description: draft.description,
            date: draft.date,
            weight,
            state: EvaluationState::Pending,
        };
        self.evaluations.push(evaluation.clone());
        self.warn_if_overassigned();
        Ok(evaluation)
    }

    /// Any field may change in any state; grading does not lock the record.
    pub fn update_evaluation(
        &mut self,
        grader: &Grader,
        evaluation_id: &str,
        patch: EvaluationPatch,
    ) -> EngineResult<Evaluation> {
        self.authorize(grader)?;
        let idx = self.evaluation_index(evaluation_id)?;

        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let weight = patch.weight.map(validate_weight).transpose()?;

        let e = &mut self.evaluations[idx];
        if let Some(n) = name {
            e.name = n;
        }
        if let Some(d) = patch.description {
            e.description = d;
        }
        if let Some(d) = patch.date {
            e.date = d;
        }
        if let Some(w) = weight {
            e.weight = w;
        }
        let updated = e.clone();
        self.warn_if_overassigned();
        Ok(updated)
    }

    /// Removes the evaluation and every grade recorded for it, in any state.
    pub fn delete_evaluation(
        &mut self,
        grader: &Grader,
        evaluation_id: &str,
    ) -> EngineResult<DeletedEvaluation> {
        self.authorize(grader)?;
        let idx = self.evaluation_index(evaluation_id)?;
        let evaluation = self.evaluations.remove(idx);
        let before = self.grades.len();
        self.grades.retain(|g| g.evaluation_id != evaluation_id);
        Ok(DeletedEvaluation {
            evaluation,
            removed_grades: before - self.grades.len(),
        })
    }

    /// All-or-nothing grade submission for one evaluation.
    ///
    /// Any score outside the scale rejects the whole batch. Students who are
    /// not actively enrolled are skipped and reported. Accepted entries
    /// overwrite earlier grades for the same student.
    pub fn submit_grades(
        &mut self,
        grader: &Grader,
        evaluation_id: &str,
        entries: &[GradeEntry],
        scale: &GradeScale,
        graded_at: Option<NaiveDateTime>,
    ) -> EngineResult<GradingOutcome> {
        self.authorize(grader)?;
        let idx = self.evaluation_index(evaluation_id)?;

        let invalid: Vec<Issue> = entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| !scale.contains(entry.score))
            .map(|(i, entry)| {
                Issue::new(
                    i,
                    Some(&entry.student_id),
                    format!("score {} outside [{}, {}]", entry.score, scale.min, scale.max),
                )
            })
            .collect();
        if !invalid.is_empty() {
            return Err(EngineError::Validation {
                message: format!(
                    "grade batch rejected: {} of {} entries invalid",
                    invalid.len(),
                    entries.len()
                ),
                issues: invalid,
            });
        }

        let enrolled: HashMap<&str, EnrollmentStatus> = self
            .roster
            .iter()
            .map(|r| (r.student_id.as_str(), r.status))
            .collect();

        // Last entry per student wins.
        let mut accepted: Vec<(String, f64)> = Vec::new();
        let mut skipped: Vec<SkippedEntry> = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            match enrolled.get(entry.student_id.as_str()) {
                Some(EnrollmentStatus::Active) => {
                    if let Some(slot) = accepted.iter_mut().find(|(s, _)| *s == entry.student_id) {
                        slot.1 = entry.score;
                    } else {
                        accepted.push((entry.student_id.clone(), entry.score));
                    }
                }
                Some(_) => skipped.push(SkippedEntry {
                    index: i,
                    student_id: entry.student_id.clone(),
                    reason: "student is not actively enrolled".to_string(),
                }),
                None => skipped.push(SkippedEntry {
                    index: i,
                    student_id: entry.student_id.clone(),
                    reason: EngineError::IncompleteData {
                        entity: "student",
                        id: entry.student_id.clone(),
                    }
                    .to_string(),
                }),
            }
        }

        let mut overwritten = 0;
        for (student_id, score) in &accepted {
            if let Some(existing) = self
                .grades
                .iter_mut()
                .find(|g| g.evaluation_id == evaluation_id && g.student_id == *student_id)
            {
                existing.score = *score;
                existing.graded_at = graded_at;
                overwritten += 1;
            } else {
                self.grades.push(Grade {
                    evaluation_id: evaluation_id.to_string(),
                    student_id: student_id.clone(),
                    score: *score,
                    graded_at,
                });
            }
        }

        let has_grades = self.grades.iter().any(|g| g.evaluation_id == evaluation_id);
        let evaluation = &mut self.evaluations[idx];
        if has_grades {
            evaluation.state = EvaluationState::Graded;
        }

        tracing::info!(
            evaluation_id,
            recorded = accepted.len(),
            overwritten,
            skipped = skipped.len(),
            "grade batch accepted"
        );

        Ok(GradingOutcome {
            evaluation_id: evaluation_id.to_string(),
            state: evaluation.state,
            recorded: accepted.len(),
            overwritten,
            skipped,
        })
    }

    /// Check a posted snapshot before aggregating it: every weight in
    /// `[0, 100]`, every recorded score on the scale.
    pub fn validate(&self, scale: &GradeScale) -> EngineResult<()> {
        let mut issues = Vec::new();
        for (i, e) in self.evaluations.iter().enumerate() {
            if let Err(reason) = validate_weight(e.weight) {
                issues.push(Issue::new(i, Some(&e.id), reason.to_string()));
            }
        }
        for (i, g) in self.grades.iter().enumerate() {
            if !scale.contains(g.score) {
                issues.push(Issue::new(
                    i,
                    Some(&g.evaluation_id),
                    format!("score {} for student {} outside scale", g.score, g.student_id),
                ));
            }
        }
        if issues.is_empty() {
            return Ok(());
        }
        tracing::debug!(subject_id = %self.subject_id, issues = issues.len(), "subject book rejected");
        Err(EngineError::Validation {
            message: format!("{} invalid record(s) in subject {}", issues.len(), self.subject_id),
            issues,
        })
    }

    pub fn grades_for(&self, viewer: &Viewer) -> Vec<Grade> {
        self.grades
            .iter()
            .filter(|g| g.student_id == viewer.student_id)
            .cloned()
            .collect()
    }
}
