use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::calc::subject_average;
use crate::config::{Averaging, EngineConfig};
use crate::model::{
    AcademicHistory, AcademicSummary, EnrollmentStatus, EvaluationState, HistoryRow, RecentGrade,
    Score, StudentEvaluation, SubjectAverage, SubjectSnapshot, SummaryIssue, UpcomingEvaluation,
};
use crate::normalize::normalize_record;
use crate::term::{clamp_percent, Term};

/// Everything the aggregator needs for one student, fetched once per call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryInput {
    pub today: NaiveDate,
    #[serde(default)]
    pub subjects: Vec<SubjectSnapshot>,
    /// Passed through unchanged when the API already computed it.
    #[serde(default)]
    pub cumulative_average: Option<f64>,
    #[serde(default)]
    pub semester_progress: Option<f64>,
    #[serde(default)]
    pub term: Option<Term>,
}

struct TrackedSubject<'a> {
    snapshot: &'a SubjectSnapshot,
    average: SubjectAverage,
    /// Evaluations that survived normalization, with their canonical score.
    accepted: Vec<(&'a StudentEvaluation, Score)>,
}

impl TrackedSubject<'_> {
    /// Withdrawn subjects stay in the history but not in current standing.
    fn is_current(&self) -> bool {
        self.snapshot.status != EnrollmentStatus::Withdrawn
    }
}

fn issue(subject_id: &str, evaluation_id: Option<&String>, reason: impl Into<String>) -> SummaryIssue {
    SummaryIssue {
        subject_id: Some(subject_id.to_string()),
        evaluation_id: evaluation_id.cloned(),
        reason: reason.into(),
    }
}

/// Per-subject averages for the subjects with an id. Everything else is
/// reported as an issue and skipped.
fn track_subjects<'a>(
    input: &'a SummaryInput,
    config: &EngineConfig,
    issues: &mut Vec<SummaryIssue>,
) -> Vec<TrackedSubject<'a>> {
    let mut tracked = Vec::new();
    for snapshot in &input.subjects {
        let Some(subject_id) = snapshot.id.as_deref().filter(|s| !s.trim().is_empty()) else {
            tracing::debug!(name = %snapshot.name, "skipping subject without id");
            issues.push(SummaryIssue {
                subject_id: None,
                evaluation_id: None,
                reason: format!("subject '{}' has no id", snapshot.name),
            });
            continue;
        };

        let mut valid = Vec::new();
        let mut accepted = Vec::new();
        for e in &snapshot.evaluations {
            // A pending evaluation cannot carry a score.
            if e.state == Some(EvaluationState::Pending) && e.score.is_some() {
                issues.push(issue(subject_id, e.id.as_ref(), "pending evaluation carries a score"));
                continue;
            }
            match normalize_record(&e.raw_record(), &config.scale) {
                Ok(grade) => {
                    if e.date.is_none() {
                        issues.push(issue(subject_id, e.id.as_ref(), "evaluation has no date"));
                    }
                    accepted.push((e, grade.score));
                    valid.push(grade);
                }
                Err(reason) => {
                    tracing::debug!(subject_id, evaluation_id = ?e.id, %reason, "evaluation skipped");
                    issues.push(issue(subject_id, e.id.as_ref(), reason.to_string()));
                }
            }
        }

        tracked.push(TrackedSubject {
            snapshot,
            average: subject_average(subject_id, &snapshot.name, &valid),
            accepted,
        });
    }
    tracked
}

fn cumulative_average(tracked: &[TrackedSubject<'_>], averaging: Averaging) -> f64 {
    let counted: Vec<&TrackedSubject<'_>> = tracked.iter().filter(|t| t.is_current()).collect();
    if counted.is_empty() {
        return 0.0;
    }
    match averaging {
        Averaging::Equal => {
            counted.iter().map(|t| t.average.average).sum::<f64>() / counted.len() as f64
        }
        Averaging::CreditWeighted => {
            let credits: u32 = counted.iter().map(|t| t.snapshot.credits).sum();
            if credits == 0 {
                return cumulative_average(tracked, Averaging::Equal);
            }
            counted
                .iter()
                .map(|t| t.average.average * t.snapshot.credits as f64)
                .sum::<f64>()
                / credits as f64
        }
    }
}

/// First-seen wins on ties: only a strictly better value replaces the pick.
fn rank_subjects(tracked: &[TrackedSubject<'_>]) -> (Option<SubjectAverage>, Option<SubjectAverage>) {
    let mut best: Option<&SubjectAverage> = None;
    let mut worst: Option<&SubjectAverage> = None;
    for t in tracked.iter().filter(|t| t.is_current()) {
        let avg = &t.average;
        if avg.graded_count == 0 {
            continue;
        }
        if best.map(|b| avg.average > b.average).unwrap_or(true) {
            best = Some(avg);
        }
        if worst.map(|w| avg.average < w.average).unwrap_or(true) {
            worst = Some(avg);
        }
    }
    (best.cloned(), worst.cloned())
}

fn upcoming(tracked: &[TrackedSubject<'_>], today: NaiveDate) -> Vec<UpcomingEvaluation> {
    let mut out: Vec<UpcomingEvaluation> = tracked
        .iter()
        .filter(|t| t.is_current())
        .flat_map(|t| {
            t.accepted.iter().filter_map(move |(e, score)| {
                let date = e.date?;
                if date < today || score.is_graded() || e.effective_state() != EvaluationState::Pending {
                    return None;
                }
                Some(UpcomingEvaluation {
                    evaluation_id: e.id.clone()?,
                    name: e.name.clone(),
                    subject_name: t.snapshot.name.clone(),
                    date,
                })
            })
        })
        .collect();
    out.sort_by_key(|u| u.date);
    out
}

fn recent(tracked: &[TrackedSubject<'_>]) -> Vec<RecentGrade> {
    let mut out: Vec<RecentGrade> = tracked
        .iter()
        .flat_map(|t| {
            t.accepted.iter().filter_map(move |(e, score)| {
                let score = score.value()?;
                let date = e.date?;
                Some(RecentGrade {
                    evaluation_id: e.id.clone()?,
                    evaluation_name: e.name.clone(),
                    subject_name: t.snapshot.name.clone(),
                    score,
                    date,
                    graded_at: e.graded_at,
                })
            })
        })
        .collect();
    out.sort_by(|a, b| {
        let ka = a.graded_at.unwrap_or_else(|| a.date.and_time(NaiveTime::MIN));
        let kb = b.graded_at.unwrap_or_else(|| b.date.and_time(NaiveTime::MIN));
        kb.cmp(&ka)
    });
    out
}

fn semester_progress(input: &SummaryInput, config: &EngineConfig) -> f64 {
    if let Some(p) = input.semester_progress {
        return clamp_percent(p);
    }
    input
        .term
        .or_else(|| Term::containing(input.today, &config.calendar))
        .map(|term| term.progress(input.today))
        .unwrap_or(0.0)
}

fn credit_totals(subjects: &[SubjectSnapshot]) -> (u32, u32) {
    let total = subjects.iter().map(|s| s.credits).sum();
    let approved = subjects
        .iter()
        .filter(|s| s.status == EnrollmentStatus::Approved)
        .map(|s| s.credits)
        .sum();
    (total, approved)
}

/// Total over any deserialisable input: missing data degrades to empty or
/// `None` fields plus entries in `issues`.
pub fn build_summary(input: &SummaryInput, config: &EngineConfig) -> AcademicSummary {
    let mut issues = Vec::new();
    let tracked = track_subjects(input, config, &mut issues);

    let cumulative = input
        .cumulative_average
        .unwrap_or_else(|| cumulative_average(&tracked, config.averaging));
    let (best_subject, worst_subject) = rank_subjects(&tracked);
    let (total_credits, approved_credits) = credit_totals(&input.subjects);

    AcademicSummary {
        cumulative_average: cumulative,
        approved_credits,
        total_credits,
        enrolled_subjects: input
            .subjects
            .iter()
            .filter(|s| s.status == EnrollmentStatus::Active)
            .count(),
        upcoming_evaluations: upcoming(&tracked, input.today),
        recent_grades: recent(&tracked),
        best_subject,
        worst_subject,
        semester_progress: semester_progress(input, config),
        issues,
    }
}

pub fn build_history(input: &SummaryInput, config: &EngineConfig) -> AcademicHistory {
    let mut issues = Vec::new();
    let tracked = track_subjects(input, config, &mut issues);
    let (total_credits, approved_credits) = credit_totals(&input.subjects);

    AcademicHistory {
        subjects: tracked
            .iter()
            .map(|t| HistoryRow {
                id: t.average.subject_id.clone(),
                code: t.snapshot.code.clone(),
                name: t.snapshot.name.clone(),
                credits: t.snapshot.credits,
                status: t.snapshot.status,
                average: t.average.average,
            })
            .collect(),
        general_average: input
            .cumulative_average
            .unwrap_or_else(|| cumulative_average(&tracked, config.averaging)),
        total_credits,
        approved_credits,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn ev(id: &str, date: NaiveDate, weight: f64, score: Option<f64>) -> StudentEvaluation {
        StudentEvaluation {
            id: Some(id.to_string()),
            name: format!("Eval {}", id),
            date: Some(date),
            weight: Some(weight),
            score,
            graded_at: None,
            state: None,
        }
    }

    fn subject(id: &str, credits: u32, status: EnrollmentStatus, evals: Vec<StudentEvaluation>) -> SubjectSnapshot {
        SubjectSnapshot {
            id: Some(id.to_string()),
            code: id.to_uppercase(),
            name: format!("Materia {}", id),
            credits,
            status,
            evaluations: evals,
        }
    }

    fn input(subjects: Vec<SubjectSnapshot>) -> SummaryInput {
        SummaryInput {
            today: d(2026, 10, 18),
            subjects,
            cumulative_average: None,
            semester_progress: None,
            term: None,
        }
    }

    #[test]
    fn empty_input_is_total() {
        let s = build_summary(&input(vec![]), &EngineConfig::default());
        assert_eq!(s.cumulative_average, 0.0);
        assert!(s.best_subject.is_none());
        assert!(s.worst_subject.is_none());
        assert!(s.upcoming_evaluations.is_empty());
        assert!(s.issues.is_empty());
    }

    #[test]
    fn ties_keep_first_seen() {
        let past = d(2026, 9, 1);
        let s = build_summary(
            &input(vec![
                subject("a", 3, EnrollmentStatus::Active, vec![ev("a1", past, 100.0, Some(4.0))]),
                subject("b", 3, EnrollmentStatus::Active, vec![ev("b1", past, 100.0, Some(4.0))]),
            ]),
            &EngineConfig::default(),
        );
        assert_eq!(s.best_subject.unwrap().subject_id, "a");
        assert_eq!(s.worst_subject.unwrap().subject_id, "a");
    }

    #[test]
    fn credit_weighted_average() {
        let past = d(2026, 9, 1);
        let mut cfg = EngineConfig::default();
        cfg.averaging = Averaging::CreditWeighted;
        let s = build_summary(
            &input(vec![
                subject("a", 4, EnrollmentStatus::Active, vec![ev("a1", past, 100.0, Some(4.0))]),
                subject("b", 2, EnrollmentStatus::Active, vec![ev("b1", past, 100.0, Some(1.0))]),
            ]),
            &cfg,
        );
        assert!((s.cumulative_average - 3.0).abs() < 1e-12);
    }

    #[test]
    fn precomputed_cumulative_passes_through() {
        let mut i = input(vec![subject(
            "a",
            3,
            EnrollmentStatus::Active,
            vec![ev("a1", d(2026, 9, 1), 100.0, Some(2.0))],
        )]);
        i.cumulative_average = Some(3.87);
        let s = build_summary(&i, &EngineConfig::default());
        assert_eq!(s.cumulative_average, 3.87);
    }

    #[test]
    fn credits_and_enrolled_counts() {
        let s = build_summary(
            &input(vec![
                subject("a", 3, EnrollmentStatus::Approved, vec![]),
                subject("b", 4, EnrollmentStatus::Active, vec![]),
                subject("c", 2, EnrollmentStatus::Failed, vec![]),
            ]),
            &EngineConfig::default(),
        );
        assert_eq!(s.approved_credits, 3);
        assert_eq!(s.total_credits, 9);
        assert_eq!(s.enrolled_subjects, 1);
    }

    #[test]
    fn withdrawn_subjects_do_not_count_toward_cumulative() {
        let past = d(2026, 9, 1);
        let s = build_summary(
            &input(vec![
                subject("a", 3, EnrollmentStatus::Active, vec![ev("a1", past, 100.0, Some(4.0))]),
                subject("b", 3, EnrollmentStatus::Withdrawn, vec![ev("b1", past, 100.0, Some(1.0))]),
            ]),
            &EngineConfig::default(),
        );
        assert!((s.cumulative_average - 4.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_records_become_issues() {
        let s = build_summary(
            &input(vec![
                subject(
                    "a",
                    3,
                    EnrollmentStatus::Active,
                    vec![
                        ev("a1", d(2026, 9, 1), 50.0, Some(4.0)),
                        ev("a2", d(2026, 9, 2), 150.0, Some(4.0)),
                    ],
                ),
                SubjectSnapshot {
                    name: "sin id".to_string(),
                    ..Default::default()
                },
            ]),
            &EngineConfig::default(),
        );
        assert_eq!(s.issues.len(), 2);
        assert_eq!(s.issues[0].evaluation_id.as_deref(), Some("a2"));
        assert!((s.best_subject.unwrap().average - 2.0).abs() < 1e-12);
    }

    #[test]
    fn upcoming_sorted_ascending_and_recent_descending() {
        let s = build_summary(
            &input(vec![subject(
                "a",
                3,
                EnrollmentStatus::Active,
                vec![
                    ev("late", d(2026, 12, 1), 20.0, None),
                    ev("soon", d(2026, 10, 20), 20.0, None),
                    ev("old", d(2026, 8, 20), 20.0, Some(3.0)),
                    ev("newer", d(2026, 9, 20), 20.0, Some(4.0)),
                    ev("missed", d(2026, 9, 25), 20.0, None),
                ],
            )]),
            &EngineConfig::default(),
        );
        let up: Vec<_> = s.upcoming_evaluations.iter().map(|u| u.evaluation_id.as_str()).collect();
        assert_eq!(up, vec!["soon", "late"]);
        let rec: Vec<_> = s.recent_grades.iter().map(|r| r.evaluation_id.as_str()).collect();
        assert_eq!(rec, vec!["newer", "old"]);
    }

    #[test]
    fn supplied_progress_is_clamped() {
        let mut i = input(vec![]);
        i.semester_progress = Some(130.0);
        assert_eq!(build_summary(&i, &EngineConfig::default()).semester_progress, 100.0);
        i.semester_progress = None;
        i.term = Some(Term {
            start: d(2026, 8, 1),
            end: d(2026, 12, 31),
        });
        let p = build_summary(&i, &EngineConfig::default()).semester_progress;
        assert!(p > 51.0 && p < 52.0);
    }

    #[test]
    fn history_lists_every_subject() {
        let h = build_history(
            &input(vec![
                subject("a", 3, EnrollmentStatus::Approved, vec![ev("a1", d(2026, 3, 1), 100.0, Some(4.0))]),
                subject("b", 2, EnrollmentStatus::Active, vec![]),
            ]),
            &EngineConfig::default(),
        );
        assert_eq!(h.subjects.len(), 2);
        assert_eq!(h.subjects[0].code, "A");
        assert_eq!(h.approved_credits, 3);
        assert_eq!(h.total_credits, 5);
        assert!((h.general_average - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rejected_records_stay_out_of_lists() {
        let s = build_summary(
            &input(vec![subject(
                "a",
                3,
                EnrollmentStatus::Active,
                vec![
                    ev("bad", d(2026, 9, 1), 150.0, Some(4.0)),
                    StudentEvaluation {
                        weight: None,
                        ..ev("noweight", d(2026, 9, 2), 0.0, Some(3.0))
                    },
                    ev("ok", d(2026, 9, 3), 50.0, Some(2.0)),
                ],
            )]),
            &EngineConfig::default(),
        );
        let flagged: Vec<_> = s.issues.iter().filter_map(|i| i.evaluation_id.as_deref()).collect();
        assert_eq!(flagged, vec!["bad", "noweight"]);
        let rec: Vec<_> = s.recent_grades.iter().map(|r| r.evaluation_id.as_str()).collect();
        assert_eq!(rec, vec!["ok"]);
    }

    #[test]
    fn withdrawn_subjects_are_not_ranked_or_upcoming() {
        let s = build_summary(
            &input(vec![
                subject("a", 3, EnrollmentStatus::Active, vec![ev("a1", d(2026, 9, 1), 100.0, Some(4.0))]),
                subject(
                    "w",
                    3,
                    EnrollmentStatus::Withdrawn,
                    vec![
                        ev("w1", d(2026, 9, 1), 100.0, Some(0.5)),
                        ev("w2", d(2026, 11, 1), 0.0, None),
                    ],
                ),
            ]),
            &EngineConfig::default(),
        );
        assert!((s.cumulative_average - 4.0).abs() < 1e-12);
        assert_eq!(s.worst_subject.unwrap().subject_id, "a");
        assert_eq!(s.best_subject.unwrap().subject_id, "a");
        assert!(s.upcoming_evaluations.is_empty());
    }

    #[test]
    fn recent_orders_by_graded_at_then_date() {
        let at = |y, m, day| -> Option<NaiveDateTime> { d(y, m, day).and_hms_opt(12, 0, 0) };
        let s = build_summary(
            &input(vec![subject(
                "a",
                3,
                EnrollmentStatus::Active,
                vec![
                    StudentEvaluation {
                        graded_at: at(2026, 10, 10),
                        ..ev("first", d(2026, 9, 1), 20.0, Some(3.0))
                    },
                    StudentEvaluation {
                        graded_at: at(2026, 9, 21),
                        ..ev("second", d(2026, 9, 20), 20.0, Some(4.0))
                    },
                    ev("third", d(2026, 10, 1), 20.0, Some(5.0)),
                ],
            )]),
            &EngineConfig::default(),
        );
        let rec: Vec<_> = s.recent_grades.iter().map(|r| r.evaluation_id.as_str()).collect();
        assert_eq!(rec, vec!["first", "third", "second"]);
        assert_eq!(s.recent_grades[0].graded_at, at(2026, 10, 10));
        assert_eq!(s.recent_grades[1].graded_at, None);
    }

    #[test]
    fn pending_state_with_score_is_reported_not_counted() {
        let s = build_summary(
            &input(vec![subject(
                "a",
                3,
                EnrollmentStatus::Active,
                vec![StudentEvaluation {
                    state: Some(EvaluationState::Pending),
                    ..ev("clash", d(2026, 11, 5), 100.0, Some(4.0))
                }],
            )]),
            &EngineConfig::default(),
        );
        assert!(s.upcoming_evaluations.is_empty());
        assert!(s.recent_grades.is_empty());
        assert!(s.best_subject.is_none());
        assert_eq!(s.cumulative_average, 0.0);
        assert_eq!(s.issues.len(), 1);
        assert_eq!(s.issues[0].evaluation_id.as_deref(), Some("clash"));
    }

    #[test]
    fn evaluations_without_id_or_date_are_reported() {
        let s = build_summary(
            &input(vec![subject(
                "a",
                3,
                EnrollmentStatus::Active,
                vec![
                    StudentEvaluation {
                        id: None,
                        ..ev("x", d(2026, 11, 5), 20.0, None)
                    },
                    StudentEvaluation {
                        date: None,
                        ..ev("undated", d(2026, 9, 1), 50.0, Some(4.0))
                    },
                ],
            )]),
            &EngineConfig::default(),
        );
        assert_eq!(s.issues.len(), 2);
        assert_eq!(s.issues[0].evaluation_id, None);
        assert_eq!(s.issues[1].evaluation_id.as_deref(), Some("undated"));
        assert!(s.upcoming_evaluations.is_empty());
        assert!(s.recent_grades.is_empty());
        assert!((s.cumulative_average - 2.0).abs() < 1e-12);
    }
}
