use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::GradeScale;
use crate::lifecycle::RosterEntry;
use crate::model::{Evaluation, EvaluationState, Grade, NormalizedGrade, Score, SubjectAverage};

/// Round half away from zero to `places` decimals. Display only; the engine
/// keeps unrounded values internally.
pub fn round_to(x: f64, places: u32) -> f64 {
    let factor = 10_f64.powi(places as i32);
    (x * factor).round() / factor
}

/// Weighted contribution of one graded evaluation: `score * weight / 100`.
pub fn contribution(score: f64, weight_percent: f64) -> f64 {
    score * weight_percent / 100.0
}

/// Sum of weighted contributions over graded evaluations.
///
/// Pending evaluations add nothing, and the sum is NOT divided by the graded
/// weight: a subject with only 40% graded tops out at 40% of the scale.
pub fn subject_average(
    subject_id: &str,
    subject_name: &str,
    grades: &[NormalizedGrade],
) -> SubjectAverage {
    let mut average = 0.0_f64;
    let mut graded_weight = 0.0_f64;
    let mut graded_count: usize = 0;
    let mut pending_count: usize = 0;

    for g in grades {
        match g.score {
            Score::Pending => {
                pending_count += 1;
            }
            Score::Graded(v) => {
                graded_count += 1;
                graded_weight += g.weight_percent;
                average += contribution(v, g.weight_percent);
            }
        }
    }

    SubjectAverage {
        subject_id: subject_id.to_string(),
        subject_name: subject_name.to_string(),
        average,
        graded_weight,
        graded_count,
        pending_count,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GradeStanding {
    Approved,
    Failed,
}

pub fn grade_standing(score: f64, scale: &GradeScale) -> GradeStanding {
    if score >= scale.passing {
        GradeStanding::Approved
    } else {
        GradeStanding::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceBand {
    High,
    Passing,
    AtRisk,
}

pub fn performance_band(average: f64, scale: &GradeScale) -> PerformanceBand {
    if average >= scale.high {
        PerformanceBand::High
    } else if average >= scale.passing {
        PerformanceBand::Passing
    } else {
        PerformanceBand::AtRisk
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightCoverage {
    pub assigned: f64,
    pub graded: f64,
    /// Weight still unassigned; negative when evaluations exceed 100.
    pub remaining: f64,
}

pub fn weight_coverage(evaluations: &[Evaluation]) -> WeightCoverage {
    let assigned: f64 = evaluations.iter().map(|e| e.weight).sum();
    let graded: f64 = evaluations
        .iter()
        .filter(|e| e.state == EvaluationState::Graded)
        .map(|e| e.weight)
        .sum();
    WeightCoverage {
        assigned,
        graded,
        remaining: 100.0 - assigned,
    }
}

fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStats {
    pub evaluation_id: String,
    pub name: String,
    pub weight: f64,
    pub graded_count: usize,
    pub pending_count: usize,
    pub approved_count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Class-level statistics for one evaluation. `roster_size` is the number of
/// students expected to receive a grade.
pub fn evaluation_stats(
    evaluation: &Evaluation,
    grades: &[Grade],
    roster_size: usize,
    scale: &GradeScale,
) -> EvaluationStats {
    let values: Vec<f64> = grades
        .iter()
        .filter(|g| g.evaluation_id == evaluation.id)
        .map(|g| g.score)
        .collect();

    let graded_count = values.len();
    let mean = if graded_count > 0 {
        values.iter().sum::<f64>() / graded_count as f64
    } else {
        0.0
    };
    let approved_count = values
        .iter()
        .filter(|v| grade_standing(**v, scale) == GradeStanding::Approved)
        .count();

    EvaluationStats {
        evaluation_id: evaluation.id.clone(),
        name: evaluation.name.clone(),
        weight: evaluation.weight,
        graded_count,
        pending_count: roster_size.saturating_sub(graded_count),
        approved_count,
        mean,
        median: compute_median(&values),
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAverage {
    pub student_id: String,
    pub average: f64,
    pub graded_count: usize,
    pub pending_count: usize,
}

/// Subject average for every rostered student, in roster order.
pub fn roster_averages(
    evaluations: &[Evaluation],
    grades: &[Grade],
    roster: &[RosterEntry],
) -> Vec<StudentAverage> {
    let mut score_by_pair: HashMap<(&str, &str), f64> = HashMap::new();
    for g in grades {
        score_by_pair.insert((g.evaluation_id.as_str(), g.student_id.as_str()), g.score);
    }

    roster
        .iter()
        .map(|student| {
            let per_eval: Vec<NormalizedGrade> = evaluations
                .iter()
                .map(|e| NormalizedGrade {
                    evaluation_id: e.id.clone(),
                    weight_percent: e.weight,
                    score: score_by_pair
                        .get(&(e.id.as_str(), student.student_id.as_str()))
                        .copied()
                        .into(),
                })
                .collect();
            let avg = subject_average("", "", &per_eval);
            StudentAverage {
                student_id: student.student_id.clone(),
                average: avg.average,
                graded_count: avg.graded_count,
                pending_count: avg.pending_count,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ng(id: &str, weight: f64, score: Option<f64>) -> NormalizedGrade {
        NormalizedGrade {
            evaluation_id: id.to_string(),
            weight_percent: weight,
            score: score.into(),
        }
    }

    fn eval(id: &str, weight: f64, state: EvaluationState) -> Evaluation {
        Evaluation {
            id: id.to_string(),
            subject_id: "m1".to_string(),
            name: format!("Eval {}", id),
            description: String::new(),
            date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            weight,
            state,
        }
    }

    fn grade(eval_id: &str, student: &str, score: f64) -> Grade {
        Grade {
            evaluation_id: eval_id.to_string(),
            student_id: student.to_string(),
            score,
            graded_at: None,
        }
    }

    #[test]
    fn round_to_handles_halves() {
        assert_eq!(round_to(3.16666, 2), 3.17);
        assert_eq!(round_to(2.45, 1), 2.5);
        assert_eq!(round_to(0.0, 2), 0.0);
    }

    #[test]
    fn partial_weight_is_not_renormalised() {
        let avg = subject_average("m1", "Cálculo", &[ng("a", 60.0, Some(4.0)), ng("b", 40.0, None)]);
        assert!((avg.average - 2.4).abs() < 1e-12);
        assert_eq!(avg.graded_count, 1);
        assert_eq!(avg.pending_count, 1);
        assert_eq!(avg.graded_weight, 60.0);
    }

    #[test]
    fn no_graded_evaluations_average_zero() {
        let avg = subject_average("m1", "Física", &[ng("a", 50.0, None)]);
        assert_eq!(avg.average, 0.0);
        let empty = subject_average("m1", "Física", &[]);
        assert_eq!(empty.average, 0.0);
        assert!(!empty.average.is_nan());
    }

    #[test]
    fn full_weight_reaches_scale() {
        let avg = subject_average(
            "m1",
            "Química",
            &[ng("a", 30.0, Some(5.0)), ng("b", 30.0, Some(5.0)), ng("c", 40.0, Some(5.0))],
        );
        assert!((avg.average - 5.0).abs() < 1e-12);
    }

    #[test]
    fn standing_and_band_follow_scale() {
        let scale = GradeScale::default();
        assert_eq!(grade_standing(3.0, &scale), GradeStanding::Approved);
        assert_eq!(grade_standing(2.9, &scale), GradeStanding::Failed);
        assert_eq!(performance_band(4.0, &scale), PerformanceBand::High);
        assert_eq!(performance_band(3.5, &scale), PerformanceBand::Passing);
        assert_eq!(performance_band(1.0, &scale), PerformanceBand::AtRisk);
    }

    #[test]
    fn coverage_reports_remaining_weight() {
        let cov = weight_coverage(&[
            eval("a", 30.0, EvaluationState::Graded),
            eval("b", 30.0, EvaluationState::Pending),
        ]);
        assert_eq!(cov.assigned, 60.0);
        assert_eq!(cov.graded, 30.0);
        assert_eq!(cov.remaining, 40.0);
    }

    #[test]
    fn evaluation_stats_counts_pending_against_roster() {
        let e = eval("a", 30.0, EvaluationState::Graded);
        let grades = vec![grade("a", "s1", 2.0), grade("a", "s2", 4.0), grade("b", "s1", 1.0)];
        let stats = evaluation_stats(&e, &grades, 4, &GradeScale::default());
        assert_eq!(stats.graded_count, 2);
        assert_eq!(stats.pending_count, 2);
        assert_eq!(stats.approved_count, 1);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.min, Some(2.0));
        assert_eq!(stats.max, Some(4.0));
    }

    #[test]
    fn roster_averages_use_weighted_sum() {
        let evals = vec![
            eval("a", 50.0, EvaluationState::Graded),
            eval("b", 50.0, EvaluationState::Pending),
        ];
        let grades = vec![grade("a", "s1", 4.0)];
        let roster = vec![RosterEntry::active("s1"), RosterEntry::active("s2")];
        let out = roster_averages(&evals, &grades, &roster);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].average, 2.0);
        assert_eq!(out[0].graded_count, 1);
        assert_eq!(out[1].average, 0.0);
        assert_eq!(out[1].pending_count, 2);
    }
}
