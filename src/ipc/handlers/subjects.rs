use serde_json::json;

use crate::calc::{
    evaluation_stats, performance_band, roster_averages, round_to, subject_average,
    weight_coverage,
};
use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{effective_config, optional, required, required_str};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle::SubjectBook;
use crate::model::{EnrollmentStatus, RawGradeRecord};
use crate::normalize::normalize_records;

fn handle_subjects_average(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_id = match required_str(req, "subjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_name = req
        .params
        .get("subjectName")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let records: Vec<RawGradeRecord> = match required(req, "records") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let strict = match optional::<bool>(req, "strict") {
        Ok(v) => v.unwrap_or(false),
        Err(e) => return e,
    };

    let batch = normalize_records(&records, &config.scale);
    if strict {
        if let Err(e) = batch.clone().into_result() {
            return engine_err(&req.id, &e);
        }
    }

    let mut avg = subject_average(&subject_id, &subject_name, &batch.valid);
    let band = performance_band(avg.average, &config.scale);
    avg.average = round_to(avg.average, config.display_decimals);
    ok(
        &req.id,
        json!({
            "average": avg,
            "band": band,
            "rejected": batch.rejected,
        }),
    )
}

fn handle_subjects_roster_averages(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let book: SubjectBook = match required(req, "book") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = book.validate(&config.scale) {
        return engine_err(&req.id, &e);
    }

    let active: Vec<_> = book
        .roster
        .iter()
        .filter(|r| r.status == EnrollmentStatus::Active)
        .cloned()
        .collect();
    let students: Vec<serde_json::Value> = roster_averages(&book.evaluations, &book.grades, &active)
        .into_iter()
        .map(|s| {
            json!({
                "studentId": s.student_id,
                "average": round_to(s.average, config.display_decimals),
                "band": performance_band(s.average, &config.scale),
                "gradedCount": s.graded_count,
                "pendingCount": s.pending_count,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "subjectId": book.subject_id,
            "students": students,
        }),
    )
}

fn handle_evaluations_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let book: SubjectBook = match required(req, "book") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = book.validate(&config.scale) {
        return engine_err(&req.id, &e);
    }

    let roster_size = book
        .roster
        .iter()
        .filter(|r| r.status == EnrollmentStatus::Active)
        .count();
    let evaluations: Vec<_> = book
        .evaluations
        .iter()
        .map(|e| {
            let mut s = evaluation_stats(e, &book.grades, roster_size, &config.scale);
            s.mean = round_to(s.mean, config.display_decimals);
            s.median = round_to(s.median, config.display_decimals);
            s
        })
        .collect();

    ok(
        &req.id,
        json!({
            "subjectId": book.subject_id,
            "coverage": weight_coverage(&book.evaluations),
            "evaluations": evaluations,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.average" => Some(handle_subjects_average(state, req)),
        "subjects.rosterAverages" => Some(handle_subjects_roster_averages(state, req)),
        "evaluations.stats" => Some(handle_evaluations_stats(state, req)),
        _ => None,
    }
}
