use chrono::{NaiveDateTime, Utc};
use serde_json::json;

use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{effective_config, optional, required, required_str};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle::{EvaluationDraft, EvaluationPatch, GradeEntry, Grader, SubjectBook};

/// Every mutating call carries the subject snapshot and the acting professor.
fn book_and_grader(req: &Request) -> Result<(SubjectBook, Grader), serde_json::Value> {
    let book: SubjectBook = required(req, "book")?;
    let professor_id = required_str(req, "professorId")?;
    Ok((book, Grader { professor_id }))
}

fn handle_evaluations_create(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let (mut book, grader) = match book_and_grader(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let draft: EvaluationDraft = match required(req, "evaluation") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match book.create_evaluation(&grader, draft) {
        Ok(evaluation) => ok(&req.id, json!({ "evaluation": evaluation, "book": book })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_evaluations_update(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let (mut book, grader) = match book_and_grader(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let evaluation_id = match required_str(req, "evaluationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let patch: EvaluationPatch = match required(req, "patch") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match book.update_evaluation(&grader, &evaluation_id, patch) {
        Ok(evaluation) => ok(&req.id, json!({ "evaluation": evaluation, "book": book })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_evaluations_delete(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let (mut book, grader) = match book_and_grader(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let evaluation_id = match required_str(req, "evaluationId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match book.delete_evaluation(&grader, &evaluation_id) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted, "book": book })),
        Err(e) => engine_err(&req.id, &e),
    }
}

fn handle_evaluations_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (mut book, grader) = match book_and_grader(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let evaluation_id = match required_str(req, "evaluationId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entries: Vec<GradeEntry> = match required(req, "grades") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let graded_at = match optional::<NaiveDateTime>(req, "gradedAt") {
        Ok(v) => v.unwrap_or_else(|| Utc::now().naive_utc()),
        Err(e) => return e,
    };

    match book.submit_grades(&grader, &evaluation_id, &entries, &config.scale, Some(graded_at)) {
        Ok(outcome) => ok(&req.id, json!({ "outcome": outcome, "book": book })),
        Err(e) => engine_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "evaluations.create" => Some(handle_evaluations_create(state, req)),
        "evaluations.update" => Some(handle_evaluations_update(state, req)),
        "evaluations.delete" => Some(handle_evaluations_delete(state, req)),
        "evaluations.grade" => Some(handle_evaluations_grade(state, req)),
        _ => None,
    }
}
