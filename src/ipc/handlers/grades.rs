use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{effective_config, required, required_str};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle::{SubjectBook, Viewer};
use crate::model::RawGradeRecord;
use crate::normalize::normalize_records;

fn handle_grades_normalize(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let records: Vec<RawGradeRecord> = match required(req, "records") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let batch = normalize_records(&records, &config.scale);
    ok(
        &req.id,
        json!({
            "clean": batch.is_clean(),
            "valid": batch.valid,
            "rejected": batch.rejected,
        }),
    )
}

fn handle_grades_mine(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let book: SubjectBook = match required(req, "book") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let grades = book.grades_for(&Viewer { student_id });
    ok(&req.id, json!({ "grades": grades }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.normalize" => Some(handle_grades_normalize(state, req)),
        "grades.mine" => Some(handle_grades_mine(state, req)),
        _ => None,
    }
}
