use serde_json::json;

use crate::calc::round_to;
use crate::config::EngineConfig;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{effective_config, optional, today};
use crate::ipc::types::{AppState, Request};
use crate::model::{AcademicHistory, AcademicSummary};
use crate::summary::{build_history, build_summary, SummaryInput};
use crate::term::Term;

fn summary_input(req: &Request) -> Result<SummaryInput, serde_json::Value> {
    let mut params = req.params.clone();
    let Some(obj) = params.as_object_mut() else {
        return Err(err(&req.id, "bad_params", "params must be an object", None));
    };
    if obj.get("today").map(|v| v.is_null()).unwrap_or(true) {
        obj.insert("today".into(), json!(today(req)?));
    }
    obj.remove("config");
    serde_json::from_value(params)
        .map_err(|e| err(&req.id, "bad_params", format!("invalid summary input: {}", e), None))
}

fn round_summary(mut s: AcademicSummary, config: &EngineConfig) -> AcademicSummary {
    let places = config.display_decimals;
    s.cumulative_average = round_to(s.cumulative_average, places);
    for subject in s.best_subject.iter_mut().chain(s.worst_subject.iter_mut()) {
        subject.average = round_to(subject.average, places);
    }
    s.semester_progress = round_to(s.semester_progress, config.progress_decimals);
    s
}

fn round_history(mut h: AcademicHistory, config: &EngineConfig) -> AcademicHistory {
    let places = config.display_decimals;
    h.general_average = round_to(h.general_average, places);
    for row in &mut h.subjects {
        row.average = round_to(row.average, places);
    }
    h
}

fn handle_students_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = match summary_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let summary = round_summary(build_summary(&input, &config), &config);
    if !summary.issues.is_empty() {
        tracing::warn!(issues = summary.issues.len(), "summary built with skipped records");
    }
    ok(&req.id, json!(summary))
}

fn handle_students_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input = match summary_input(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    ok(&req.id, json!(round_history(build_history(&input, &config), &config)))
}

fn handle_term_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let config = match effective_config(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let today = match today(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match optional::<Term>(req, "term") {
        Ok(Some(t)) => t,
        Ok(None) => match Term::containing(today, &config.calendar) {
            Some(t) => t,
            None => return err(&req.id, "bad_params", "could not resolve term for date", None),
        },
        Err(e) => return e,
    };

    ok(
        &req.id,
        json!({
            "term": term,
            "today": today,
            "progress": round_to(term.progress(today), config.progress_decimals),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.summary" => Some(handle_students_summary(state, req)),
        "students.history" => Some(handle_students_history(state, req)),
        "term.progress" => Some(handle_term_progress(state, req)),
        _ => None,
    }
}
