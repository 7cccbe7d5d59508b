use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;

use crate::config::EngineConfig;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Deserialize `params[key]` into `T`.
pub fn required<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, serde_json::Value> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid {}: {}", key, e),
            None,
        )
    })
}

pub fn optional<T: DeserializeOwned>(req: &Request, key: &str) -> Result<Option<T>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(_) => required(req, key).map(Some),
    }
}

/// Loaded config with an optional per-request `config` override applied.
pub fn effective_config(state: &AppState, req: &Request) -> Result<EngineConfig, serde_json::Value> {
    match req.params.get("config") {
        None => Ok(state.config.clone()),
        Some(v) if v.is_null() => Ok(state.config.clone()),
        Some(v) if v.is_object() => state
            .config
            .with_overrides(v)
            .map_err(|e| err(&req.id, "bad_params", e.to_string(), None)),
        Some(_) => Err(err(&req.id, "bad_params", "config must be an object", None)),
    }
}

pub fn today(req: &Request) -> Result<NaiveDate, serde_json::Value> {
    Ok(optional::<NaiveDate>(req, "today")?.unwrap_or_else(|| Utc::now().date_naive()))
}
