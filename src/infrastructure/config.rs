use crate::infrastructure::error::JournalError;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const ANON_KEY_ENV: &str = "ORATIO_ANON_KEY";
const MENTOR_API_KEY_ENV: &str = "ORATIO_MENTOR_API_KEY";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:54321";
const DEFAULT_TIMEZONE: &str = "UTC";
const DEFAULT_MENTOR_MODEL: &str = "gemini-2.5-flash";

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([(
        APP_JSON,
        serde_json::json!({
            "schema": 1,
            "appName": "Oratio",
            "apiBaseUrl": DEFAULT_API_BASE_URL,
            "anonKey": null,
            "timezone": DEFAULT_TIMEZONE,
            "mentorModel": DEFAULT_MENTOR_MODEL
        }),
    )])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), JournalError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, JournalError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            JournalError::InvalidConfig(format!("missing schema in {}", path.display()))
        })?;
    if schema != 1 {
        return Err(JournalError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn read_app_string(config_dir: &Path, key: &str) -> Result<Option<String>, JournalError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

pub fn read_api_base_url(config_dir: &Path) -> Result<String, JournalError> {
    Ok(read_app_string(config_dir, "apiBaseUrl")?.unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()))
}

pub fn read_mentor_model(config_dir: &Path) -> Result<String, JournalError> {
    Ok(read_app_string(config_dir, "mentorModel")?.unwrap_or_else(|| DEFAULT_MENTOR_MODEL.to_string()))
}

pub fn resolve_timezone(config_dir: &Path) -> Result<Tz, JournalError> {
    let name = read_app_string(config_dir, "timezone")?.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    name.parse::<Tz>().map_err(|error| {
        JournalError::InvalidConfig(format!("invalid timezone '{name}': {error}"))
    })
}

pub fn resolve_anon_key(config_dir: &Path) -> Result<String, JournalError> {
    if let Some(key) = read_app_string(config_dir, "anonKey")? {
        return Ok(key);
    }
    env::var(ANON_KEY_ENV).map_err(|_| {
        JournalError::InvalidConfig(format!(
            "anonKey missing from {APP_JSON} and {ANON_KEY_ENV} is unset"
        ))
    })
}

pub fn resolve_mentor_api_key() -> Option<String> {
    env::var(MENTOR_API_KEY_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
