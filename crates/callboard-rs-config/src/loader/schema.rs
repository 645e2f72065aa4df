//! Schema validation for `callboard.json5` layers.
//!
//! Layers are partial, so only the shape of keys that are present is checked;
//! cross-field invariants are enforced on the merged config.

use crate::ConfigError;
use serde_json::{Map, Value};

/// Validate a single config layer against the schema.
pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(map, &["$schema", "source", "sync", "dashboard"], layer, "")?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("source") {
        validate_source(value, layer, "source")?;
    }
    if let Some(value) = map.get("sync") {
        validate_sync(value, layer, "sync")?;
    }
    if let Some(value) = map.get("dashboard") {
        validate_dashboard(value, layer, "dashboard")?;
    }
    Ok(())
}

/// Validate the "source" block.
fn validate_source(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "url",
            "api_key",
            "api_key_env",
            "schema",
            "table",
            "order_column",
            "request_timeout_secs",
            "heartbeat_secs",
            "subscribe_timeout_secs",
        ],
        layer,
        path,
    )?;
    for key in ["url", "api_key", "api_key_env", "schema", "table", "order_column"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("request_timeout_secs")
        && !value.is_null()
    {
        expect_u64(value, layer, &join_path(path, "request_timeout_secs"))?;
    }
    for key in ["heartbeat_secs", "subscribe_timeout_secs"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

/// Validate the "sync" block.
fn validate_sync(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["policy", "queue_capacity"], layer, path)?;
    if let Some(value) = map.get("policy") {
        expect_enum(
            value,
            &["refetch", "incremental"],
            layer,
            &join_path(path, "policy"),
        )?;
    }
    if let Some(value) = map.get("queue_capacity") {
        expect_u64(value, layer, &join_path(path, "queue_capacity"))?;
    }
    Ok(())
}

/// Validate the "dashboard" block.
fn validate_dashboard(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["initial_route", "tick_ms"], layer, path)?;
    if let Some(value) = map.get("initial_route") {
        expect_string(value, layer, &join_path(path, "initial_route"))?;
    }
    if let Some(value) = map.get("tick_ms") {
        expect_u64(value, layer, &join_path(path, "tick_ms"))?;
    }
    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(layer, path, "expected object"))
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_string() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected string"))
    }
}

fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn expect_enum(value: &Value, allowed: &[&str], layer: &str, path: &str) -> Result<(), ConfigError> {
    match value.as_str() {
        Some(label) if allowed.contains(&label) => Ok(()),
        _ => Err(invalid_field(
            layer,
            path,
            &format!("expected one of {}", allowed.join(", ")),
        )),
    }
}

/// Ensure an object contains only allowed keys.
fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
