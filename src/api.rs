//! Framework-neutral JSON adapter over [`ColorizerService`].
//!
//! A request is a JSON object with an `op` field plus that operation's
//! arguments. Every reply is a status code and a JSON body carrying
//! `"success"`; failures add an `"error"` message.
//!
//! [`dispatch`] treats every request as untrusted. The `path` upload field,
//! which reads a file on this machine, is only honoured through
//! [`dispatch_local`] and [`dispatch_local_str`].

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::{ColorizeError, Result};
use crate::render;
use crate::service::ColorizerService;

/// Status and JSON body for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(err: &ColorizeError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "success": false, "error": err.to_string() }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.body.get("success").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Who sent a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Remote,
    Local,
}

/// Parse one raw request and run it.
pub fn dispatch_str(service: &ColorizerService, raw: &str) -> ApiReply {
    run_str(service, raw, Origin::Remote)
}

/// Run one request against the service.
pub fn dispatch(service: &ColorizerService, request: &Value) -> ApiReply {
    run(service, request, Origin::Remote)
}

/// [`dispatch_str`] for a caller on this machine, which may upload by `path`.
pub fn dispatch_local_str(service: &ColorizerService, raw: &str) -> ApiReply {
    run_str(service, raw, Origin::Local)
}

/// [`dispatch`] for a caller on this machine, which may upload by `path`.
pub fn dispatch_local(service: &ColorizerService, request: &Value) -> ApiReply {
    run(service, request, Origin::Local)
}

fn run_str(service: &ColorizerService, raw: &str, origin: Origin) -> ApiReply {
    match serde_json::from_str::<Value>(raw) {
        Ok(request) => run(service, &request, origin),
        Err(_) => ApiReply::error(&ColorizeError::input("Invalid JSON data")),
    }
}

fn run(service: &ColorizerService, request: &Value, origin: Origin) -> ApiReply {
    match handle(service, request, origin) {
        Ok(body) => ApiReply::ok(body),
        Err(e) => ApiReply::error(&e),
    }
}

fn handle(service: &ColorizerService, request: &Value, origin: Origin) -> Result<Value> {
    let request = request
        .as_object()
        .ok_or_else(|| ColorizeError::input("Invalid JSON data"))?;

    match required_str(request, "op")? {
        "create" => {
            let bytes = upload_bytes(request, origin)?;
            success(service.create_session(&bytes)?)
        }
        "recolor" => {
            let session_id = required_str(request, "session_id")?;
            let x = required_coord(request, "x")?;
            let y = required_coord(request, "y")?;
            let color = required_str(request, "color")?;
            success(service.recolor(session_id, x, y, color)?)
        }
        "reset" => success(service.reset(required_str(request, "session_id")?)?),
        "current" => success(service.current_image(required_str(request, "session_id")?)?),
        "undo" => success(service.undo(required_str(request, "session_id")?)?),
        "redo" => success(service.redo(required_str(request, "session_id")?)?),
        "persist" => {
            let session_id = required_str(request, "session_id")?;
            let filename = optional_str(request, "filename")?;
            success(service.persist(session_id, filename)?)
        }
        "destroy" => {
            let removed = service.destroy(required_str(request, "session_id")?);
            Ok(json!({ "success": removed }))
        }
        "sessions" => Ok(json!({
            "success": true,
            "active_sessions": service.active_sessions(),
        })),
        other => Err(ColorizeError::Input {
            message: format!("Unknown op: {}", other),
            help: Some(
                "Expected one of create, recolor, reset, current, persist, destroy, undo, \
                 redo, sessions"
                    .to_string(),
            ),
        }),
    }
}

/// Serialize a reply struct and mark it successful.
fn success<T: Serialize>(reply: T) -> Result<Value> {
    let mut body = serde_json::to_value(reply).map_err(|e| ColorizeError::Encode {
        message: e.to_string(),
    })?;
    if let Value::Object(map) = &mut body {
        map.insert("success".to_string(), Value::Bool(true));
    }
    Ok(body)
}

fn missing(field: &str) -> ColorizeError {
    ColorizeError::input(format!("Missing required field: {}", field))
}

fn required_str<'a>(request: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    optional_str(request, field)?.ok_or_else(|| missing(field))
}

fn optional_str<'a>(request: &'a Map<String, Value>, field: &str) -> Result<Option<&'a str>> {
    match request.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(ColorizeError::input(format!("Field {} must be a string", field))),
    }
}

/// A pixel coordinate given as an integer, an integral float or a numeric string.
fn required_coord(request: &Map<String, Value>, field: &str) -> Result<i64> {
    let invalid =
        || ColorizeError::input(format!("Invalid coordinate {}: expected an integer", field));

    match request.get(field) {
        None | Some(Value::Null) => Err(missing(field)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(v) => Ok(v),
            None => n.as_f64().and_then(integral).ok_or_else(invalid),
        },
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .ok_or_else(invalid)
        }
        Some(_) => Err(invalid()),
    }
}

fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Image bytes for `create`: `image` (data URL or base64), or a `path` on
/// this machine for local callers.
fn upload_bytes(request: &Map<String, Value>, origin: Origin) -> Result<Vec<u8>> {
    if let Some(image) = optional_str(request, "image")? {
        return render::from_base64(image);
    }
    if let Some(path) = optional_str(request, "path")? {
        if origin != Origin::Local {
            return Err(ColorizeError::Input {
                message: "Field path is not accepted here".to_string(),
                help: Some("Send the image itself in the image field".to_string()),
            });
        }
        return std::fs::read(path).map_err(|e| ColorizeError::Io {
            path: path.into(),
            message: format!("Failed to read image: {}", e),
        });
    }
    Err(missing("image"))
}
