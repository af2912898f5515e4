//! Validation and dispatch of inbound native messages.
//!
//! Every message is answered. A malformed request never reaches the
//! controller; it becomes an `error` reply naming what was wrong.

use serde_json::{Map, Value};
use thiserror::Error;

use punchlight_core::{DeviceReply, Hsv};

use crate::controller::PunchLightController;
use crate::device::LightBackend;

/// Sorted, as listed in the error text.
pub const ALLOWED_ACTIONS: [&str; 4] = ["discover", "set_color", "turn_off", "update_light"];

pub const HUE_RANGE: (f64, f64) = (0.0, 360.0);
pub const PERCENT_RANGE: (f64, f64) = (0.0, 100.0);

/// `set_color` components a message leaves out.
const DEFAULT_COLOR: (f64, f64, f64) = (0.0, 100.0, 100.0);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Invalid message format: must be a JSON object")]
    NotAnObject,

    #[error("Missing 'action' field in message")]
    MissingAction,

    #[error("Invalid action: '{0}'. Allowed actions: discover, set_color, turn_off, update_light")]
    UnknownAction(String),

    #[error("Invalid hasIssues value: must be boolean, got {0}")]
    InvalidHasIssues(&'static str),

    #[error("HSV values must be numeric: {field} is {found}")]
    NotNumeric { field: &'static str, found: String },

    #[error("Invalid {field}: {value} (must be {min}-{max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// A request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightRequest {
    UpdateLight { has_issues: bool },
    SetColor(Hsv),
    TurnOff,
    Discover,
}

impl LightRequest {
    pub fn action(&self) -> &'static str {
        match self {
            LightRequest::UpdateLight { .. } => "update_light",
            LightRequest::SetColor(_) => "set_color",
            LightRequest::TurnOff => "turn_off",
            LightRequest::Discover => "discover",
        }
    }
}

pub fn parse_request(message: &Value) -> Result<LightRequest, RequestError> {
    let object = message.as_object().ok_or(RequestError::NotAnObject)?;
    let action = match object.get("action") {
        None => return Err(RequestError::MissingAction),
        Some(value) if is_blank(value) => return Err(RequestError::MissingAction),
        Some(Value::String(action)) => action.as_str(),
        Some(other) => return Err(RequestError::UnknownAction(other.to_string())),
    };

    match action {
        "update_light" => {
            let has_issues = match object.get("hasIssues") {
                None => false,
                Some(Value::Bool(flag)) => *flag,
                Some(other) => return Err(RequestError::InvalidHasIssues(type_name(other))),
            };
            Ok(LightRequest::UpdateLight { has_issues })
        }
        "set_color" => {
            let hue = number_field(object, "hue", DEFAULT_COLOR.0)?;
            let saturation = number_field(object, "saturation", DEFAULT_COLOR.1)?;
            let value = number_field(object, "value", DEFAULT_COLOR.2)?;
            Ok(LightRequest::SetColor(validate_hsv(hue, saturation, value)?))
        }
        "turn_off" => Ok(LightRequest::TurnOff),
        "discover" => Ok(LightRequest::Discover),
        other => Err(RequestError::UnknownAction(other.to_string())),
    }
}

/// Range-check HSV components and truncate them to whole numbers.
pub fn validate_hsv(hue: f64, saturation: f64, value: f64) -> Result<Hsv, RequestError> {
    check_range("hue", hue, HUE_RANGE)?;
    check_range("saturation", saturation, PERCENT_RANGE)?;
    check_range("value", value, PERCENT_RANGE)?;
    Ok(Hsv::new(hue as u16, saturation as u8, value as u8))
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), RequestError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(RequestError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// `null`, `false`, zero and empty strings, arrays or objects.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Numbers, numeric strings and booleans (as 1 or 0) are accepted; anything
/// else is rejected.
fn number_field(object: &Map<String, Value>, field: &'static str, default: f64) -> Result<f64, RequestError> {
    let not_numeric = |found: &Value| RequestError::NotNumeric {
        field,
        found: found.to_string(),
    };
    match object.get(field) {
        None => Ok(default),
        Some(found @ Value::Number(number)) => number.as_f64().ok_or_else(|| not_numeric(found)),
        Some(found @ Value::String(text)) => text.trim().parse().map_err(|_| not_numeric(found)),
        Some(Value::Bool(flag)) => Ok(if *flag { 1.0 } else { 0.0 }),
        Some(found) => Err(not_numeric(found)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate one message and run it against the controller.
pub async fn handle_message<B: LightBackend>(
    controller: &mut PunchLightController<B>,
    message: &Value,
) -> DeviceReply {
    let request = match parse_request(message) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "rejected native message");
            return DeviceReply::error(err.to_string());
        }
    };

    let result = match request {
        LightRequest::UpdateLight { has_issues } => controller.update_light(has_issues).await,
        LightRequest::SetColor(color) => controller.set_color(color).await,
        LightRequest::TurnOff => controller.turn_off().await,
        LightRequest::Discover => controller.discover().await,
    };

    result.unwrap_or_else(|err| {
        tracing::error!(action = request.action(), error = %err, "action failed");
        DeviceReply::error(format!(
            "Error executing action '{}': {err}",
            request.action()
        ))
    })
}
