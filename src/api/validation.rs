//! Request body checks for the send endpoint.
//!
//! Only the first violation is reported, with Joi-style wording such as
//! `"message" is required`.

use serde_json::{json, Map, Value};

/// Fields accepted by `POST /message/send-text`, in checking order.
const SEND_TEXT_FIELDS: [&str; 2] = ["to", "message"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    pub path: Option<String>,
    pub kind: &'static str,
}

impl ValidationError {
    fn new(path: Option<&str>, kind: &'static str, message: String) -> Self {
        Self {
            message,
            path: path.map(String::from),
            kind,
        }
    }

    pub fn details(&self) -> Value {
        let path: Vec<&str> = self.path.as_deref().into_iter().collect();
        json!([{ "message": self.message, "path": path, "type": self.kind }])
    }
}

/// Validated body of a send-text request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendText {
    pub to: String,
    pub message: String,
}

pub fn send_text(body: &Value) -> Result<SendText, ValidationError> {
    let Some(object) = body.as_object() else {
        return Err(ValidationError::new(
            None,
            "object.base",
            "\"value\" must be of type object".into(),
        ));
    };

    let to = required_string(object, "to")?;
    let message = required_string(object, "message")?;

    if let Some(unknown) = object
        .keys()
        .find(|key| !SEND_TEXT_FIELDS.contains(&key.as_str()))
    {
        return Err(ValidationError::new(
            Some(unknown),
            "object.unknown",
            format!("\"{unknown}\" is not allowed"),
        ));
    }

    Ok(SendText { to, message })
}

fn required_string(object: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    match object.get(field) {
        None => Err(ValidationError::new(
            Some(field),
            "any.required",
            format!("\"{field}\" is required"),
        )),
        Some(Value::String(s)) if s.is_empty() => Err(ValidationError::new(
            Some(field),
            "string.empty",
            format!("\"{field}\" is not allowed to be empty"),
        )),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::new(
            Some(field),
            "string.base",
            format!("\"{field}\" must be a string"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_complete_body() {
        let body = json!({ "to": "123", "message": "hi" });
        assert_eq!(
            send_text(&body).unwrap(),
            SendText {
                to: "123".into(),
                message: "hi".into(),
            }
        );
    }

    #[test]
    fn test_reports_first_violation_only() {
        let err = send_text(&json!({ "extra": true })).unwrap_err();
        assert_eq!(err.message, "\"to\" is required");
        assert_eq!(err.kind, "any.required");

        let err = send_text(&json!({ "to": "123" })).unwrap_err();
        assert_eq!(err.message, "\"message\" is required");
        assert_eq!(
            err.details(),
            json!([{ "message": "\"message\" is required", "path": ["message"], "type": "any.required" }])
        );
    }

    #[test]
    fn test_rejects_wrong_types_and_empty_strings() {
        let err = send_text(&json!({ "to": 123, "message": "hi" })).unwrap_err();
        assert_eq!(err.message, "\"to\" must be a string");

        let err = send_text(&json!({ "to": "123", "message": "" })).unwrap_err();
        assert_eq!(err.message, "\"message\" is not allowed to be empty");

        let err = send_text(&json!(["to", "message"])).unwrap_err();
        assert_eq!(err.message, "\"value\" must be of type object");
        assert_eq!(err.details()[0]["path"], json!([]));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = send_text(&json!({ "to": "1", "message": "m", "cc": "2" })).unwrap_err();
        assert_eq!(err.message, "\"cc\" is not allowed");
        assert_eq!(err.kind, "object.unknown");
    }
}
