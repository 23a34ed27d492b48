//! GCP long-running operations
//!
//! GCP APIs report asynchronous work in two shapes: Cloud SQL (and Compute)
//! style `{"status": "DONE", "error": {"errors": [..]}}`, and the
//! google.longrunning style `{"done": true, "error": {"message": ..}}` used by
//! Cloud Functions v2 and Resource Manager v3.

use crate::resource::OperationStatus;
use serde_json::Value;

/// Status of a Cloud SQL Admin operation
pub fn sql_operation_status(operation: &Value) -> OperationStatus {
    let done = operation
        .get("status")
        .and_then(|v| v.as_str())
        .map(|s| s == "DONE")
        .unwrap_or(false);

    if !done {
        return OperationStatus::Running;
    }

    let errors: Vec<String> = operation
        .get("error")
        .and_then(|e| e.get("errors"))
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|e| {
                    let code = e.get("code").and_then(|v| v.as_str()).unwrap_or("-");
                    let message = e.get("message").and_then(|v| v.as_str()).unwrap_or("-");
                    format!("{}: {}", code, message)
                })
                .collect()
        })
        .unwrap_or_default();

    if errors.is_empty() {
        OperationStatus::Done
    } else {
        OperationStatus::Failed(errors.join("; "))
    }
}

/// Status of a google.longrunning operation.
///
/// A `null` body (a 204 from the submitting call) counts as already done.
pub fn lro_status(operation: &Value) -> OperationStatus {
    if operation.is_null() {
        return OperationStatus::Done;
    }

    let done = operation
        .get("done")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    if !done {
        return OperationStatus::Running;
    }

    match operation.get("error") {
        Some(error) => {
            let message = error
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            OperationStatus::Failed(message.to_string())
        }
        None => OperationStatus::Done,
    }
}

/// The `name` of an operation, needed to poll it
pub fn operation_name(operation: &Value) -> Option<&str> {
    operation.get("name").and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sql_operation_states() {
        assert_eq!(
            sql_operation_status(&json!({"name": "op-1", "status": "PENDING"})),
            OperationStatus::Running
        );
        assert_eq!(
            sql_operation_status(&json!({"name": "op-1", "status": "RUNNING"})),
            OperationStatus::Running
        );
        assert_eq!(
            sql_operation_status(&json!({"name": "op-1", "status": "DONE"})),
            OperationStatus::Done
        );
    }

    #[test]
    fn test_sql_operation_error() {
        let op = json!({
            "status": "DONE",
            "error": {"errors": [{"code": "INTERNAL_ERROR", "message": "boom"}]}
        });
        assert_eq!(
            sql_operation_status(&op),
            OperationStatus::Failed("INTERNAL_ERROR: boom".to_string())
        );
    }

    #[test]
    fn test_lro_states() {
        assert_eq!(lro_status(&json!({"name": "operations/x"})), OperationStatus::Running);
        assert_eq!(
            lro_status(&json!({"name": "operations/x", "done": true})),
            OperationStatus::Done
        );
        assert_eq!(
            lro_status(&json!({"done": true, "error": {"code": 9, "message": "still referenced"}})),
            OperationStatus::Failed("still referenced".to_string())
        );
        assert_eq!(lro_status(&Value::Null), OperationStatus::Done);
    }

    #[test]
    fn test_operation_name() {
        assert_eq!(operation_name(&json!({"name": "op-9"})), Some("op-9"));
        assert_eq!(operation_name(&json!({})), None);
    }
}
