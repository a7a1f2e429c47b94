// Rubemacro — Session id extraction from step responses

use crate::error::StepError;
use crate::store::NEW_SESSION_STEP;
use serde_json::Value;

/// Lookup paths tried in order against the session step's response body.
/// The API has shipped the session object at several nesting depths; the
/// first path yielding a non-empty id wins. Absent intermediate segments
/// are treated as empty objects, not errors.
const SESSION_ID_PATHS: &[&[&str]] = &[
    &["data", "data", "session", "id"],
    &["data", "session", "id"],
    &["session", "id"],
];

fn lookup<'a>(body: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut node = body;
    for segment in path {
        node = node.get(segment)?;
    }
    node.as_str().filter(|s| !s.is_empty())
}

/// Update the session state after a step completes.
///
/// For the session-creating step, searches the response body along
/// `SESSION_ID_PATHS` and fails with `SessionNotFound` when no id is
/// present, since every later step depends on it. Any other step passes
/// the current session through unchanged.
pub fn extract(
    step_name: &str,
    body: &Value,
    current: Option<String>,
) -> Result<Option<String>, StepError> {
    if step_name != NEW_SESSION_STEP {
        return Ok(current);
    }

    for path in SESSION_ID_PATHS {
        if let Some(id) = lookup(body, path) {
            tracing::debug!(path = path.join("."), "Extracted session id");
            return Ok(Some(id.to_string()));
        }
    }

    Err(StepError::SessionNotFound)
}
