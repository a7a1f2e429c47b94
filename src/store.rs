// Rubemacro — Macro store (file-based step list persistence)

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the step whose response yields the session identifier.
pub const NEW_SESSION_STEP: &str = "NEW_SESSION";

/// Placeholder token substituted with the session id in step args.
pub const SESSION_TOKEN: &str = "$SID";

/// One HTTP call template. `args` is a JSON-encoded object kept as a raw
/// string so the session placeholder can be substituted before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub path: String,
    pub args: String,
}

/// An ordered list of steps. Execution order is definition order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Macro {
    pub steps: Vec<Step>,
}

/// On-disk shapes accepted for the macro document. The wrapped object form
/// is canonical; the bare array is the legacy variant and is normalized on
/// read. Re-saving a legacy file in wrapped form is the migration path.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MacroDocument {
    Wrapped { steps: Vec<Step> },
    Bare(Vec<Step>),
}

impl From<MacroDocument> for Macro {
    fn from(doc: MacroDocument) -> Self {
        match doc {
            MacroDocument::Wrapped { steps } => Macro { steps },
            MacroDocument::Bare(steps) => Macro { steps },
        }
    }
}

impl Macro {
    /// The built-in two-step default: create a session, then check the
    /// account's active connections with it.
    pub fn default_macro() -> Self {
        Macro {
            steps: vec![
                Step {
                    name: NEW_SESSION_STEP.to_string(),
                    path: "/api/v1/session".to_string(),
                    args: "{}".to_string(),
                },
                Step {
                    name: "CHECK_ACTIVE_CONNECTION".to_string(),
                    path: "/api/v1/connections/check".to_string(),
                    args: r#"{"session_id": "$SID"}"#.to_string(),
                },
            ],
        }
    }
}

/// Load the macro document at `path`, or seed it with the default macro.
///
/// An existing document is parsed exactly as stored and never rewritten.
/// When the file is absent the default macro is written (pretty-printed,
/// raw UTF-8) before being returned, so a second run reuses the same
/// definition.
pub fn load_or_create(path: &Path) -> Result<Macro, DocumentError> {
    if path.exists() {
        let contents = std::fs::read_to_string(path)?;
        let doc: MacroDocument = serde_json::from_str(&contents)?;
        let mac = Macro::from(doc);
        tracing::debug!(path = %path.display(), steps = mac.steps.len(), "Loaded macro document");
        return Ok(mac);
    }

    let mac = Macro::default_macro();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(&mac)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "Seeded default macro document");
    Ok(mac)
}
