// Rubemacro — Variable binder ($SID substitution in step args)

use crate::error::StepError;
use crate::store::SESSION_TOKEN;
use serde_json::Value;

/// Binds the current session state into a step's raw args template and
/// yields the parsed argument object.
///
/// The trait is the seam for the templating scheme: the shipped
/// implementation preserves the historical contract (literal token replace
/// on the raw string, then parse), while a stricter typed substitution can
/// be dropped in without touching the runner.
pub trait ArgBinder: Send + Sync {
    fn bind(&self, args: &str, session: Option<&str>) -> Result<Value, StepError>;
}

/// Literal `$SID` replace-then-parse binder. Every occurrence of the token
/// is replaced with the session id, or with the empty string when no
/// session exists yet. The token is matched literally, not as a regex.
#[derive(Debug, Default)]
pub struct SidTokenBinder;

impl ArgBinder for SidTokenBinder {
    fn bind(&self, args: &str, session: Option<&str>) -> Result<Value, StepError> {
        let bound = args.replace(SESSION_TOKEN, session.unwrap_or(""));
        serde_json::from_str(&bound).map_err(|source| StepError::MalformedArgs {
            args: bound,
            source,
        })
    }
}
