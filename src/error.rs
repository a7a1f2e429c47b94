// Rubemacro — Error taxonomy for the macro engine

use thiserror::Error;

/// Failures while reading or seeding the persisted macro document.
/// These occur before any HTTP call is attempted.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read macro document: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("malformed macro document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures while executing a single step. Every variant is fatal to the
/// run: the runner stops at the failing step and executes nothing further.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("substituted args are not valid JSON: {source} (args: {args})")]
    MalformedArgs {
        args: String,
        source: serde_json::Error,
    },
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("response body is not valid JSON: {0}")]
    ResponseParse(#[source] reqwest::Error),
    #[error("session id not found in response")]
    SessionNotFound,
}

/// A run failure with full step context: which step failed, the resolved
/// URL, and the exact arguments that were sent (or attempted).
#[derive(Error, Debug)]
#[error("step '{step}' failed (url: {url}, args: {args}): {source}")]
pub struct RunError {
    pub step: String,
    pub url: String,
    pub args: String,
    #[source]
    pub source: StepError,
}
