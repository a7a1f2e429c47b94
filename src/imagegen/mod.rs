// Rubemacro — Image-generation side tool (stdio protocol + txt2img)
//
// Speaks a minimal line-delimited JSON protocol on stdin/stdout and
// exposes one capability, txt2img, backed by an AUTOMATIC1111-compatible
// HTTP endpoint. Shares no state with the macro engine.

use crate::config::ImageConfig;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("response body is not valid JSON: {0}")]
    ResponseParse(#[source] reqwest::Error),
    #[error("no images returned from endpoint")]
    NoImages,
    #[error("failed to decode image data: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("failed to save image: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    ListTools,
    CallTool {
        name: String,
        #[serde(default)]
        args: Value,
    },
    Ping,
    Exit,
    Shutdown,
}

// ---------------------------------------------------------------------------
// txt2img
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Txt2ImgParams {
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_name: Option<String>,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f64,
    #[serde(default = "default_seed")]
    pub seed: i64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_steps() -> u32 {
    20
}
fn default_dimension() -> u32 {
    512
}
fn default_cfg_scale() -> f64 {
    7.0
}
fn default_seed() -> i64 {
    -1
}
fn default_batch_size() -> u32 {
    1
}

/// Images may arrive as bare base64 or as a data URI; the payload after
/// the last comma is the base64 body either way.
fn decode_image(b64: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = b64.rsplit(',').next().unwrap_or(b64);
    STANDARD.decode(payload)
}

pub struct ImageTool {
    client: Client,
    config: ImageConfig,
}

impl ImageTool {
    pub fn new(config: ImageConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// Generate images from text and save them as PNG files under the
    /// configured outputs directory. Returns the saved paths in order.
    pub async fn txt2img(&self, params: &Txt2ImgParams) -> Result<Vec<PathBuf>, ImageError> {
        let url = format!(
            "{}/sdapi/v1/txt2img",
            self.config.endpoint.trim_end_matches('/')
        );
        tracing::info!(url = %url, steps = params.steps, "Submitting txt2img job");

        let response = self
            .client
            .post(&url)
            .json(params)
            .send()
            .await
            .map_err(ImageError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "could not read body".to_string());
            return Err(ImageError::HttpStatus { status, body });
        }

        let body: Value = response.json().await.map_err(ImageError::ResponseParse)?;
        let images = body
            .get("images")
            .and_then(|i| i.as_array())
            .filter(|a| !a.is_empty())
            .ok_or(ImageError::NoImages)?;

        let outputs_dir = PathBuf::from(&self.config.outputs_dir);
        std::fs::create_dir_all(&outputs_dir)?;

        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let mut saved = Vec::with_capacity(images.len());
        for (idx, image) in images.iter().enumerate() {
            let b64 = image.as_str().unwrap_or("");
            let bytes = decode_image(b64)?;
            let path = outputs_dir.join(format!("txt2img_{}_{}.png", ts, idx + 1));
            std::fs::write(&path, bytes)?;
            tracing::info!(path = %path.display(), "Saved image");
            saved.push(path);
        }

        Ok(saved)
    }
}

// ---------------------------------------------------------------------------
// Stdio serving loop
// ---------------------------------------------------------------------------

fn tool_manifest() -> Value {
    json!({
        "type": "ready",
        "tools": [{
            "name": "txt2img",
            "description": "Generate image from text using an AUTOMATIC1111-compatible /sdapi/v1/txt2img endpoint",
            "input_schema": {
                "type": "object",
                "properties": {
                    "prompt": {"type": "string"},
                    "negative_prompt": {"type": "string"},
                    "steps": {"type": "integer"},
                    "width": {"type": "integer"},
                    "height": {"type": "integer"},
                    "sampler_name": {"type": ["string", "null"]},
                    "cfg_scale": {"type": "number"},
                    "seed": {"type": "integer"},
                    "batch_size": {"type": "integer"}
                },
                "required": ["prompt"],
                "additionalProperties": true
            }
        }]
    })
}

async fn handle_call(tool: &ImageTool, name: &str, args: Value) -> Value {
    if name != "txt2img" {
        return json!({
            "type": "tool_result", "name": name, "ok": false,
            "error": format!("Unknown tool: {}", name)
        });
    }

    let params: Txt2ImgParams = match serde_json::from_value(args) {
        Ok(p) => p,
        Err(e) => {
            return json!({
                "type": "tool_result", "name": name, "ok": false,
                "error": format!("Invalid arguments: {}", e)
            });
        }
    };

    match tool.txt2img(&params).await {
        Ok(files) => json!({
            "type": "tool_result", "name": name, "ok": true,
            "files": files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()
        }),
        Err(e) => json!({
            "type": "tool_result", "name": name, "ok": false,
            "error": e.to_string()
        }),
    }
}

/// Serve the line-delimited JSON protocol on stdin/stdout until EOF or an
/// exit message. Per-request tool failures are reported on the protocol;
/// the loop keeps serving.
pub async fn serve(config: ImageConfig) -> anyhow::Result<()> {
    let tool = ImageTool::new(config)?;
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    send(&mut stdout, tool_manifest()).await?;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed request line");
                continue;
            }
        };

        match request {
            Request::ListTools => {
                send(&mut stdout, json!({"type": "tools", "tools": ["txt2img"]})).await?;
            }
            Request::CallTool { name, args } => {
                let result = handle_call(&tool, &name, args).await;
                send(&mut stdout, result).await?;
            }
            Request::Ping => {
                send(&mut stdout, json!({"type": "pong"})).await?;
            }
            Request::Exit | Request::Shutdown => break,
        }
    }

    Ok(())
}

async fn send(stdout: &mut tokio::io::Stdout, msg: Value) -> std::io::Result<()> {
    stdout
        .write_all(format!("{}\n", msg).as_bytes())
        .await?;
    stdout.flush().await
}
