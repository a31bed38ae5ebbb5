// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use tracing::debug;

use crate::policy::ApprovalPolicy;
use crate::tool::{OutputCategory, Tool, ToolCall, ToolOutput, ToolOutputPart};

/// Hard byte ceiling on the file read before base64-encoding. Vision models
/// have their own size limits; this just avoids loading an absurd file into
/// memory before rejecting it.
const MAX_IMAGE_BYTES: usize = 20_000_000;

/// Reads an image file and returns it as a base64 data URL part, for models
/// that accept image input (spec §4.8 vision-capable tools).
pub struct ReadImageTool;

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[async_trait]
impl Tool for ReadImageTool {
    fn name(&self) -> &str {
        "read_image"
    }

    fn description(&self) -> &str {
        "Reads an image file (png/jpg/jpeg/gif/webp/bmp) and returns it to the model as \
         visual input. Only useful with a vision-capable model; text-only models will \
         receive a placeholder instead."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the image file"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };

        let ext = std::path::Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        let mime = match mime_for_extension(ext) {
            Some(m) => m,
            None => {
                return ToolOutput::err(
                    &call.id,
                    format!("unsupported image extension: .{ext}"),
                )
            }
        };

        debug!(path = %path, "read_image tool");

        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };
        if bytes.len() > MAX_IMAGE_BYTES {
            return ToolOutput::err(
                &call.id,
                format!("image too large: {} bytes (max {MAX_IMAGE_BYTES})", bytes.len()),
            );
        }

        let b64 = STANDARD.encode(&bytes);
        let data_url = format!("data:{mime};base64,{b64}");
        let caption = format!("[image: {path}, {} bytes]", bytes.len());

        ToolOutput {
            call_id: call.id.clone(),
            content: caption.clone(),
            parts: vec![
                ToolOutputPart::Text(caption),
                ToolOutputPart::Image(data_url),
            ],
            is_error: false,
        }
    }
}
