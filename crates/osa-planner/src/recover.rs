/// Strip common markdown fence wrappers (```json ... ``` or ``` ... ```)
/// and return the first balanced `{...}` object found in `text`.
///
/// Models reliably wrap JSON in prose or fences even under a strict
/// "respond with only JSON" instruction; this recovers the object without
/// requiring the model to get formatting perfectly right.
pub fn extract_json_object(text: &str) -> Option<String> {
    let stripped = strip_fences(text);
    let bytes = stripped.as_bytes();
    let start = bytes.iter().position(|&b| b == b'{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(stripped[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn strip_fences(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
    } else {
        trimmed.to_string()
    }
}
