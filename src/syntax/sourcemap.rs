//! Inline source map annotations.
//!
//! A stylesheet produced by another tool may end with
//! `/*# sourceMappingURL=data:application/json;base64,... */`. The map is
//! positional metadata: it is only checked, never rewritten.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use percent_encoding::percent_decode_str;
use serde::Deserialize;

use crate::error::SerializeError;

/// The fields every version 3 source map must have.
#[derive(Debug, Deserialize)]
struct RawSourceMap {
    version: u32,
    #[serde(default)]
    sources: Vec<Option<String>>,
    mappings: String,
}

/// URL of a `# sourceMappingURL=` comment body (`@` is the legacy marker).
pub fn annotation_url(comment: &str) -> Option<&str> {
    let body = comment.trim();
    let rest = body
        .strip_prefix('#')
        .or_else(|| body.strip_prefix('@'))?
        .trim_start()
        .strip_prefix("sourceMappingURL=")?;
    Some(rest.trim())
}

/// Check an annotation URL. External maps are not looked at.
pub fn validate(url: &str) -> Result<(), SerializeError> {
    let Some(data) = url.strip_prefix("data:") else {
        return Ok(());
    };
    let (meta, payload) = data
        .split_once(',')
        .ok_or_else(|| invalid("data URI without payload"))?;

    let json = if meta.ends_with(";base64") {
        let bytes = BASE64_STANDARD
            .decode(payload)
            .map_err(|err| invalid(format!("bad base64: {err}")))?;
        String::from_utf8(bytes).map_err(|_| invalid("map is not UTF-8"))?
    } else {
        percent_decode_str(payload)
            .decode_utf8()
            .map_err(|_| invalid("map is not UTF-8"))?
            .into_owned()
    };

    let map: RawSourceMap =
        serde_json::from_str(&json).map_err(|err| invalid(format!("bad JSON: {err}")))?;
    if map.version != 3 {
        return Err(invalid(format!("unsupported version {}", map.version)));
    }
    if map.sources.is_empty() && !map.mappings.is_empty() {
        return Err(invalid("mappings without sources"));
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> SerializeError {
    SerializeError::SourceMap(reason.into())
}
