use thiserror::Error;

/// Failure taxonomy for the remote gateway. Malformed structured output from
/// the analysis call is folded into `Analysis`; all variants carry a single
/// human-readable reason the orchestrator surfaces as-is.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no API credential configured (set GEMINI_API_KEY or GOOGLE_API_KEY)")]
    Credentials,
    #[error("skin-tone analysis failed: {0}")]
    Analysis(String),
    #[error("virtual try-on failed: {0}")]
    Composition(String),
    #[error("hair restyle failed: {0}")]
    Restyle(String),
}

/// Flattens an error chain into one line, deduplicating repeated causes.
pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use anyhow::Context as _;

    use super::*;

    #[test]
    fn chain_text_joins_distinct_causes() {
        let err = anyhow::anyhow!("connection refused")
            .context("request failed")
            .context("request failed");
        let text = error_chain_text(&err, 256);
        assert_eq!(text, "request failed | caused by: connection refused");
    }

    #[test]
    fn truncation_respects_char_limit() {
        let text = truncate_text("abcdefgh", 4);
        assert_eq!(text, "abcd…");
        assert_eq!(truncate_text("short", 32), "short");
    }

    #[test]
    fn variants_render_single_line_messages() {
        let err = GatewayError::Analysis("timed out".to_string());
        assert_eq!(err.to_string(), "skin-tone analysis failed: timed out");
        let err = GatewayError::Composition("no image payload returned".to_string());
        assert!(err.to_string().starts_with("virtual try-on failed"));
    }
}
