// src/utils/content.rs

use url::Url;

/// Sanitizes manager-authored lesson HTML before it is stored.
///
/// Whitelist-based: formatting tags (<b>, <p>, lists, links) survive while
/// <script>/<iframe> and event-handler attributes are stripped. Lesson bodies are
/// rendered as HTML by clients, so this runs on every create and update.
pub fn sanitize_lesson_content(input: &str) -> String {
    ammonia::clean(input.trim())
}

/// Validator hook for an optional lesson video link: must be an absolute http(s) URL.
/// A blank value is accepted and clears the link.
pub fn validate_video_url(raw: &str) -> Result<(), validator::ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(());
    }
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_video_url")),
    }
}
