//! Shared HTTP-status to [`AdapterError`] mapping used by both the
//! `azure-chat` and `openai-compatible` adapters (§4.1, §7).

use quorum_application::ports::model_adapter::AdapterError;

pub fn map_http_error(status: u16, body: &str) -> AdapterError {
    match status {
        401 | 403 => AdapterError::Unauthorized,
        429 => AdapterError::RateLimited { retry_after: None },
        400 | 404 | 422 => AdapterError::BadRequest(truncate(body)),
        408 => AdapterError::Timeout,
        500..=599 => AdapterError::Upstream(format!("http {status}: {}", truncate(body))),
        _ => AdapterError::Upstream(format!("http {status}: {}", truncate(body))),
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() > 500 {
        format!("{}...", body.chars().take(500).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_auth_and_rate_limit_and_server_errors() {
        assert!(matches!(map_http_error(401, ""), AdapterError::Unauthorized));
        assert!(matches!(map_http_error(403, ""), AdapterError::Unauthorized));
        assert!(matches!(map_http_error(429, ""), AdapterError::RateLimited { .. }));
        assert!(matches!(map_http_error(503, "oops"), AdapterError::Upstream(_)));
        assert!(matches!(map_http_error(400, "bad"), AdapterError::BadRequest(_)));
    }
}
