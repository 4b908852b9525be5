/// Logging helpers
pub mod logging {
    use log::LevelFilter;

    pub fn level_from_string(level: &str) -> LevelFilter {
        match level.to_lowercase().as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        }
    }
}

/// HTML helpers
pub mod html {
    /// Escape text for interpolation into HTML bodies.
    pub fn escape(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }
}

/// Response helpers
pub mod response {
    use actix_web::HttpResponse;
    use serde::Serialize;

    pub fn json_response<T: Serialize>(data: T, status: u16) -> HttpResponse {
        match actix_web::http::StatusCode::from_u16(status) {
            Ok(code) => HttpResponse::build(code)
                .content_type("application/json")
                .json(data),
            Err(_) => HttpResponse::build(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR)
                .content_type("application/json")
                .json(serde_json::json!({"error": "Invalid status code"})),
        }
    }

    pub fn success_response<T: Serialize>(data: T) -> HttpResponse {
        json_response(data, 200)
    }

    pub fn error_response(message: &str, status: u16) -> HttpResponse {
        json_response(serde_json::json!({"error": message}), status)
    }

    pub fn validation_error_response(errors: Vec<String>) -> HttpResponse {
        json_response(serde_json::json!({"errors": errors}), 400)
    }
}

#[cfg(test)]
mod tests {
    use super::html::escape;
    use super::logging::level_from_string;
    use log::LevelFilter;

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(level_from_string("debug"), LevelFilter::Debug);
        assert_eq!(level_from_string("WARN"), LevelFilter::Warn);
        assert_eq!(level_from_string("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn html_escape_covers_markup_characters() {
        assert_eq!(escape("ACME <Srl> & Co."), "ACME &lt;Srl&gt; &amp; Co.");
        assert_eq!(escape("plain"), "plain");
    }
}
