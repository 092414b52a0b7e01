use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Dashboard, login and register pages plus their scripts and styles.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/ui/"]
pub struct Assets;

/// Response for an embedded file, with a content type guessed from its
/// extension. `None` when no such asset exists.
pub fn asset_response(path: &str) -> Option<Response> {
    let path = path.trim_start_matches('/');
    if path.is_empty() || path.contains("..") {
        return None;
    }
    let content = Assets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some(
        (
            [(header::CONTENT_TYPE, mime.as_ref().to_string())],
            Body::from(content.data.into_owned()),
        )
            .into_response(),
    )
}

/// Like [`asset_response`] but answers 404 for missing files.
pub fn asset_or_not_found(path: &str) -> Response {
    asset_response(path).unwrap_or_else(|| (StatusCode::NOT_FOUND, "Not found").into_response())
}

/// Fallback for static files. HTML pages are only reachable through their
/// routes so the dashboard keeps its session check.
pub fn static_or_not_found(path: &str) -> Response {
    if is_page(path) {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }
    asset_or_not_found(path)
}

fn is_page(path: &str) -> bool {
    path.trim_end_matches('/').to_ascii_lowercase().ends_with(".html")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_are_embedded() {
        for page in ["index.html", "login.html", "register.html", "app.js", "style.css"] {
            assert!(Assets::get(page).is_some(), "{} missing", page);
        }
    }

    #[test]
    fn test_asset_content_types() {
        let response = asset_response("/style.css").unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
        let response = asset_response("app.js").unwrap();
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .contains("javascript")
        );
    }

    #[test]
    fn test_missing_and_traversal_paths() {
        assert!(asset_response("nope.txt").is_none());
        assert!(asset_response("../Cargo.toml").is_none());
        assert!(asset_response("").is_none());
        assert_eq!(asset_or_not_found("nope.txt").status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_static_fallback_hides_pages() {
        assert_eq!(static_or_not_found("/index.html").status(), StatusCode::NOT_FOUND);
        assert_eq!(static_or_not_found("/Login.HTML").status(), StatusCode::NOT_FOUND);
        assert_eq!(static_or_not_found("/style.css").status(), StatusCode::OK);
    }

    #[test]
    fn test_dashboard_ships_voice_input() {
        let page = Assets::get("index.html").unwrap();
        let page = std::str::from_utf8(&page.data).unwrap();
        assert!(page.contains(r#"id="voice""#));
        assert!(page.contains(r#"id="voice-status""#));

        let script = Assets::get("app.js").unwrap();
        let script = std::str::from_utf8(&script.data).unwrap();
        assert!(script.contains("window.SpeechRecognition || window.webkitSpeechRecognition"));
        assert!(script.contains("setupVoice();"));
    }
}
