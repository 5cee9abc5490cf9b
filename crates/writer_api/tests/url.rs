use writer_api::url::endpoint_url;
use writer_api::{channel_url, normalize_api_base};

#[test]
fn url_normalization_keeps_existing_api_root() {
    assert_eq!(
        normalize_api_base("http://localhost:8000/api/"),
        "http://localhost:8000/api"
    );
}

#[test]
fn url_normalization_appends_api_to_bare_host() {
    assert_eq!(
        normalize_api_base("https://writer.example.com"),
        "https://writer.example.com/api"
    );
}

#[test]
fn url_normalization_falls_back_to_default_for_blank_input() {
    assert_eq!(normalize_api_base("   "), "http://localhost:8000/api");
}

#[test]
fn endpoint_url_appends_segments_under_api_root() {
    assert_eq!(
        endpoint_url("http://localhost:8000", &["session", "start"])
            .expect("url")
            .as_str(),
        "http://localhost:8000/api/session/start"
    );
}

#[test]
fn endpoint_url_encodes_each_segment() {
    assert_eq!(
        endpoint_url("http://localhost:8000/api", &["session", "status", "my novel/1"])
            .expect("url")
            .as_str(),
        "http://localhost:8000/api/session/status/my%20novel%2F1"
    );
}

#[test]
fn channel_url_maps_http_schemes_to_websocket() {
    assert_eq!(
        channel_url("http://localhost:8000/api", "novel-1")
            .expect("ws url")
            .as_str(),
        "ws://localhost:8000/api/ws/novel-1/session"
    );
    assert_eq!(
        channel_url("https://writer.example.com", "novel-1")
            .expect("wss url")
            .as_str(),
        "wss://writer.example.com/api/ws/novel-1/session"
    );
}

#[test]
fn channel_url_rejects_unknown_scheme_and_blank_key() {
    assert!(channel_url("ftp://host/api", "p").is_err());
    assert!(channel_url("http://host/api", "  ").is_err());
}
