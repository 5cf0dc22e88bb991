//! Integration tests for the HTTP client against a loopback server.

use std::io::Read;
use std::sync::mpsc;
use std::thread;

use botdesk::api::ApiClient;
use botdesk::api::multipart::MultipartForm;
use botdesk::config::{ApiConfig, BotdeskConfig, OutputConfig};

/// A request as observed by the loopback server.
struct Recorded {
    method: String,
    path: String,
    cookie: Option<String>,
    content_type: Option<String>,
    body: String,
}

/// Start a server that answers `responses` in order and records each
/// request. Returns the base URL and a receiver of recorded requests.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<Recorded>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("bind loopback server");
    let port = server
        .server_addr()
        .to_ip()
        .expect("ip listen address")
        .port();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for (status, body) in responses {
            let mut request = match server.recv() {
                Ok(rq) => rq,
                Err(_) => return,
            };

            let header = |name: &str| {
                request
                    .headers()
                    .iter()
                    .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
                    .map(|h| h.value.as_str().to_string())
            };
            let cookie = header("Cookie");
            let content_type = header("Content-Type");

            let mut request_body = String::new();
            let _ = request.as_reader().read_to_string(&mut request_body);

            let _ = tx.send(Recorded {
                method: request.method().as_str().to_string(),
                path: request.url().to_string(),
                cookie,
                content_type,
                body: request_body,
            });

            let json_header = tiny_http::Header::from_bytes(
                &b"Content-Type"[..],
                &b"application/json"[..],
            )
            .expect("static header");
            let response = tiny_http::Response::from_string(body)
                .with_status_code(status)
                .with_header(json_header);
            let _ = request.respond(response);
        }
    });

    (format!("http://127.0.0.1:{port}"), rx)
}

fn test_config(base_url: String) -> BotdeskConfig {
    BotdeskConfig {
        api: ApiConfig {
            base_url,
            timeout_ms: 2_000,
            retries: 3,
            retry_delay_ms: 10,
        },
        output: OutputConfig { color: false },
    }
}

#[test]
fn get_json_parses_successful_response() {
    let (base, rx) = serve(vec![(200, r#"{"used": 5, "quota": 100}"#)]);
    let api = ApiClient::from_config(&test_config(base), None);

    let value: serde_json::Value = api.get_json("/api/stats").unwrap();
    assert_eq!(value["used"], 5);

    let recorded = rx.recv().unwrap();
    assert_eq!(recorded.method, "GET");
    assert_eq!(recorded.path, "/api/stats");
    assert_eq!(recorded.cookie, None);
}

#[test]
fn cookie_header_is_sent_when_session_is_cached() {
    let (base, rx) = serve(vec![(200, r#"{"role": "client"}"#)]);
    let api = ApiClient::from_config(&test_config(base), Some("sid=abc123".to_string()));

    let _: serde_json::Value = api.get_json("/api/me").unwrap();

    let recorded = rx.recv().unwrap();
    assert_eq!(recorded.cookie.as_deref(), Some("sid=abc123"));
}

#[test]
fn retry_wrapper_makes_exactly_three_attempts_then_fails() {
    let (base, rx) = serve(vec![(500, "{}"), (500, "{}"), (500, "{}")]);
    let api = ApiClient::from_config(&test_config(base), None);

    let result: anyhow::Result<serde_json::Value> = api.get_json_with_retry("/api/stats");
    assert!(result.is_err());

    let mut attempts = 0;
    while rx.recv_timeout(std::time::Duration::from_secs(2)).is_ok() {
        attempts += 1;
        if attempts == 3 {
            break;
        }
    }
    assert_eq!(attempts, 3);
    // No fourth attempt.
    assert!(
        rx.recv_timeout(std::time::Duration::from_millis(200))
            .is_err()
    );
}

#[test]
fn retry_wrapper_recovers_from_malformed_ok_body() {
    // HTTP-OK with a garbage body counts as a failed attempt, not a
    // terminal parse error.
    let (base, rx) = serve(vec![(200, "<<<not json>>>"), (200, r#"{"ok": true}"#)]);
    let api = ApiClient::from_config(&test_config(base), None);

    let value: serde_json::Value = api.get_json_with_retry("/api/stats").unwrap();
    assert_eq!(value["ok"], true);

    rx.recv().unwrap();
    rx.recv().unwrap();
    assert!(
        rx.recv_timeout(std::time::Duration::from_millis(200))
            .is_err()
    );
}

#[test]
fn retry_wrapper_fails_after_three_malformed_ok_bodies() {
    let (base, rx) = serve(vec![
        (200, "<<<not json>>>"),
        (200, "<<<not json>>>"),
        (200, "<<<not json>>>"),
    ]);
    let api = ApiClient::from_config(&test_config(base), None);

    let err = api
        .get_json_with_retry::<serde_json::Value>("/api/stats")
        .unwrap_err();
    assert!(
        err.to_string().contains("invalid JSON"),
        "error was: {err}"
    );

    let mut attempts = 0;
    while rx
        .recv_timeout(std::time::Duration::from_secs(2))
        .is_ok()
    {
        attempts += 1;
        if attempts == 3 {
            break;
        }
    }
    assert_eq!(attempts, 3);
}

#[test]
fn retry_wrapper_stops_after_first_success() {
    let (base, rx) = serve(vec![(500, "{}"), (200, r#"{"ok": true}"#)]);
    let api = ApiClient::from_config(&test_config(base), None);

    let value: serde_json::Value = api.get_json_with_retry("/api/conversations").unwrap();
    assert_eq!(value["ok"], true);

    rx.recv().unwrap();
    rx.recv().unwrap();
    assert!(
        rx.recv_timeout(std::time::Duration::from_millis(200))
            .is_err()
    );
}

#[test]
fn mutations_are_not_retried() {
    let (base, rx) = serve(vec![(500, r#"{"error": "boom"}"#)]);
    let api = ApiClient::from_config(&test_config(base), None);

    let result: anyhow::Result<serde_json::Value> =
        api.post_json("/api/clients", &serde_json::json!({"name": "Acme"}));
    let err = result.unwrap_err();
    assert!(err.to_string().contains("500"), "error was: {err}");
    assert!(err.to_string().contains("boom"), "error was: {err}");

    rx.recv().unwrap();
    assert!(
        rx.recv_timeout(std::time::Duration::from_millis(200))
            .is_err()
    );
}

#[test]
fn post_json_sends_body_and_content_type() {
    let (base, rx) = serve(vec![(200, r#"{"ok": true}"#)]);
    let api = ApiClient::from_config(&test_config(base), None);

    let _: serde_json::Value = api
        .post_json("/api/login", &serde_json::json!({"email": "a@b.c"}))
        .unwrap();

    let recorded = rx.recv().unwrap();
    assert_eq!(recorded.method, "POST");
    assert!(recorded.body.contains(r#""email":"a@b.c""#));
    assert!(
        recorded
            .content_type
            .as_deref()
            .unwrap_or("")
            .starts_with("application/json")
    );
}

#[test]
fn multipart_upload_sends_well_formed_body() {
    let (base, rx) = serve(vec![(200, r#"{"ok": true}"#)]);
    let api = ApiClient::from_config(&test_config(base), None);

    let mut form = MultipartForm::new();
    form.text("name", "menu")
        .file("file", "menu.txt", "text/plain", b"pasta: 12eur");

    let _: serde_json::Value = api.post_multipart("/upload/c1", form).unwrap();

    let recorded = rx.recv().unwrap();
    let content_type = recorded.content_type.unwrap();
    assert!(content_type.starts_with("multipart/form-data; boundary="));

    let boundary = content_type.split("boundary=").nth(1).unwrap();
    assert!(recorded.body.contains(&format!("--{boundary}\r\n")));
    assert!(recorded.body.contains("name=\"name\"\r\n\r\nmenu"));
    assert!(recorded.body.contains("filename=\"menu.txt\""));
    assert!(recorded.body.contains("pasta: 12eur"));
    assert!(recorded.body.ends_with(&format!("--{boundary}--\r\n")));
}

#[test]
fn login_captures_session_cookie() {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("bind loopback server");
    let port = server
        .server_addr()
        .to_ip()
        .expect("ip listen address")
        .port();

    thread::spawn(move || {
        let request = server.recv().unwrap();
        let set_cookie = tiny_http::Header::from_bytes(
            &b"Set-Cookie"[..],
            &b"sid=xyz; Path=/; HttpOnly"[..],
        )
        .unwrap();
        let json_header =
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
        let response = tiny_http::Response::from_string(r#"{"ok": true}"#)
            .with_header(set_cookie)
            .with_header(json_header);
        let _ = request.respond(response);
    });

    let api = ApiClient::from_config(&test_config(format!("http://127.0.0.1:{port}")), None);
    let (body, cookie): (serde_json::Value, _) = api
        .post_capturing_cookie("/api/login", &serde_json::json!({"email": "a@b.c"}))
        .unwrap();

    assert_eq!(body["ok"], true);
    assert_eq!(cookie.as_deref(), Some("sid=xyz"));
}

#[test]
fn http_error_body_is_surfaced() {
    let (base, _rx) = serve(vec![(403, r#"{"error": "forbidden"}"#)]);
    let api = ApiClient::from_config(&test_config(base), None);

    let err = api
        .get_json::<serde_json::Value>("/api/stats")
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("403"), "error was: {text}");
    assert!(text.contains("forbidden"), "error was: {text}");
}
