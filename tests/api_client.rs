use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use taskdesk::api::{ApiClient, ApiError, RequestOptions, GENERIC_FAILURE};
use taskdesk::config::ApiConfig;
use taskdesk::model::{Priority, Status, TaskDraft};
use taskdesk::notify::Notifications;
use taskdesk::util::Tone;

use reqwest::Method;
use std::time::Duration;

struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serves a single request with the given status line and JSON payload,
/// then hands back what the client sent.
fn respond_once(status: &'static str, payload: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
        }
        let length = headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.parse::<usize>().unwrap())
            .unwrap_or(0);
        let mut body = vec![0; length];
        reader.read_exact(&mut body).unwrap();

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            payload.len(),
            payload
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();

        Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(body).unwrap(),
        }
    });
    (base, handle)
}

fn client(base_url: String) -> ApiClient {
    ApiClient::new(&ApiConfig {
        base_url,
        timeout_secs: 5,
    })
    .unwrap()
}

fn draft() -> TaskDraft {
    TaskDraft {
        title: "Write report".into(),
        description: String::new(),
        priority: Priority::High,
        due_date: None,
        status: None,
        category_id: None,
    }
}

#[test]
fn server_error_is_reraised_and_announced() {
    let (base, server) = respond_once("500 Internal Server Error", r#"{"error":"boom"}"#);
    let mut notices = Notifications::new(Duration::from_millis(5000));

    let err = client(base).create_task(&draft(), &mut notices).unwrap_err();

    assert!(matches!(err, ApiError::Status { .. }));
    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
    assert_eq!(err.to_string(), "HTTP error! status: 500 Internal Server Error");
    assert_eq!(notices.visible().len(), 1);
    assert_eq!(notices.visible()[0].message, GENERIC_FAILURE);
    assert_eq!(notices.visible()[0].tone, Tone::Danger);

    let captured = server.join().unwrap();
    assert_eq!(captured.request_line, "POST /api/tasks HTTP/1.1");
    assert_eq!(captured.header("content-type"), Some("application/json"));
    assert!(captured.body.contains("\"title\":\"Write report\""));
    assert!(captured.body.contains("\"priority\":\"high\""));
}

#[test]
fn success_returns_parsed_body_without_banner() {
    let (base, server) = respond_once(
        "201 Created",
        r#"{"id":7,"title":"Write report","description":"","priority":"high","status":"pending","due_date":null}"#,
    );
    let mut notices = Notifications::new(Duration::from_millis(5000));

    let task = client(base).create_task(&draft(), &mut notices).unwrap();

    assert_eq!(task.id, 7);
    assert_eq!(task.status, Status::Pending);
    assert!(notices.is_empty());
    server.join().unwrap();
}

#[test]
fn caller_content_type_overrides_default() {
    let (base, server) = respond_once("200 OK", r#"{"ok":true}"#);
    let mut notices = Notifications::new(Duration::from_millis(5000));

    let value = client(base)
        .call(
            "/api/echo",
            RequestOptions::new(Method::POST)
                .header("Content-Type", "text/plain")
                .header("X-Client", "taskdesk"),
            &mut notices,
        )
        .unwrap();

    assert_eq!(value["ok"], true);
    let captured = server.join().unwrap();
    assert_eq!(captured.header("content-type"), Some("text/plain"));
    assert_eq!(captured.header("x-client"), Some("taskdesk"));
}

#[test]
fn unreachable_server_is_a_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    let mut notices = Notifications::new(Duration::from_millis(5000));

    let err = client(base).stats(&mut notices).unwrap_err();

    assert!(matches!(err, ApiError::Network { .. }));
    assert_eq!(notices.visible()[0].message, GENERIC_FAILURE);
}

#[test]
fn categories_are_listed_from_the_server() {
    let (base, server) = respond_once(
        "200 OK",
        r##"[{"id":1,"name":"Work","color":"#007bff","created_at":"2024-01-01T00:00:00"},{"id":2,"name":"Home","color":"#28a745"}]"##,
    );
    let mut notices = Notifications::new(Duration::from_millis(5000));

    let categories = client(base).list_categories(&mut notices).unwrap();

    let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["Work", "Home"]);
    assert_eq!(categories[1].id, 2);
    let captured = server.join().unwrap();
    assert_eq!(captured.request_line, "GET /api/categories HTTP/1.1");
}

#[test]
fn category_assignment_is_sent_with_the_task() {
    let (base, server) = respond_once(
        "200 OK",
        r#"{"id":7,"title":"Write report","priority":"high","status":"pending","category_id":2}"#,
    );
    let mut notices = Notifications::new(Duration::from_millis(5000));
    let mut body = draft();
    body.category_id = Some(2);

    let task = client(base).update_task(7, &body, &mut notices).unwrap();

    assert_eq!(task.category_id, Some(2));
    let captured = server.join().unwrap();
    assert_eq!(captured.request_line, "PUT /api/tasks/7 HTTP/1.1");
    assert!(captured.body.contains("\"category_id\":2"));
}
