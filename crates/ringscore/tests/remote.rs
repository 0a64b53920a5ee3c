use image::{Rgb, RgbImage};
use ringscore::{
    AccumulatedScore, HttpScoreService, PipelineDriver, RemoteError, RingscoreConfig, ScoreReport,
    ScoreService,
};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Request {
    method: String,
    path: String,
    content_type: Option<String>,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Request {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).expect("request line");
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    let mut content_type = None;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).expect("header");
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            let value = value.trim();
            match name.to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.parse().expect("length"),
                "content-type" => content_type = Some(value.to_string()),
                _ => {}
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).expect("body");
    Request {
        method,
        path,
        content_type,
        body,
    }
}

/// Serves one canned response per expected request, then returns what it saw.
fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<Request>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            seen.push(read_request(&mut stream));
            let reply = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(reply.as_bytes()).expect("reply");
        }
        seen
    });
    (base, handle)
}

fn service(base: &str) -> HttpScoreService {
    HttpScoreService::new(base, Duration::from_secs(5))
}

#[test]
fn resumes_from_previous_angles() {
    let (base, server) = serve(vec![(200, r#"{"angles": {"5": [10, -10]}}"#)]);
    let mut driver = PipelineDriver::new(&RingscoreConfig::default()).expect("driver");
    assert!(driver.seed_from(&service(&base)));

    let seen = server.join().expect("server");
    assert_eq!(seen[0].method, "GET");
    assert_eq!(seen[0].path, "/api/data");
    assert_eq!(driver.accumulator().total(), 10);
    assert_eq!(driver.accumulator().angles().angles(5), &[10, -10]);
    assert!(driver.accumulator().points(5).is_empty());
}

#[test]
fn unusable_previous_data_starts_empty() {
    let (base, server) = serve(vec![
        (500, r#"{"error": "boom"}"#),
        (200, r#"{"angles": null}"#),
        (200, "garbage"),
    ]);
    let svc = service(&base);
    for _ in 0..3 {
        assert!(svc.fetch_angles().is_none());
    }
    server.join().expect("server");
}

#[test]
fn unreachable_service_is_not_fatal() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let svc = HttpScoreService::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(1));
    assert!(svc.fetch_angles().is_none());
    assert!(matches!(svc.selected_ip(), Err(RemoteError::Transport { .. })));
}

#[test]
fn selected_ip_lookup() {
    let (base, server) = serve(vec![
        (200, r#"{"selected_ip": "192.168.1.20"}"#),
        (200, r#"{"selected_ip": null}"#),
        (404, r#"{}"#),
    ]);
    let svc = service(&base);
    assert_eq!(svc.selected_ip().expect("ip"), "192.168.1.20");
    assert!(matches!(
        svc.selected_ip(),
        Err(RemoteError::MissingField("selected_ip"))
    ));
    assert!(matches!(
        svc.selected_ip(),
        Err(RemoteError::Status { status: 404, .. })
    ));
    let seen = server.join().expect("server");
    assert!(seen.iter().all(|r| r.path == "/api/selected_ip"));
}

#[test]
fn report_is_posted_as_multipart() {
    let (base, server) = serve(vec![(200, r#"{"ok": true}"#), (503, "{}")]);
    let svc = service(&base);

    let mut acc = AccumulatedScore::new();
    acc.record(9, (260, 250), 0);
    let frame = RgbImage::from_pixel(16, 16, Rgb([200, 10, 10]));
    let report = ScoreReport::from_frame(&frame, acc.angles().clone()).expect("report");

    assert_eq!(svc.post_report(&report).expect("posted"), 200);
    // Error statuses are still a delivered report.
    assert_eq!(svc.post_report(&report).expect("posted"), 503);

    let seen = server.join().expect("server");
    let req = &seen[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/api/score");
    let content_type = req.content_type.as_deref().expect("content type");
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .expect("multipart");

    let body = String::from_utf8_lossy(&req.body);
    assert!(body.starts_with(&format!("--{boundary}\r\n")));
    assert!(body.contains("name=\"image\"; filename=\"image.jpg\""));
    assert!(body.contains("name=\"angles\""));
    assert!(body.contains(r#""9":[0]"#));
    assert!(body.contains(r#""10":[]"#));
    assert!(body.trim_end().ends_with(&format!("--{boundary}--")));
}
