//! Client for the scoring service: selected camera, previous angles, final report.

use crate::accumulator::AngleState;
use image::{ImageFormat, RgbImage};
use log::{info, warn};
use serde::Deserialize;
use std::io::Cursor;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    #[error("{url}: HTTP status {status}")]
    Status { url: String, status: u16 },
    #[error("{url}: {reason}")]
    Transport { url: String, reason: String },
    #[error("reading response body: {0}")]
    Body(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("response has no `{0}` field")]
    MissingField(&'static str),
    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Final session report: annotated frame and per-ring angles.
#[derive(Clone, Debug)]
pub struct ScoreReport {
    pub image_jpeg: Vec<u8>,
    pub angles: AngleState,
}

impl ScoreReport {
    pub fn from_frame(frame: &RgbImage, angles: AngleState) -> Result<Self, RemoteError> {
        let mut jpeg = Cursor::new(Vec::new());
        frame.write_to(&mut jpeg, ImageFormat::Jpeg)?;
        Ok(Self {
            image_jpeg: jpeg.into_inner(),
            angles,
        })
    }
}

pub trait ScoreService {
    /// IP address of the camera chosen in the scoring app.
    fn selected_ip(&self) -> Result<String, RemoteError>;

    /// Angles of a previous session, `None` when unavailable for any reason.
    fn fetch_angles(&self) -> Option<AngleState>;

    /// Upload the report; returns the HTTP status of any server response.
    fn post_report(&self, report: &ScoreReport) -> Result<u16, RemoteError>;
}

/// Blocking HTTP implementation.
#[derive(Clone)]
pub struct HttpScoreService {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpScoreService {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_text(&self, path: &str) -> Result<String, RemoteError> {
        let url = self.url(path);
        let resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| http_error(&url, e))?;
        if resp.status() != 200 {
            return Err(RemoteError::Status {
                url,
                status: resp.status(),
            });
        }
        Ok(resp.into_string()?)
    }
}

impl ScoreService for HttpScoreService {
    fn selected_ip(&self) -> Result<String, RemoteError> {
        #[derive(Deserialize)]
        struct SelectedIp {
            selected_ip: Option<String>,
        }

        let body = self.get_text("/api/selected_ip")?;
        serde_json::from_str::<SelectedIp>(&body)?
            .selected_ip
            .filter(|ip| !ip.trim().is_empty())
            .ok_or(RemoteError::MissingField("selected_ip"))
    }

    fn fetch_angles(&self) -> Option<AngleState> {
        match self.get_text("/api/data") {
            Ok(body) => {
                let state = parse_angle_state(&body);
                if state.is_none() {
                    warn!("ignoring malformed /api/data response");
                }
                state
            }
            Err(e) => {
                warn!("previous score unavailable: {e}");
                None
            }
        }
    }

    fn post_report(&self, report: &ScoreReport) -> Result<u16, RemoteError> {
        let url = self.url("/api/score");
        let boundary = make_boundary();
        let body = multipart_body(&boundary, report)?;
        let status = match self
            .agent
            .post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body)
        {
            Ok(resp) => resp.status(),
            Err(ureq::Error::Status(status, _)) => status,
            Err(e) => return Err(http_error(&url, e)),
        };
        info!("report posted to {url}: HTTP {status}");
        Ok(status)
    }
}

fn http_error(url: &str, err: ureq::Error) -> RemoteError {
    match err {
        ureq::Error::Status(status, _) => RemoteError::Status {
            url: url.to_string(),
            status,
        },
        other => RemoteError::Transport {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}

/// `{"angles": {...}}` body of `/api/data`. A missing or null `angles`
/// field, or any shape error, yields `None`.
pub fn parse_angle_state(body: &str) -> Option<AngleState> {
    #[derive(Deserialize)]
    struct DataResponse {
        angles: Option<AngleState>,
    }

    serde_json::from_str::<DataResponse>(body).ok()?.angles
}

fn make_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("ringscore-{nanos:x}")
}

/// `multipart/form-data` with an `image` file part and an `angles` JSON part.
pub fn multipart_body(boundary: &str, report: &ScoreReport) -> Result<Vec<u8>, RemoteError> {
    let angles = serde_json::to_vec(&report.angles)?;
    let mut body = Vec::with_capacity(report.image_jpeg.len() + angles.len() + 512);

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"image\"; filename=\"image.jpg\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
    body.extend_from_slice(&report.image_jpeg);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"angles\"\r\n");
    body.extend_from_slice(b"Content-Type: application/json\r\n\r\n");
    body.extend_from_slice(&angles);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_previous_angles() {
        let state = parse_angle_state(r#"{"angles": {"5": [10, -10], "10": []}}"#).expect("state");
        assert_eq!(state.angles(5), &[10, -10]);
        assert_eq!(state.points(), 10);
    }

    #[test]
    fn malformed_bodies_mean_no_state() {
        for body in [
            "",
            "not json",
            "[]",
            r#"{"other": 1}"#,
            r#"{"angles": null}"#,
            r#"{"angles": [1, 2]}"#,
            r#"{"angles": {"12": [1]}}"#,
            r#"{"angles": {"3": "x"}}"#,
        ] {
            assert!(parse_angle_state(body).is_none(), "{body}");
        }
    }

    #[test]
    fn multipart_layout() {
        let state: AngleState = serde_json::from_str(r#"{"2": [90]}"#).expect("json");
        let report = ScoreReport {
            image_jpeg: vec![0xFF, 0xD8, 0x01, 0xFF, 0xD9],
            angles: state,
        };
        let body = multipart_body("XYZ", &report).expect("body");
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"image\"; filename=\"image.jpg\"\r\n"));
        assert!(text.contains("name=\"angles\"\r\nContent-Type: application/json\r\n\r\n{\"10\":[]"));
        assert!(text.contains("\"2\":[90]"));
        assert!(text.ends_with("\r\n--XYZ--\r\n"));
        let jpeg_at = body
            .windows(3)
            .position(|w| w == [0xFF, 0xD8, 0x01])
            .expect("jpeg bytes");
        assert_eq!(&body[jpeg_at - 4..jpeg_at], b"\r\n\r\n");
    }

    #[test]
    fn report_encodes_jpeg() {
        let frame = RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
        let report = ScoreReport::from_frame(&frame, AngleState::default()).expect("report");
        assert_eq!(&report.image_jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let svc = HttpScoreService::new("http://127.0.0.1:5000/", Duration::from_secs(1));
        assert_eq!(svc.url("/api/data"), "http://127.0.0.1:5000/api/data");
    }
}
