//! Client for the image upload service that stores extracted frames.

use crate::domain::jobs::VideoRecordStatus;
use crate::error::BoxError;
use crate::ports::repository::StatusReporter;
use crate::ports::storage::{ArtifactDescriptor, ArtifactUploader};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoZipRequest<'a> {
    video_uuid: &'a str,
    status: VideoRecordStatus,
}

#[derive(Debug, Default, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Clone)]
pub struct ImageServiceClient {
    http: Client,
    base_url: String,
}

impl ImageServiceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BoxError> {
        let http = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn images_url(&self, video_id: &str) -> String {
        format!("{}/video-zip/{}/images", self.base_url, video_id)
    }
}

async fn ensure_success(response: Response) -> Result<Response, BoxError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(format!("Image service returned {}: {}", status, body).into())
}

#[async_trait]
impl ArtifactUploader for ImageServiceClient {
    async fn upload_frame(
        &self,
        video_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactDescriptor, BoxError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime.as_ref())?;
        let form = Form::new().part("images", part);

        let response = self
            .http
            .post(self.images_url(video_id))
            .multipart(form)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let image: ImageResponse = response.json().await.unwrap_or_default();
        debug!("Uploaded {} for video {}", filename, video_id);

        Ok(ArtifactDescriptor {
            video_id: video_id.to_string(),
            filename: filename.to_string(),
            location: image.url.or(image.path),
        })
    }
}

/// Mirrors processing status onto the service's video-zip record.
#[async_trait]
impl StatusReporter for ImageServiceClient {
    async fn set_video_status(
        &self,
        video_id: &str,
        status: VideoRecordStatus,
    ) -> Result<(), BoxError> {
        let body = VideoZipRequest {
            video_uuid: video_id,
            status,
        };
        let request = match status {
            VideoRecordStatus::Uploaded => return Ok(()),
            VideoRecordStatus::Processing => {
                self.http.post(format!("{}/video-zip", self.base_url))
            }
            VideoRecordStatus::Done | VideoRecordStatus::Error => self
                .http
                .put(format!("{}/video-zip/{}", self.base_url, video_id)),
        };

        let response = request.json(&body).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{Method, Uri};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(Method, String, String)>>>;

    async fn record(State(seen): State<Seen>, method: Method, uri: Uri, body: Bytes) -> Json<serde_json::Value> {
        let body = String::from_utf8_lossy(&body).into_owned();
        seen.lock().unwrap().push((method, uri.path().to_string(), body));
        Json(serde_json::json!({ "url": "http://images/frame_000001.png" }))
    }

    /// Local image service recording every request it receives.
    async fn stub_service() -> (ImageServiceClient, Seen) {
        let seen = Seen::default();
        let app = Router::new().fallback(record).with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (ImageServiceClient::new(format!("http://{}", addr)).unwrap(), seen)
    }

    #[tokio::test]
    async fn test_status_routing() {
        let (client, seen) = stub_service().await;

        for status in [
            VideoRecordStatus::Uploaded,
            VideoRecordStatus::Processing,
            VideoRecordStatus::Done,
            VideoRecordStatus::Error,
        ] {
            client.set_video_status("abc", status).await.unwrap();
        }

        let seen = seen.lock().unwrap();
        let routes: Vec<(Method, &str)> = seen.iter().map(|(m, p, _)| (m.clone(), p.as_str())).collect();
        assert_eq!(
            routes,
            vec![
                (Method::POST, "/video-zip"),
                (Method::PUT, "/video-zip/abc"),
                (Method::PUT, "/video-zip/abc"),
            ]
        );
        assert!(seen[0].2.contains(r#""videoUuid":"abc""#));
        assert!(seen[0].2.contains(r#""status":"PROCESSING""#));
        assert!(seen[1].2.contains(r#""status":"DONE""#));
        assert!(seen[2].2.contains(r#""status":"ERROR""#));
    }

    #[tokio::test]
    async fn test_upload_posts_frame_as_images_part() {
        let (client, seen) = stub_service().await;

        let artifact = client
            .upload_frame("abc", "frame_000001.png", b"png-bytes".to_vec())
            .await
            .unwrap();

        assert_eq!(artifact.location.as_deref(), Some("http://images/frame_000001.png"));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (method, path, body) = &seen[0];
        assert_eq!((method, path.as_str()), (&Method::POST, "/video-zip/abc/images"));
        let body = body.to_lowercase();
        assert!(body.contains(r#"name="images""#));
        assert!(body.contains(r#"filename="frame_000001.png""#));
        assert!(body.contains("content-type: image/png"));
        assert!(body.contains("png-bytes"));
    }

    #[test]
    fn test_images_url_has_no_double_slash() {
        let client = ImageServiceClient::new("http://images:3001/").unwrap();
        assert_eq!(
            client.images_url("abc"),
            "http://images:3001/video-zip/abc/images"
        );
    }

    #[test]
    fn test_video_zip_body_shape() {
        let body = VideoZipRequest {
            video_uuid: "abc",
            status: VideoRecordStatus::Processing,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"videoUuid": "abc", "status": "PROCESSING"}));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_upload_error() {
        let client = ImageServiceClient::new("http://127.0.0.1:9").unwrap();
        let result = client.upload_frame("v", "frame_000000.jpg", vec![0xff, 0xd8]).await;
        assert!(result.is_err());
    }
}
