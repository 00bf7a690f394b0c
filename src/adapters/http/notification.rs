use crate::error::BoxError;
use crate::ports::notifier::{FailureNotice, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRequest<'a> {
    video_uuid: &'a str,
    video_name: &'a str,
    error: &'a str,
    status: &'static str,
}

impl<'a> From<&'a FailureNotice> for NotificationRequest<'a> {
    fn from(notice: &'a FailureNotice) -> Self {
        Self {
            video_uuid: &notice.video_id,
            video_name: &notice.video_name,
            error: &notice.error,
            status: "PENDING",
        }
    }
}

/// Client for the notification service, told about videos that failed.
#[derive(Clone)]
pub struct NotificationClient {
    http: Client,
    endpoint: String,
}

impl NotificationClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, BoxError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let base_url = base_url.into();
        Ok(Self {
            http,
            endpoint: format!("{}/notifications/", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Notifier for NotificationClient {
    async fn notify_failure(&self, notice: &FailureNotice) -> Result<(), BoxError> {
        info!("Sending failure notice for video {}", notice.video_id);
        let response = self
            .http
            .post(&self.endpoint)
            .json(&NotificationRequest::from(notice))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Notification service returned {}: {}", status, body).into());
        }
        Ok(())
    }
}
