use crate::domain::jobs::VideoRecordStatus;
use crate::error::BoxError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Persist the status of a video record
    async fn set_video_status(
        &self,
        video_id: &str,
        status: VideoRecordStatus,
    ) -> Result<(), BoxError>;
}

#[async_trait]
impl<T: StatusReporter + ?Sized> StatusReporter for Arc<T> {
    async fn set_video_status(
        &self,
        video_id: &str,
        status: VideoRecordStatus,
    ) -> Result<(), BoxError> {
        (**self).set_video_status(video_id, status).await
    }
}

/// Reports to both; the second still runs when the first fails.
#[async_trait]
impl<A: StatusReporter, B: StatusReporter> StatusReporter for (A, B) {
    async fn set_video_status(
        &self,
        video_id: &str,
        status: VideoRecordStatus,
    ) -> Result<(), BoxError> {
        let first = self.0.set_video_status(video_id, status).await;
        let second = self.1.set_video_status(video_id, status).await;
        first.and(second)
    }
}

/// An absent reporter accepts every update.
#[async_trait]
impl<T: StatusReporter> StatusReporter for Option<T> {
    async fn set_video_status(
        &self,
        video_id: &str,
        status: VideoRecordStatus,
    ) -> Result<(), BoxError> {
        match self {
            Some(reporter) => reporter.set_video_status(video_id, status).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, VideoRecordStatus)>>,
        broken: bool,
    }

    #[async_trait]
    impl StatusReporter for Recorder {
        async fn set_video_status(
            &self,
            video_id: &str,
            status: VideoRecordStatus,
        ) -> Result<(), BoxError> {
            if self.broken {
                return Err("store offline".into());
            }
            self.seen.lock().unwrap().push((video_id.to_string(), status));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_pair_reports_to_both() {
        let pair = (Arc::new(Recorder::default()), Arc::new(Recorder::default()));
        pair.set_video_status("v1", VideoRecordStatus::Processing).await.unwrap();

        let expected = vec![(String::from("v1"), VideoRecordStatus::Processing)];
        assert_eq!(*pair.0.seen.lock().unwrap(), expected);
        assert_eq!(*pair.1.seen.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_pair_keeps_reporting_past_a_failure() {
        let pair = (
            Recorder { broken: true, ..Default::default() },
            Recorder::default(),
        );
        let result = pair.set_video_status("v1", VideoRecordStatus::Done).await;

        assert_eq!(result.unwrap_err().to_string(), "store offline");
        assert_eq!(pair.1.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_reporter_is_a_no_op() {
        let absent: Option<Recorder> = None;
        assert!(absent.set_video_status("v1", VideoRecordStatus::Error).await.is_ok());
    }
}
