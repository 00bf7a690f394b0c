use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use framepipe::adapters::http::{ImageServiceClient, NotificationClient};
use framepipe::adapters::local::{FsArtifactStore, MemoryVideoStore, VideoRecord};
use framepipe::av::FfmpegExtractor;
use framepipe::ports::storage::ArtifactUploader;
use framepipe::{
    BoxError, OrchestratorService, PipelineConfig, QueueConfig, QueueStatus, ServerConfig,
    WorkQueue, WorkerService,
};
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use serde_json::json;
use std::io;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};
use tokio_util::io::StreamReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Local records always; the image service's video-zip record when configured.
type VideoReporter = (Arc<MemoryVideoStore>, Option<ImageServiceClient>);
type Pipeline = WorkerService<FfmpegExtractor, Arc<dyn ArtifactUploader>, VideoReporter>;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<OrchestratorService<Pipeline>>,
    videos: Arc<MemoryVideoStore>,
    upload_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    video: VideoRecord,
    job_id: String,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server = ServerConfig::from_env();
    let pipeline = PipelineConfig::from_env();
    let queue_config = QueueConfig::from_env();

    tokio::fs::create_dir_all(&server.upload_dir).await?;

    let image_service = server
        .image_service_url
        .as_deref()
        .map(ImageServiceClient::new)
        .transpose()?;

    let uploader: Arc<dyn ArtifactUploader> = match &image_service {
        Some(client) => {
            info!("Uploading frames to image service at {}", client.base_url());
            Arc::new(client.clone())
        }
        None => {
            info!("Storing frames under {:?}", server.artifact_dir);
            Arc::new(FsArtifactStore::new(server.artifact_dir.clone()))
        }
    };
    let videos = Arc::new(MemoryVideoStore::new());

    let frame_rate = pipeline.frame_rate;
    let mut worker = WorkerService::new(
        FfmpegExtractor::from_config(&pipeline),
        uploader,
        (videos.clone(), image_service),
        pipeline,
    );
    if let Some(url) = &server.notification_service_url {
        worker = worker.with_notifier(Arc::new(NotificationClient::new(url.clone())?));
    }

    let queue = WorkQueue::new(Arc::new(worker), queue_config);
    let state = AppState {
        orchestrator: Arc::new(OrchestratorService::new(queue, frame_rate)),
        videos,
        upload_dir: server.upload_dir.clone(),
    };

    let app = Router::new()
        // POST takes the uploading user's id, GET the video's id.
        .route("/videos/:id", get(get_video).post(upload_video))
        .route("/queue", get(queue_status))
        .route("/queue/retry", post(retry_failed))
        .layer(DefaultBodyLimit::disable())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", server.addr, server.port)).await?;
    info!("Listening at {}:{}", server.addr, server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}

// Accepts a multipart `file` field holding an mp4, stores it and queues it for extraction.
async fn upload_video(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::BadRequest("Missing file name".to_owned()))?;
        if !path_is_valid(&PathBuf::from(&file_name)) {
            return Err(ApiError::BadRequest("Invalid file name".to_owned()));
        }
        let path = state.upload_dir.join(stored_name(&file_name)?);

        info!("Saving new video to {:?}", path);
        stream_to_file(&path, field).await?;

        let video = state.videos.create(&user_id, path).await;
        let handle = state.orchestrator.submit(&video.uuid, &video.path).await;
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                video,
                job_id: handle.job_id,
            }),
        ));
    }

    Err(ApiError::BadRequest("No file uploaded".to_owned()))
}

async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoRecord>, ApiError> {
    state
        .videos
        .get(&video_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Video {} not found", video_id)))
}

async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.orchestrator.queue_status().await)
}

async fn retry_failed(State(state): State<AppState>) -> Json<serde_json::Value> {
    let retried = state.orchestrator.retry_failed().await;
    if retried > 0 {
        warn!("Retrying {} failed jobs", retried);
    }
    Json(json!({ "retried": retried }))
}

// `clip.mp4` is stored as `clip-1a2b.mp4` so repeated uploads never collide.
fn stored_name(file_name: &str) -> Result<String, ApiError> {
    let path = std::path::Path::new(file_name);
    let is_mp4 = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mp4"));
    if !is_mp4 {
        return Err(ApiError::Forbidden("Only .mp4 videos are accepted".to_owned()));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = &Uuid::new_v4().simple().to_string()[..4];
    Ok(format!("{}-{}.mp4", stem, suffix))
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &PathBuf, stream: S) -> Result<(), ApiError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<axum::BoxError>,
{
    async {
        let body_with_io_error = stream.map_err(io::Error::other);
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        file.flush().await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))
}

// An upload name must be a single plain file name.
fn path_is_valid(path: &PathBuf) -> bool {
    let mut components = path.components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}
