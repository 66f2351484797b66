use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::catalog::RecordingId;
use crate::error::Error;
use crate::matcher::{AudioMatcher, Match};

/// Upload cap for `POST /match`; several minutes of 44.1 kHz stereo PCM.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    matcher: AudioMatcher,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub matched: bool,
    pub matches: Vec<Match>,
}

#[derive(Debug, Serialize)]
pub struct RecordingEntry {
    pub id: RecordingId,
    pub name: String,
}

/// Read-only query service over a loaded library.
pub fn router(matcher: AudioMatcher) -> Router {
    let state = AppState { matcher };

    Router::new()
        .route("/", get(health_check))
        .route("/recordings", get(list_recordings))
        .route("/match", post(match_audio))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

pub async fn serve(matcher: AudioMatcher, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let recordings = matcher.catalog().len();
    let app = router(matcher);

    info!(%addr, recordings, "server running");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Audio identification service is running"
}

async fn list_recordings(State(state): State<AppState>) -> Json<Vec<RecordingEntry>> {
    let entries = state
        .matcher
        .catalog()
        .iter()
        .map(|(id, name)| RecordingEntry {
            id,
            name: name.to_owned(),
        })
        .collect();
    Json(entries)
}

async fn match_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MatchResponse>, StatusCode> {
    while let Some(field) = multipart.next_field().await.map_err(|_| StatusCode::BAD_REQUEST)? {
        if field.name() != Some("audio") {
            continue;
        }
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;

        let matcher = state.matcher.clone();
        let outcome = tokio::task::spawn_blocking(move || matcher.identify_bytes(&data))
            .await
            .map_err(|e| {
                error!("match task failed: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        return match outcome {
            Ok(matches) => Ok(Json(MatchResponse {
                matched: !matches.is_empty(),
                matches,
            })),
            Err(Error::Audio(e)) => {
                error!("undecodable upload: {}", e);
                Err(StatusCode::UNPROCESSABLE_ENTITY)
            }
            Err(e) => {
                error!("audio processing error: {}", e);
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        };
    }

    Err(StatusCode::BAD_REQUEST)
}
