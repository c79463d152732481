use super::AppState;
use crate::{
    Result,
    read::AlignedRead,
    track::Cancellation,
    types::{Track, TrackRequest},
};
use axum::{
    Json,
    extract::{Path, State},
};

pub async fn post_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TrackRequest>,
) -> Result<Json<Track<AlignedRead>>> {
    let track = state
        .engine
        .get_track(&id, body, &Cancellation::new())
        .await?;
    Ok(Json(track))
}
