use super::AppState;
use crate::{
    Result,
    track::Cancellation,
    types::{ConsensusBase, ConsensusRequest, Track},
};
use axum::{
    Json,
    extract::{Path, State},
};

pub async fn post_consensus(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ConsensusRequest>,
) -> Result<Json<Track<ConsensusBase>>> {
    let track = state
        .engine
        .get_consensus(&id, body, &Cancellation::new())
        .await?;
    Ok(Json(track))
}
