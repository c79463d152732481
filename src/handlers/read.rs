use super::AppState;
use crate::{Result, read::AlignedRead, types::ReadQuery};
use axum::{
    Json,
    extract::{Path, Query, State},
};

pub async fn get_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<AlignedRead>> {
    let read = state.engine.load_read(&id, query).await?;
    Ok(Json(read))
}
