use axum::{Json, extract::State};
use common::search::{SearchQuery, TrackSearchRequest};
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::JsonOrDefault;
use crate::extractors::query::AppQuery;
use crate::models::search::{SuggestQuery, SuggestResponse, TrackSearchResponse};
use crate::state::AppState;

async fn run_search(
    state: &AppState,
    request: &TrackSearchRequest,
) -> Result<Json<TrackSearchResponse>, AppError> {
    let query = SearchQuery::from_request(request, state.config.search.page_size)?;
    let tracks = state.indexer.search(&query).await?;
    Ok(Json(TrackSearchResponse { tracks }))
}

#[utoipa::path(
    get,
    path = "/search",
    tag = "Search",
    operation_id = "searchTracks",
    summary = "Search tracks",
    description = "Query DSL in the JSON body. Match clauses (exact, or fuzzy when `refine` \
        is set) are ANDed, `genre` and `format` filter, and results are sorted by duration \
        (descending unless `sort_by_duration_asc`). Returns the first page only. An empty \
        body matches every track. Results are eventually consistent with writes.",
    request_body = TrackSearchRequest,
    responses(
        (status = 200, description = "Matching tracks", body = TrackSearchResponse),
        (status = 400, description = "Unknown field or malformed query (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 502, description = "Search backend failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, request))]
pub async fn search_tracks(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    JsonOrDefault(request): JsonOrDefault<TrackSearchRequest>,
) -> Result<Json<TrackSearchResponse>, AppError> {
    run_search(&state, &request).await
}

/// `POST` variant for clients that cannot send a body with `GET`.
#[utoipa::path(
    post,
    path = "/search",
    tag = "Search",
    operation_id = "searchTracksPost",
    summary = "Search tracks (POST)",
    request_body = TrackSearchRequest,
    responses(
        (status = 200, description = "Matching tracks", body = TrackSearchResponse),
        (status = 400, description = "Unknown field or malformed query (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 502, description = "Search backend failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, request))]
pub async fn search_tracks_post(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    JsonOrDefault(request): JsonOrDefault<TrackSearchRequest>,
) -> Result<Json<TrackSearchResponse>, AppError> {
    run_search(&state, &request).await
}

#[utoipa::path(
    get,
    path = "/search/suggest",
    tag = "Search",
    operation_id = "suggestTitles",
    summary = "Autocomplete track titles",
    params(SuggestQuery),
    responses(
        (status = 200, description = "Distinct matching titles", body = SuggestResponse),
        (status = 400, description = "Missing prefix or malformed limit (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 502, description = "Search backend failure (UPSTREAM_FAILURE)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query), fields(prefix = %query.prefix))]
pub async fn suggest_titles(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<SuggestQuery>,
) -> Result<Json<SuggestResponse>, AppError> {
    let titles = state.indexer.suggest(&query.prefix, query.limit()).await?;
    Ok(Json(SuggestResponse { titles }))
}
