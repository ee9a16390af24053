use common::TrackDocument;
use serde::{Deserialize, Serialize};

/// Hits of a search, first page only.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TrackSearchResponse {
    pub tracks: Vec<TrackDocument>,
}

/// Query parameters for title autocompletion.
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestQuery {
    /// Case-insensitive title prefix.
    pub prefix: String,
    /// Maximum number of titles (1-50, default 10).
    pub limit: Option<usize>,
}

impl SuggestQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(10).clamp(1, 50)
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SuggestResponse {
    #[schema(example = json!(["Moonlight Drive", "Moon River"]))]
    pub titles: Vec<String>,
}
