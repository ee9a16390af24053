use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::config::AppConfig;
use crate::handlers;
use crate::state::AppState;

pub fn api_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .nest("/tracks", track_routes(config))
        .merge(upload_routes())
}

fn auth_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::auth::register))
        .routes(routes!(handlers::auth::login))
        .routes(routes!(handlers::auth::me))
}

fn user_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(handlers::users::get_user))
}

fn track_routes(config: &AppConfig) -> OpenApiRouter<AppState> {
    let upload = OpenApiRouter::new()
        .routes(routes!(handlers::tracks::upload_track))
        .layer(handlers::tracks::upload_body_limit(config.upload.max_size));

    OpenApiRouter::new()
        .routes(routes!(handlers::tracks::list_tracks))
        .routes(routes!(
            handlers::tracks::get_track,
            handlers::tracks::update_track,
            handlers::tracks::delete_track
        ))
        .routes(routes!(handlers::tracks::bind_locator))
        .routes(routes!(handlers::tracks::play_track))
        .routes(routes!(
            handlers::search::search_tracks,
            handlers::search::search_tracks_post
        ))
        .routes(routes!(handlers::search::suggest_titles))
        .merge(upload)
}

fn upload_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(
            handlers::uploads::upload_options,
            handlers::uploads::create_upload
        ))
        .routes(routes!(
            handlers::uploads::upload_offset_query,
            handlers::uploads::append_upload,
            handlers::uploads::download_upload
        ))
}
