pub mod auth;
pub mod config;
pub mod coordinator;
pub mod database;
pub mod document;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod indexer;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod tracks;

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trackvault API",
        version = "1.0.0",
        description = "Music track storage with resumable uploads and search"
    ),
    tags(
        (name = "Auth", description = "Registration, login and the current session"),
        (name = "Users", description = "Public user profiles"),
        (name = "Tracks", description = "Track metadata and coordinated uploads"),
        (name = "Search", description = "Track search and title autocompletion"),
        (name = "Uploads", description = "Resumable uploads (tus 1.0.0)"),
    ),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(routes::api_routes(&state.config))
        .split_for_parts();

    router
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
}
