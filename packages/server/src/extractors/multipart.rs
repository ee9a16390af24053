use axum::extract::{FromRequest, Multipart, Request};

use crate::error::AppError;

/// `multipart/form-data` body; a missing or malformed boundary becomes
/// `AppError::Validation`.
pub struct AppMultipart(pub Multipart);

impl<S> FromRequest<S> for AppMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Multipart::from_request(req, state)
            .await
            .map(AppMultipart)
            .map_err(|e| AppError::Validation(format!("Invalid multipart body: {}", e.body_text())))
    }
}
