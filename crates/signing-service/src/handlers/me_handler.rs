use crate::errors::AuthError;
use crate::middleware::auth::PrincipalExt;
use crate::models::MeResponse;
use axum::{extract::Request, Json};
use tracing::instrument;

/// Handle the current-principal request
///
/// GET /api/v1/me
///
/// Requires `require_bearer`; echoes the authenticated principal.
#[instrument(name = "signing.me.get", skip_all)]
pub async fn handle_get_me(req: Request) -> Result<Json<MeResponse>, AuthError> {
    let principal = req.principal().ok_or_else(|| {
        tracing::error!(target: "signing.auth", "Principal missing, bearer middleware not applied");
        AuthError::Internal
    })?;

    Ok(Json(MeResponse {
        name: principal.name.clone(),
        roles: principal.roles.clone(),
        subject: principal.subject().map(str::to_string),
    }))
}
