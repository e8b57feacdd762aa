//! Account MCP Tools
//!
//! Sign-in state and the locally cached snapshots tied to it.

use serde::Serialize;

use crate::service::ReadingsService;

/// Response for sign_in and sign_out
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub signed_in: bool,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub reading_count: usize,
    pub error_message: Option<String>,
}

/// Response for clear_cache
#[derive(Debug, Serialize)]
pub struct ClearCacheResponse {
    pub success: bool,
    pub signed_in: bool,
}

fn session_response(service: &ReadingsService, error_message: Option<String>) -> SessionResponse {
    SessionResponse {
        signed_in: service.session().is_signed_in(),
        user_id: service.session().current_user_id(),
        user_name: service.cached_user_name(),
        reading_count: service.readings().len(),
        error_message,
    }
}

/// Act as `user_id` from now on and load their readings
pub async fn sign_in(
    service: &ReadingsService,
    user_id: &str,
    display_name: Option<&str>,
) -> Result<SessionResponse, String> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err("User ID must not be empty".to_string());
    }

    let state = service.sign_in(user_id, display_name).await;
    Ok(session_response(service, state.error_message))
}

/// Sign out and drop every cached snapshot
pub fn sign_out(service: &ReadingsService) -> Result<SessionResponse, String> {
    service.sign_out();
    Ok(session_response(service, None))
}

/// Drop cached snapshots while staying signed in
pub fn clear_cache(service: &ReadingsService) -> Result<ClearCacheResponse, String> {
    service.clear_data();
    Ok(ClearCacheResponse {
        success: true,
        signed_in: service.session().is_signed_in(),
    })
}
