use super::state::ServerState;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};
use std::collections::HashMap;
use tracing::debug;

/// The upload principal: one provisioned recording device.
#[derive(Debug, Clone)]
pub struct UploadSource {
    pub source_id: String,
}

pub const HEADER_SOURCE_TOKEN_KEY: &str = "Authorization";
pub const QUERY_SOURCE_TOKEN_KEY: &str = "token";

/// Maps opaque device tokens to source ids. Tokens are provisioned by the
/// operator in the config file; there is no self-service enrollment.
pub struct SourceDirectory {
    tokens: HashMap<String, String>,
}

impl SourceDirectory {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        SourceDirectory { tokens }
    }

    pub fn resolve(&self, token: &str) -> Option<UploadSource> {
        self.tokens.get(token).map(|source_id| UploadSource {
            source_id: source_id.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

pub enum SourceExtractionError {
    /// No token anywhere in the request.
    MissingToken,
    /// A token was presented but no source is provisioned for it.
    AccessDenied,
}

impl IntoResponse for SourceExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            SourceExtractionError::MissingToken => StatusCode::UNAUTHORIZED.into_response(),
            SourceExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn extract_token_from_headers(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(HEADER_SOURCE_TOKEN_KEY)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).to_owned())
}

// Devices in the field still send `?token=`, so the query string stays an
// accepted fallback to the Authorization header.
fn extract_token_from_query(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key != QUERY_SOURCE_TOKEN_KEY {
            return None;
        }
        urlencoding::decode(value).ok().map(|value| value.into_owned())
    })
}

impl FromRequestParts<ServerState> for UploadSource {
    type Rejection = SourceExtractionError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token_from_headers(parts)
            .or_else(|| extract_token_from_query(parts))
            .ok_or(SourceExtractionError::MissingToken)?;

        match ctx.source_directory.resolve(&token) {
            Some(source) => {
                debug!("Resolved upload token to source '{}'", source.source_id);
                Ok(source)
            }
            None => {
                debug!("No source provisioned for the presented token");
                Err(SourceExtractionError::AccessDenied)
            }
        }
    }
}
