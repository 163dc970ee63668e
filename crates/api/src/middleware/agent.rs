//! Shared-secret authentication extractor for agent-facing handlers.
//!
//! Print agents are machines, not users, and authenticate on a separate
//! trust boundary: a bearer secret common to the fleet plus a
//! self-identifying `X-Agent-Id` header. The queue engine only ever sees
//! the agent id; every ownership check is keyed on it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use parkprint_core::error::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the agent's self-assigned identifier.
const AGENT_ID_HEADER: &str = "x-agent-id";

/// Authenticated print agent extracted from the fleet token and
/// `X-Agent-Id` header.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    /// Opaque agent identifier, recorded as `claimed_by` on claimed jobs.
    pub agent_id: String,
}

impl FromRequestParts<AppState> for AgentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        // Constant secret comparison is fine here: the token is fleet-wide
        // config, not per-agent credentials.
        if token != state.config.agent_token {
            return Err(AppError::Core(CoreError::Unauthorized(
                "Invalid agent token".into(),
            )));
        }

        let agent_id = parts
            .headers
            .get(AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing X-Agent-Id header".into(),
                ))
            })?;

        Ok(AgentIdentity {
            agent_id: agent_id.to_string(),
        })
    }
}
