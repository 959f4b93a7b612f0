//! Authentication and authorization: the access gate.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use base64::{Engine as _, engine::general_purpose};
use capstan_core::access::{Access, AccessGrant, Identity, credential_hash};

/// Decoded Basic credentials.
struct BasicCredentials {
    username: String,
    password: String,
}

/// Parse an Authorization header value into Basic credentials.
/// Per RFC 7617 the scheme is case-insensitive.
fn parse_basic_auth(value: &str) -> ApiResult<BasicCredentials> {
    let encoded = if value.len() >= 6 && value[..6].eq_ignore_ascii_case("basic ") {
        value[6..].trim()
    } else {
        return Err(ApiError::Unauthenticated(
            "authorization scheme must be Basic".to_string(),
        ));
    };

    let decoded = general_purpose::STANDARD.decode(encoded).map_err(|e| {
        ApiError::Unauthenticated(format!("invalid base64 in authorization header: {e}"))
    })?;
    let decoded = String::from_utf8(decoded).map_err(|_| {
        ApiError::Unauthenticated("authorization header is not valid UTF-8".to_string())
    })?;

    let (username, password) = decoded.split_once(':').ok_or_else(|| {
        ApiError::Unauthenticated("authorization header missing ':' separator".to_string())
    })?;

    if username.is_empty() {
        return Err(ApiError::Unauthenticated("empty username".to_string()));
    }

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

/// Authentication middleware.
///
/// A present Authorization header is validated here: a garbled header is a
/// 401, unknown credentials are a 403, a store failure during lookup is a
/// 401. On success an [`Identity`] lands in the request extensions. An absent
/// header passes through so the unauthenticated ping keeps working; handlers
/// that need an identity fail with 401 via [`require_identity`].
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|v| v.to_str().map(str::to_owned));

    if let Some(value) = header {
        let value = value.map_err(|_| {
            ApiError::Unauthenticated("authorization header is not valid ASCII".to_string())
        })?;
        let creds = parse_basic_auth(&value)?;

        let user = state
            .metadata
            .get_user(&creds.username)
            .await
            .map_err(|e| ApiError::LookupError(e.to_string()))?
            .ok_or_else(|| ApiError::Forbidden(creds.username.clone()))?;

        if credential_hash(&creds.password) != user.password_hash {
            return Err(ApiError::Forbidden(creds.username));
        }

        tracing::debug!(username = %user.username, "authenticated request");
        req.extensions_mut().insert(Identity {
            username: user.username,
            password_hash: user.password_hash,
        });
    }

    Ok(next.run(req).await)
}

/// Require an authenticated identity on the request.
pub fn require_identity(req: &Request) -> ApiResult<&Identity> {
    req.extensions()
        .get::<Identity>()
        .ok_or_else(|| ApiError::Unauthenticated("basic credentials required".to_string()))
}

/// Authorize a write to `namespace/repository`.
///
/// Write access requires the authenticated username to equal the namespace;
/// organization ownership is unimplemented.
pub fn authorize_write(
    identity: &Identity,
    namespace: &str,
    repository: &str,
) -> ApiResult<AccessGrant> {
    if identity.username != namespace {
        return Err(ApiError::NamespaceMismatch(format!(
            "user {} cannot write to namespace {}",
            identity.username, namespace
        )));
    }
    Ok(AccessGrant {
        identity: identity.clone(),
        namespace: namespace.to_string(),
        repository: repository.to_string(),
        access: Access::Write,
    })
}

/// Authorize a read of `namespace/repository`.
///
/// Public repositories are readable by any authenticated identity; private
/// ones only by their owner.
pub fn authorize_read(
    identity: &Identity,
    namespace: &str,
    repository: &str,
    is_private: bool,
) -> ApiResult<AccessGrant> {
    if is_private && identity.username != namespace {
        return Err(ApiError::Unauthorized(format!(
            "repository {namespace}/{repository} is private"
        )));
    }
    Ok(AccessGrant {
        identity: identity.clone(),
        namespace: namespace.to_string(),
        repository: repository.to_string(),
        access: Access::Read,
    })
}
