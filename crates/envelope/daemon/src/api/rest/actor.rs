//! Request context supplied by the upstream auth proxy.

use crate::error::ApiError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap};
use envelope_types::Actor;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The authenticated envelope owner.
#[derive(Debug, Clone)]
pub struct OwnerActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for OwnerActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = header(&parts.headers, TENANT_HEADER)?;
        let actor = header(&parts.headers, ACTOR_HEADER)?;
        Ok(OwnerActor(Actor::new(tenant, actor)))
    }
}

fn header(headers: &HeaderMap, name: &str) -> Result<String, ApiError> {
    let value = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();
    if value.is_empty() {
        return Err(ApiError::Unauthenticated(format!("missing {} header", name)));
    }
    Ok(value.to_string())
}

/// What the signer's client looked like, as forwarded by the proxy.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let text = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        // First hop of X-Forwarded-For is the client.
        let ip_address = text("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .filter(|v| !v.is_empty())
            .or_else(|| text("x-real-ip"));
        Ok(ClientContext {
            ip_address,
            user_agent: text("user-agent"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn owner(req: Request<()>) -> Result<OwnerActor, ApiError> {
        let (mut parts, _) = req.into_parts();
        OwnerActor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn owner_needs_both_headers() {
        let ok = Request::builder()
            .header(TENANT_HEADER, "acme")
            .header(ACTOR_HEADER, "alice")
            .body(())
            .unwrap();
        let actor = owner(ok).await.unwrap().0;
        assert_eq!(actor.tenant_id.0, "acme");
        assert_eq!(actor.actor_id, "alice");

        let missing = Request::builder()
            .header(TENANT_HEADER, "acme")
            .body(())
            .unwrap();
        assert!(matches!(owner(missing).await, Err(ApiError::Unauthenticated(_))));
    }

    #[tokio::test]
    async fn client_ip_is_the_first_forwarded_hop() {
        let req = Request::builder()
            .header("x-forwarded-for", "198.51.100.4, 10.0.0.1")
            .header("user-agent", "Mozilla/5.0 (iPhone)")
            .body(())
            .unwrap();
        let (mut parts, _) = req.into_parts();
        let ctx = ClientContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.ip_address.as_deref(), Some("198.51.100.4"));
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0 (iPhone)"));
    }
}
