//! Staff identity extraction for the authenticated API.
//!
//! The engine trusts an upstream session layer to have authenticated the
//! caller; it receives the verified identity as three headers and only
//! authorizes against it. Missing or garbled headers are a 401 before any
//! handler runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use shopfloor_core::domain::principal::{Principal, Role, ShopId, UserId};

pub const USER_ID_HEADER: &str = "x-shopfloor-user-id";
pub const ROLE_HEADER: &str = "x-shopfloor-role";
pub const SHOP_ID_HEADER: &str = "x-shopfloor-shop-id";

/// The verified staff identity behind every `/api/v1` request.
pub struct AuthPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthPrincipal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = required_header(parts, USER_ID_HEADER)?;
        let role_raw = required_header(parts, ROLE_HEADER)?;
        let shop_id = required_header(parts, SHOP_ID_HEADER)?;

        let role = role_raw
            .parse::<Role>()
            .map_err(|_| unauthorized(format!("header `{ROLE_HEADER}` is not a known role")))?;

        Ok(AuthPrincipal(Principal { id: UserId(user_id), role, shop_id: ShopId(shop_id) }))
    }
}

fn required_header(parts: &Parts, name: &str) -> Result<String, (StatusCode, Json<Value>)> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| unauthorized(format!("header `{name}` is missing")))
}

fn unauthorized(detail: String) -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": detail })))
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRequestParts;
    use axum::http::Request;

    use shopfloor_core::domain::principal::Role;

    use super::AuthPrincipal;

    async fn extract(request: Request<()>) -> Result<AuthPrincipal, ()> {
        let (mut parts, _) = request.into_parts();
        AuthPrincipal::from_request_parts(&mut parts, &()).await.map_err(|_| ())
    }

    #[tokio::test]
    async fn complete_headers_yield_a_principal() {
        let request = Request::builder()
            .header("x-shopfloor-user-id", "user-andy")
            .header("x-shopfloor-role", "ADVISOR")
            .header("x-shopfloor-shop-id", "shop-occono")
            .body(())
            .unwrap();

        let AuthPrincipal(principal) = extract(request).await.expect("principal");
        assert_eq!(principal.id.0, "user-andy");
        assert_eq!(principal.role, Role::Advisor);
        assert_eq!(principal.shop_id.0, "shop-occono");
    }

    #[tokio::test]
    async fn missing_or_unknown_headers_are_rejected() {
        let missing = Request::builder()
            .header("x-shopfloor-user-id", "user-andy")
            .header("x-shopfloor-role", "ADVISOR")
            .body(())
            .unwrap();
        assert!(extract(missing).await.is_err());

        let unknown_role = Request::builder()
            .header("x-shopfloor-user-id", "user-andy")
            .header("x-shopfloor-role", "MANAGER")
            .header("x-shopfloor-shop-id", "shop-occono")
            .body(())
            .unwrap();
        assert!(extract(unknown_role).await.is_err());
    }
}
