//! Caller identity extractors.
//!
//! The proxy in front of this server authenticates the caller and forwards
//! who they are in two headers:
//!
//! - `x-user-id` - numeric user id
//! - `x-user-role` - `user` or `admin` (defaults to `user` when absent)
//!
//! Handlers ask for [`RequireUser`] or [`RequireAdmin`]; missing identity is
//! rejected with 401, a non-admin on an admin route with 403.

use axum::{extract::FromRequestParts, http::request::Parts};

use fakeshion_core::{UserId, UserRole};

use crate::error::{AppError, set_sentry_user};

/// Header carrying the authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role.
pub const ROLE_HEADER: &str = "x-user-role";

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>, AppError> {
    parts
        .headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| AppError::Unauthorized(format!("{name} is not valid text")))
        })
        .transpose()
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user: UserId,
    pub role: UserRole,
}

impl Identity {
    fn from_parts(parts: &Parts) -> Result<Self, AppError> {
        let user = header(parts, USER_HEADER)?
            .ok_or_else(|| AppError::Unauthorized("Please log in to access this resource".to_string()))?
            .trim()
            .parse::<i32>()
            .map(UserId::new)
            .map_err(|_| AppError::Unauthorized(format!("{USER_HEADER} must be a user id")))?;

        let role = header(parts, ROLE_HEADER)?
            .map(|r| r.trim().parse::<UserRole>())
            .transpose()
            .map_err(AppError::Unauthorized)?
            .unwrap_or_default();

        set_sentry_user(&user);
        Ok(Self { user, role })
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Extractor that requires an authenticated caller of any role.
///
/// # Example
///
/// ```rust,ignore
/// async fn my_orders(RequireUser(me): RequireUser) -> impl IntoResponse {
///     format!("orders for {}", me.user)
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub Identity);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_parts(parts).map(Self)
    }
}

/// Extractor that requires an authenticated admin.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub Identity);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_parts(parts)?;
        if !identity.is_admin() {
            return Err(AppError::Forbidden(format!(
                "Role ({}) is not allowed to access this resource",
                identity.role
            )));
        }
        Ok(Self(identity))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/me/orders");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_require_user_reads_headers() {
        let mut p = parts(&[(USER_HEADER, "42")]);
        let RequireUser(identity) = RequireUser::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(identity.user, UserId::new(42));
        assert_eq!(identity.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_missing_or_bad_identity_is_unauthorized() {
        for headers in [vec![], vec![(USER_HEADER, "abc")], vec![(USER_HEADER, "1"), (ROLE_HEADER, "root")]] {
            let mut p = parts(&headers);
            let err = RequireUser::from_request_parts(&mut p, &()).await.unwrap_err();
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_require_admin_rejects_plain_user() {
        let mut p = parts(&[(USER_HEADER, "7"), (ROLE_HEADER, "user")]);
        let err = RequireAdmin::from_request_parts(&mut p, &()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let mut p = parts(&[(USER_HEADER, "7"), (ROLE_HEADER, "admin")]);
        let RequireAdmin(admin) = RequireAdmin::from_request_parts(&mut p, &()).await.unwrap();
        assert!(admin.is_admin());
    }
}
