//! Authentication schema and resolvers
//!
//! Sessions are stateless: a signed token embedding the user snapshot is
//! handed back in the response body and, on login, as an HTTP-only cookie.
//! There is no server-side session store and no logout transition; cookie
//! expiry is the only path back to anonymous.

use std::sync::Arc;

use actix_web::cookie::{
    time::{Duration, OffsetDateTime},
    Cookie,
};
use async_graphql::{
    Context, ErrorExtensions, InputObject, Object, Result as GraphQLResult, ResultExt,
    SimpleObject,
};

use crate::db::UserDirectory;
use crate::error::ApiError;
use crate::models::NewUser;
use crate::schema::user::{CreateUserInput, User};
use crate::security::{hash_password, verify_password, TokenService};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";
const SESSION_COOKIE_DAYS: i64 = 30;

/// Session token lifted off the incoming request's cookie by the transport
/// handler and made available to resolvers as context data.
#[derive(Debug, Clone, Default)]
pub struct SessionCookie(pub Option<String>);

#[derive(SimpleObject, Debug, Clone)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[derive(InputObject, Debug)]
pub struct LoginInput {
    #[graphql(validator(email))]
    pub email: String,
    #[graphql(secret)]
    pub password: String,
}

fn session_cookie(token: &str) -> Cookie<'static> {
    // Secure=false and no SameSite, matching the documented cookie contract.
    Cookie::build(SESSION_COOKIE, token.to_string())
        .http_only(true)
        .secure(false)
        .expires(OffsetDateTime::now_utc() + Duration::days(SESSION_COOKIE_DAYS))
        .finish()
}

#[derive(Default)]
pub struct AuthQuery;

#[Object]
impl AuthQuery {
    /// The authenticated user, answered from the token's embedded snapshot.
    /// The snapshot is as old as the token; callers needing freshness should
    /// use getUser.
    async fn me(&self, ctx: &Context<'_>) -> GraphQLResult<User> {
        let token = ctx
            .data_opt::<SessionCookie>()
            .and_then(|c| c.0.clone())
            .ok_or_else(|| {
                ApiError::Authentication("authentication token not found".to_string()).extend()
            })?;

        let tokens = ctx.data::<TokenService>()?;
        let claims = tokens.verify(&token).map_err(|_| {
            ApiError::Authentication("invalid authentication token".to_string()).extend()
        })?;

        Ok(claims.user)
    }
}

#[derive(Default)]
pub struct AuthMutation;

#[Object]
impl AuthMutation {
    async fn signup(
        &self,
        ctx: &Context<'_>,
        input: CreateUserInput,
    ) -> GraphQLResult<AuthPayload> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let tokens = ctx.data::<TokenService>()?;

        let record = directory
            .create(NewUser {
                name: input.name,
                email: input.email,
                password_hash: hash_password(&input.password).extend()?,
            })
            .await
            .extend()?;

        let user = User::from(record);
        let token = tokens.issue(&user).extend()?;

        Ok(AuthPayload { token, user })
    }

    async fn login(&self, ctx: &Context<'_>, input: LoginInput) -> GraphQLResult<AuthPayload> {
        let directory = ctx.data::<Arc<dyn UserDirectory>>()?;
        let tokens = ctx.data::<TokenService>()?;

        // Unknown email and bad password produce the same error; don't leak
        // which one it was.
        let record = directory
            .find_by_email(&input.email)
            .await
            .extend()?
            .ok_or_else(|| {
                ApiError::Authentication("invalid email or password".to_string()).extend()
            })?;

        if !verify_password(&input.password, &record.password_hash).extend()? {
            tracing::warn!(user_id = %record.id, "login rejected: password mismatch");
            return Err(
                ApiError::Authentication("invalid email or password".to_string()).extend(),
            );
        }

        let user = User::from(record);
        let token = tokens.issue(&user).extend()?;

        ctx.append_http_header("Set-Cookie", session_cookie(&token).to_string());

        Ok(AuthPayload { token, user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc.def.ghi");

        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "abc.def.ghi");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(false));
        assert!(cookie.same_site().is_none());

        let expires = cookie.expires_datetime().unwrap();
        let expected = OffsetDateTime::now_utc() + Duration::days(30);
        assert!((expires - expected).abs() < Duration::seconds(5));
    }
}
