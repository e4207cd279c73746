use std::{convert::Infallible, sync::Arc};

use warp::{
    reject::{self, Rejection},
    Filter,
};

use crate::{constants::SESSION_COOKIE, error::ServiceError};

use super::jwt::{verify_jwt_session, SessionData};

impl reject::Reject for ServiceError {}

/// Resolves the session cookie, rejecting requests without a valid one.
pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::cookie::<String>(SESSION_COOKIE).and_then(move |session: String| {
        let secret = secret.clone();
        async move {
            verify_jwt_session(&session, &secret)
                .map(SessionData::from)
                .map_err(reject::custom)
        }
    })
}

/// Anonymous and invalid sessions both resolve to `None`.
pub fn with_possible_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(move |session: Option<String>| {
        session
            .and_then(|token| verify_jwt_session(&token, &secret).ok())
            .map(SessionData::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        jwt::generate_jwt_session,
        schema::{User, UserRole},
    };

    const SECRET: &str = "middleware-secret";

    fn token() -> String {
        let user = User {
            id: 3,
            email: String::from("cook@example.com"),
            username: String::from("cook"),
            first_name: String::from("Home"),
            last_name: String::from("Cook"),
            role: UserRole::User,
        };
        generate_jwt_session(&user, SECRET, 1).unwrap()
    }

    #[tokio::test]
    async fn session_filter_resolves_cookie() {
        let filter = with_session(Arc::from(SECRET));

        let session = warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}={}", token()))
            .filter(&filter)
            .await
            .unwrap();

        assert_eq!(session.user_id, 3);
        assert!(!session.is_admin);
    }

    #[tokio::test]
    async fn session_filter_rejects_anonymous_requests() {
        let filter = with_session(Arc::from(SECRET));

        assert!(warp::test::request().filter(&filter).await.is_err());
        assert!(warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}=forged"))
            .filter(&filter)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn possible_session_degrades_to_none() {
        let filter = with_possible_session(Arc::from(SECRET));

        let anonymous = warp::test::request().filter(&filter).await.unwrap();
        assert!(anonymous.is_none());

        let forged = warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}=forged"))
            .filter(&filter)
            .await
            .unwrap();
        assert!(forged.is_none());

        let known = warp::test::request()
            .header("cookie", format!("{SESSION_COOKIE}={}", token()))
            .filter(&filter)
            .await
            .unwrap();
        assert_eq!(known.map(|s| s.username), Some(String::from("cook")));
    }
}
