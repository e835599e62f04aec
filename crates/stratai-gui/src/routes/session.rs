use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
};
use std::convert::Infallible;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "stratai_session";

/// Browser session id read from the `stratai_session` cookie; a new id is
/// minted when the cookie is absent.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub id: String,
    pub fresh: bool,
}

impl SessionCookie {
    fn from_headers(parts: &Parts) -> Option<String> {
        parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == SESSION_COOKIE && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string())
    }

    /// `Set-Cookie` value to send back, only for newly minted ids.
    pub fn set_cookie(&self) -> Option<HeaderValue> {
        if !self.fresh {
            return None;
        }
        HeaderValue::from_str(&format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            self.id
        ))
        .ok()
    }

    pub fn expire() -> HeaderValue {
        HeaderValue::from_static("stratai_session=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax")
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionCookie
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match Self::from_headers(parts) {
            Some(id) => SessionCookie { id, fresh: false },
            None => SessionCookie {
                id: Uuid::new_v4().to_string(),
                fresh: true,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(cookie: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn reads_existing_cookie() {
        let mut parts = parts(Some("theme=dark; stratai_session=abc-123"));
        let session = SessionCookie::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(session.id, "abc-123");
        assert!(!session.fresh);
        assert!(session.set_cookie().is_none());
    }

    #[tokio::test]
    async fn mints_id_when_missing() {
        let mut parts = parts(None);
        let session = SessionCookie::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(session.fresh);
        let cookie = session.set_cookie().unwrap();
        assert!(cookie.to_str().unwrap().starts_with("stratai_session="));
    }
}
