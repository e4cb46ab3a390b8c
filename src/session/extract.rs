use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use super::store::{SessionData, SessionStore, SessionUser};
use crate::utils::AppError;

pub const SESSION_COOKIE: &str = "sessionid";

/// Id of the request's session. Shared so a rotated id reaches the layer.
#[derive(Clone)]
struct SessionHandle {
    id: Arc<Mutex<Uuid>>,
    store: SessionStore,
}

impl SessionHandle {
    fn id(&self) -> Uuid {
        *self.id.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_id(&self, id: Uuid) {
        *self.id.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = id;
    }
}

/// Assigns a session id to every request. The cookie is issued when a new or
/// rotated session ended up holding data.
pub async fn session_layer(
    State(store): State<SessionStore>,
    mut req: Request,
    next: Next,
) -> Response {
    let known = cookie_value(req.headers(), SESSION_COOKIE)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .filter(|id| store.contains(id));

    let handle = SessionHandle {
        id: Arc::new(Mutex::new(known.unwrap_or_else(Uuid::new_v4))),
        store: store.clone(),
    };
    req.extensions_mut().insert(handle.clone());

    let mut response = next.run(req).await;

    let id = handle.id();
    if known != Some(id) && store.contains(&id) {
        match HeaderValue::from_str(&session_cookie(&store, id)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "failed to build session cookie"),
        }
    }

    response
}

fn session_cookie(store: &SessionStore, id: Uuid) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        store.ttl().num_seconds()
    );
    if store.secure_cookie() {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

/// The current request's session.
pub struct Session {
    handle: SessionHandle,
}

impl Session {
    #[cfg(test)]
    pub(crate) fn new(store: SessionStore, id: Uuid) -> Self {
        Session {
            handle: SessionHandle {
                id: Arc::new(Mutex::new(id)),
                store,
            },
        }
    }

    pub fn data(&self) -> SessionData {
        self.handle.store.load(&self.handle.id()).unwrap_or_default()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.data().user
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        self.handle.store.update(self.handle.id(), f)
    }

    /// Keeps the data but moves it under a new id, so an id known before
    /// login is worthless afterwards.
    pub fn cycle(&self) {
        let id = self.handle.store.cycle(&self.handle.id());
        self.handle.set_id(id);
    }

    /// Drops everything stored for this session.
    pub fn flush(&self) {
        self.handle.store.remove(&self.handle.id());
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let handle = parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_owned()))?;

        Ok(Session { handle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::StatusCode, middleware, routing::get};
    use chrono::Duration;
    use tower::ServiceExt;

    fn app(store: SessionStore) -> Router {
        Router::new()
            .route("/peek", get(|session: Session| async move { session.data().basket.len().to_string() }))
            .route(
                "/touch",
                get(|session: Session| async move {
                    session.update(|data| data.basket.add(1));
                    StatusCode::NO_CONTENT
                }),
            )
            .route(
                "/login",
                get(|session: Session| async move {
                    session.cycle();
                    session.update(|data| data.basket.add(9));
                    StatusCode::NO_CONTENT
                }),
            )
            .layer(middleware::from_fn_with_state(store, session_layer))
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; sessionid=abc ;x=1"));

        assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some("abc"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[tokio::test]
    async fn cookie_is_only_issued_when_data_is_stored() {
        let store = SessionStore::new(Duration::hours(1), false);

        let peek = app(store.clone())
            .oneshot(axum::http::Request::builder().uri("/peek").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(peek.headers().get(SET_COOKIE).is_none());

        let touch = app(store.clone())
            .oneshot(axum::http::Request::builder().uri("/touch").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let cookie = touch.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("sessionid="));
        assert!(cookie.contains("HttpOnly"));
    }

    #[tokio::test]
    async fn known_cookie_reuses_the_session() {
        let store = SessionStore::new(Duration::hours(1), false);
        let id = Uuid::new_v4();
        store.update(id, |data| {
            data.basket.add(5);
            data.basket.add(6);
        });

        let response = app(store)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/peek")
                    .header(COOKIE, format!("sessionid={id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = http_body_util::BodyExt::collect(response.into_body())
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(&body[..], b"2");
    }

    #[tokio::test]
    async fn login_rotates_the_session_id_and_keeps_the_data() {
        let store = SessionStore::new(Duration::hours(1), false);
        let old = Uuid::new_v4();
        store.update(old, |data| data.basket.add(5));

        let response = app(store.clone())
            .oneshot(
                axum::http::Request::builder()
                    .uri("/login")
                    .header(COOKIE, format!("sessionid={old}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        let new = cookie
            .strip_prefix("sessionid=")
            .and_then(|rest| rest.split(';').next())
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .unwrap();

        assert_ne!(new, old);
        assert!(store.load(&old).is_none());
        assert_eq!(store.load(&new).unwrap().basket.product_ids(), &[5, 9]);
    }
}
