use axum::{Router, middleware};

use crate::state::AppState;
use crate::{auth, basket, order, product, session, utils};

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .merge(product::routes::get_routes())
        .merge(basket::routes::get_routes())
        .merge(order::routes::get_routes())
        .merge(auth::routes::get_routes())
        .with_state(state.clone());

    Router::new()
        .nest("/api", routes)
        .fallback(utils::handler_404)
        .layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            session::session_layer,
        ))
        .layer(middleware::from_fn(utils::print_req_res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use crate::config::Config;
    use crate::session::{SESSION_COOKIE, SessionUser};
    use axum::{
        body::Body,
        http::{Request, Response, StatusCode, header},
    };
    use diesel_async::AsyncPgConnection;
    use diesel_async::pooled_connection::AsyncDieselConnectionManager;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    // The pool never connects; these requests are answered before any query.
    fn test_state() -> AppState {
        let config = Config::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost/unused".to_owned())
        })
        .unwrap();
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);
        let pool = utils::types::Pool::builder().build_unchecked(manager);
        AppState::new(pool, config)
    }

    fn login(state: &AppState, role: Role) -> Uuid {
        let session_id = Uuid::new_v4();
        state.sessions.update(session_id, |data| {
            data.user = Some(SessionUser {
                id: Uuid::new_v4(),
                email: "someone@example.com".into(),
                role,
            })
        });
        session_id
    }

    fn request(method: &str, uri: &str, session: Option<Uuid>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = session {
            builder = builder.header(header::COOKIE, format!("{SESSION_COOKIE}={id}"));
        }
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_owned()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_path_falls_back_to_404() {
        let response = router(test_state())
            .oneshot(request("GET", "/nowhere", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_basket_is_summarized_without_the_database() {
        let response = router(test_state())
            .oneshot(request("GET", "/api/basket", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["products_count"], 0);
        assert!(body["basket"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn removing_from_basket_updates_the_session() {
        let state = test_state();
        let session_id = Uuid::new_v4();
        state.sessions.update(session_id, |data| {
            data.basket.add(7);
            data.basket.add(7);
            data.basket.add(3);
        });

        let response = router(state.clone())
            .oneshot(request(
                "POST",
                "/api/basket/change",
                Some(session_id),
                Some(r#"{"pk": 7, "action": "remove"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["products"], serde_json::json!([7, 3]));
        assert_eq!(body["products_count"], 2);
        assert_eq!(state.sessions.load(&session_id).unwrap().basket.len(), 2);
    }

    #[tokio::test]
    async fn empty_basket_submission_is_rejected_before_persistence() {
        let state = test_state();

        let response = router(state.clone())
            .oneshot(request("POST", "/api/basket", None, Some("{}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["errors"]["non_field"][0], "The basket is empty.");
        assert!(body["errors"]["fields"]["first_name"].is_array());
        assert!(body["errors"]["fields"]["email"].is_array());
        assert!(body["errors"]["fields"]["phone"].is_array());
    }

    #[tokio::test]
    async fn logged_in_user_with_empty_basket_only_sees_the_basket_error() {
        let state = test_state();
        let session_id = login(&state, Role::Customer);

        let response = router(state)
            .oneshot(request("POST", "/api/basket", Some(session_id), Some("{}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["errors"]["non_field"][0], "The basket is empty.");
        assert!(body["errors"].get("fields").is_none());
    }

    #[tokio::test]
    async fn malformed_bodies_get_a_json_400() {
        let state = test_state();

        for (uri, body) in [
            ("/api/basket/change", r#"{"pk": 7, "action": "drop"}"#),
            ("/api/basket/change", r#"{"action": "add"}"#),
            ("/api/basket", "not json"),
            ("/api/auth/login", r#"{"email": 5}"#),
        ] {
            let response = router(state.clone())
                .oneshot(request("POST", uri, None, Some(body)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri} {body}");
            assert_eq!(
                response.headers()[header::CONTENT_TYPE],
                "application/json",
                "{uri} {body}"
            );

            let json = json_body(response).await;
            assert!(
                json["error"].as_str().unwrap().starts_with("Malformed payload"),
                "{uri} {body}: {json}"
            );
        }
    }

    #[tokio::test]
    async fn staff_product_payloads_are_validated_before_the_database() {
        let state = test_state();
        let session_id = login(&state, Role::Staff);

        let response = router(state.clone())
            .oneshot(request(
                "POST",
                "/api/products",
                Some(session_id),
                Some(r#"{"name": " ", "category": "boats", "price": "100000000"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["errors"]["fields"]["name"][0], "This field is required.");
        assert_eq!(
            body["errors"]["fields"]["price"][0],
            "Ensure that there are no more than 8 digits before the decimal point."
        );

        let response = router(state)
            .oneshot(request(
                "POST",
                "/api/orders",
                Some(session_id),
                Some(r#"{"user_id": "not-a-uuid"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn staff_actions_need_a_login() {
        let response = router(test_state())
            .oneshot(request("POST", "/api/orders/1/deliver", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn staff_actions_refuse_customers() {
        let state = test_state();
        let session_id = login(&state, Role::Customer);

        for (method, uri) in [
            ("POST", "/api/orders/1/cancel"),
            ("DELETE", "/api/products/1"),
            ("DELETE", "/api/orders/1/products/2"),
        ] {
            let response = router(state.clone())
                .oneshot(request(method, uri, Some(session_id), None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn order_list_requires_login() {
        let response = router(test_state())
            .oneshot(request("GET", "/api/orders", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn current_user_comes_from_the_session() {
        let state = test_state();
        let session_id = login(&state, Role::Staff);

        let response = router(state)
            .oneshot(request("GET", "/api/users/me", Some(session_id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["role"], "staff");
        assert_eq!(body["email"], "someone@example.com");
    }

    #[tokio::test]
    async fn logout_drops_the_session() {
        let state = test_state();
        let session_id = login(&state, Role::Customer);

        let response = router(state.clone())
            .oneshot(request("POST", "/api/auth/logout", Some(session_id), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(state.sessions.load(&session_id).is_none());
    }
}
