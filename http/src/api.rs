// SPDX-License-Identifier: Apache-2.0

//! The one HTTP/JSON endpoint spec.md §6 describes: `GET`/`POST
//! .../config/{dpid}`. Unauthenticated by design, not omission — spec.md's
//! Non-goals explicitly exclude authentication on the management API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use ofslicer::{Dpid, MacAddr, Tuple};

use crate::controller::{ChangeSet, Controller, LearnRequest};

pub fn build_router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/slicer/api/v1/config/:dpid", get(get_config).post(post_config))
        .with_state(controller)
}

async fn get_config(Path(dpid): Path<String>, State(controller): State<Arc<Controller>>) -> impl IntoResponse {
    let dpid = match Dpid::from_hex(&dpid) {
        Ok(d) => d,
        Err(e) => return (StatusCode::NOT_FOUND, e.msg).into_response(),
    };
    match controller.get_config(dpid).await {
        Some(config) => Json(config).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Wire shape of a `POST` body. Each field is optional; an absent field
/// means "leave this alone" (spec.md §4.10/§6).
#[derive(Debug, Deserialize, Default)]
struct PostBody {
    #[serde(default)]
    disused: Vec<Tuple>,
    #[serde(default)]
    slices: Vec<Vec<Tuple>>,
    #[serde(default)]
    learn: Option<LearnBody>,
}

#[derive(Debug, Deserialize)]
struct LearnBody {
    mac: String,
    tuple: Tuple,
    timeout: Option<u32>,
}

async fn post_config(
    Path(dpid): Path<String>,
    State(controller): State<Arc<Controller>>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let dpid = match Dpid::from_hex(&dpid) {
        Ok(d) => d,
        Err(e) => return (StatusCode::BAD_REQUEST, e.msg).into_response(),
    };
    let parsed: PostBody = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => return (StatusCode::BAD_REQUEST, format!("malformed request body: {e}")).into_response(),
    };
    let learn = match parsed.learn {
        Some(l) => match l.mac.parse::<MacAddr>() {
            Ok(mac) => Some(LearnRequest {
                mac,
                tuple: l.tuple,
                timeout: l.timeout,
            }),
            Err(e) => return (StatusCode::BAD_REQUEST, e.msg).into_response(),
        },
        None => None,
    };

    let change = ChangeSet {
        disused: parsed.disused,
        slices: parsed.slices,
        learn,
    };
    let config = controller.apply(dpid, change).await;
    Json(config).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::LoggingDriver;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(Arc::new(Controller::new(Arc::new(LoggingDriver))))
    }

    #[tokio::test]
    async fn get_on_unknown_datapath_is_404() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .uri("/slicer/api/v1/config/0000000000000001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_then_get_round_trips_a_drop_slice() {
        let app = app();
        let post = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slicer/api/v1/config/0000000000000001")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"slices":[[[1]]]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(post.status(), StatusCode::OK);

        let get = app
            .oneshot(
                Request::builder()
                    .uri("/slicer/api/v1/config/0000000000000001")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(get.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(get.into_body(), usize::MAX).await.unwrap();
        let config: Vec<Vec<Tuple>> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(config, vec![vec![Tuple::untagged(1)]]);
    }

    #[tokio::test]
    async fn malformed_json_is_400() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slicer/api/v1/config/0000000000000001")
                    .header("content-type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_disused_retracts_a_tuple() {
        let app = app();
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slicer/api/v1/config/0000000000000001")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"slices":[[[1],[2]]]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        let post = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slicer/api/v1/config/0000000000000001")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"disused":[[1]]}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(post.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(post.into_body(), usize::MAX).await.unwrap();
        let config: Vec<Vec<Tuple>> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(config, vec![vec![Tuple::untagged(2)]]);
    }

    #[tokio::test]
    async fn post_learn_with_a_bad_mac_is_400() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/slicer/api/v1/config/0000000000000001")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"learn":{"mac":"not-a-mac","tuple":[1]}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_dpid_on_get_is_404() {
        let resp = app()
            .oneshot(
                Request::builder()
                    .uri("/slicer/api/v1/config/not-hex")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
