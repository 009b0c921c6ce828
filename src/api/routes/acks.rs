//! Worker acknowledgment intake (POST /acks).
//!
//! The raw body is handed to the ack consumers and the response reflects
//! how the delivery was settled: 202 accepted, 400 rejected (do not
//! retry), 503 try again later.

use axum::{
    body::Bytes, extract::State, http::StatusCode, response::Json, routing::post, Router,
};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};
use crate::bus::{Delivery, DeliveryOutcome};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/acks", post(receive_ack))
        .with_state(state)
}

async fn receive_ack(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (delivery, settled) = Delivery::new(body.to_vec());

    if state.acks.send(delivery).await.is_err() {
        error!("Ack consumers are not running");
        return Err(ApiError::unavailable("ack consumers are not running"));
    }

    match settled.await {
        Ok(DeliveryOutcome::Ack) => {
            debug!("Ack accepted");
            Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": true }))))
        }
        Ok(DeliveryOutcome::Reject) => Err(ApiError::bad_request(
            "ack rejected: malformed or not routable",
        )),
        Ok(DeliveryOutcome::Requeue) => Err(ApiError::unavailable(
            "ack could not be recorded, retry later",
        )),
        Err(_) => Err(ApiError::unavailable("ack dropped before it was settled")),
    }
}
