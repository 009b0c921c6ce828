//! Bus that hands tasks to stage workers over HTTP.
//!
//! Each queue maps to a worker endpoint; a task is published by POSTing its
//! JSON body there. The task id travels as `X-Correlation-Id`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::MessageBus;
use crate::error::{OrchestratorError, Result};
use crate::pipeline::TaskMessage;

pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

pub struct HttpBus {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpBus {
    /// Create a bus publishing to `endpoints` (queue name → worker URL).
    pub fn new(endpoints: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrchestratorError::Publish(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoints: endpoints
                .into_iter()
                .map(|(queue, url)| (queue, url.trim_end_matches('/').to_string()))
                .collect(),
        })
    }

    pub fn endpoint(&self, queue: &str) -> Option<&str> {
        self.endpoints.get(queue).map(String::as_str)
    }
}

#[async_trait]
impl MessageBus for HttpBus {
    async fn publish(&self, queue: &str, message: &TaskMessage) -> Result<()> {
        let url = self.endpoint(queue).ok_or_else(|| {
            OrchestratorError::Publish(format!("no worker endpoint configured for {}", queue))
        })?;

        let body = message.to_json()?;
        debug!("Publishing {} bytes to {} ({})", body.len(), queue, url);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(CORRELATION_HEADER, message.task_id.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| OrchestratorError::Publish(format!("{} unreachable: {}", queue, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OrchestratorError::Publish(format!(
                "{} refused task {} with status {}",
                queue, message.task_id, status
            )));
        }

        info!("Task {} sent to {}", message.task_id, queue);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{StagePayload, TaskId};

    fn bus_with(queue: &str, url: &str) -> HttpBus {
        let mut endpoints = HashMap::new();
        endpoints.insert(queue.to_string(), url.to_string());
        HttpBus::new(endpoints, Duration::from_millis(500)).unwrap()
    }

    fn report_task() -> TaskMessage {
        TaskMessage {
            meeting_id: "M1".to_string(),
            task_id: TaskId::from("M1-report-1"),
            payload: StagePayload::Report {},
        }
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let bus = bus_with("report_queue", "http://worker:9000/tasks/");
        assert_eq!(bus.endpoint("report_queue"), Some("http://worker:9000/tasks"));
        assert_eq!(bus.endpoint("ocr_queue"), None);
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_publish_error() {
        let bus = bus_with("report_queue", "http://worker:9000/tasks");
        let mut task = report_task();
        task.payload = StagePayload::Summary {};

        let err = bus.publish("summary_queue", &task).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Publish(_)));
        assert!(err.to_string().contains("no worker endpoint"));
    }

    #[tokio::test]
    async fn test_unreachable_worker_is_publish_error() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let bus = bus_with("report_queue", "http://127.0.0.1:9/tasks");
        let err = bus.publish("report_queue", &report_task()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Publish(_)));
    }

    #[tokio::test]
    async fn test_publish_posts_json_with_correlation_id() {
        use axum::{http::HeaderMap, routing::post, Json, Router};
        use serde_json::Value;
        use tokio::sync::mpsc;

        let (tx, mut rx) = mpsc::channel::<(Option<String>, Value)>(1);
        let app = Router::new().route(
            "/tasks",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let correlation = headers
                        .get(CORRELATION_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .map(String::from);
                    let _ = tx.send((correlation, body)).await;
                    "ok"
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let bus = bus_with("report_queue", &format!("http://{}/tasks", addr));
        bus.publish("report_queue", &report_task()).await.unwrap();

        let (correlation, body) = rx.recv().await.unwrap();
        assert_eq!(correlation.as_deref(), Some("M1-report-1"));
        assert_eq!(body["meeting_id"], "M1");
        assert_eq!(body["task_id"], "M1-report-1");
    }
}
