use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use super::error::DispatchError;
use super::types::{Notice, RemoteAction};

const SUBMIT_URL_PATH: &str = "/sendUrl";
const INGESTION_PATH: &str = "/sendHackerNews";
const ADVICE_PATH: &str = "/advice";

#[derive(Debug, Serialize)]
struct UrlRequestBody<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct IngestionRequestBody<'a> {
    query: &'a str,
}

/// One-shot requests against the front-end server. Nothing here retries.
#[derive(Debug, Clone)]
pub struct RemoteActionDispatcher {
    client: Client,
    base: Url,
}

impl RemoteActionDispatcher {
    pub fn new(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    async fn check_status(res: Response) -> Result<Response, DispatchError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let detail = res.text().await.ok().filter(|text| !text.trim().is_empty());
        Err(DispatchError::Status { status, detail })
    }

    async fn into_success(res: Response) -> Result<String, DispatchError> {
        Self::check_status(res)
            .await?
            .text()
            .await
            .map_err(DispatchError::Transport)
    }

    pub async fn submit_url(&self, url: &str) -> Result<(), DispatchError> {
        let res = self
            .client
            .post(self.endpoint(SUBMIT_URL_PATH))
            .json(&UrlRequestBody { url })
            .send()
            .await
            .map_err(DispatchError::Transport)?;
        Self::check_status(res).await.map(|_| ())
    }

    pub async fn request_external_ingestion(&self, query: &str) -> Result<String, DispatchError> {
        let res = self
            .client
            .post(self.endpoint(INGESTION_PATH))
            .json(&IngestionRequestBody { query })
            .send()
            .await
            .map_err(DispatchError::Transport)?;
        Self::into_success(res).await
    }

    pub async fn fetch_advice(&self) -> Result<String, DispatchError> {
        let res = self
            .client
            .get(self.endpoint(ADVICE_PATH))
            .send()
            .await
            .map_err(DispatchError::Transport)?;
        Self::into_success(res).await
    }

    /// Runs `action` to completion and turns the outcome into what the user
    /// sees. `None` means the outcome is only logged.
    pub async fn perform(&self, action: &RemoteAction) -> Option<Notice> {
        info!(action = action.label(), "dispatching");
        match action {
            RemoteAction::SubmitUrl(url) => Some(submit_url_notice(self.submit_url(url).await)),
            RemoteAction::RequestIngestion(query) => Some(ingestion_notice(
                self.request_external_ingestion(query).await,
            )),
            RemoteAction::FetchAdvice => match self.fetch_advice().await {
                Ok(advice) => Some(Notice::info(advice)),
                Err(err) => {
                    warn!(error = %err, "advice fetch failed");
                    None
                }
            },
        }
    }
}

pub fn submit_url_notice(result: Result<(), DispatchError>) -> Notice {
    match result {
        Ok(()) => Notice::info("URL sent to the server."),
        Err(DispatchError::Status { status, .. }) => {
            warn!(status = status.as_u16(), "URL submission rejected");
            Notice::failure(format!(
                "Failed to send URL to the server (HTTP {}).",
                status.as_u16()
            ))
        }
        Err(err @ DispatchError::Transport(_)) => {
            warn!(error = %err, "URL submission failed");
            Notice::failure("Failed to send URL to the server. Gateway may be down.")
        }
    }
}

pub fn ingestion_notice(result: Result<String, DispatchError>) -> Notice {
    match result {
        Ok(message) => Notice::info(format!("Success: {message}")),
        Err(DispatchError::Status { status, detail }) => {
            warn!(status = status.as_u16(), "ingestion request rejected");
            let detail = detail.unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            Notice::failure(format!("Failed: {detail}"))
        }
        Err(err @ DispatchError::Transport(_)) => {
            warn!(error = %err, "ingestion request failed");
            Notice::failure("Failed: Gateway may be down.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::types::NoticeKind;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Json;
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    async fn unreachable_base() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn submit_url_posts_json_payload() {
        let received = Arc::new(Mutex::new(None::<Value>));
        let sink = received.clone();
        let app = Router::new().route(
            "/sendUrl",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(body);
                    "URL received successfully"
                }
            }),
        );
        let dispatcher = RemoteActionDispatcher::new(Client::new(), serve(app).await);

        let notice = dispatcher
            .perform(&RemoteAction::SubmitUrl("https://a.b".to_string()))
            .await
            .unwrap();
        assert_eq!(notice, Notice::info("URL sent to the server."));
        assert_eq!(
            received.lock().unwrap().clone(),
            Some(serde_json::json!({ "url": "https://a.b" }))
        );
    }

    #[tokio::test]
    async fn submit_url_distinguishes_status_from_unreachable() {
        let app = Router::new().route(
            "/sendUrl",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "gateway down") }),
        );
        let dispatcher = RemoteActionDispatcher::new(Client::new(), serve(app).await);
        let notice = dispatcher
            .perform(&RemoteAction::SubmitUrl("https://a.b".to_string()))
            .await
            .unwrap();
        assert_eq!(notice.kind, NoticeKind::Failure);
        assert!(notice.message.contains("HTTP 500"));

        let offline = RemoteActionDispatcher::new(Client::new(), unreachable_base().await);
        let notice = offline
            .perform(&RemoteAction::SubmitUrl("https://a.b".to_string()))
            .await
            .unwrap();
        assert_eq!(
            notice,
            Notice::failure("Failed to send URL to the server. Gateway may be down.")
        );
    }

    #[tokio::test]
    async fn ingestion_failure_surfaces_body_text() {
        let app = Router::new().route(
            "/sendHackerNews",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "quota exceeded") }),
        );
        let dispatcher = RemoteActionDispatcher::new(Client::new(), serve(app).await);
        let notice = dispatcher
            .perform(&RemoteAction::RequestIngestion("rust".to_string()))
            .await
            .unwrap();
        assert_eq!(notice.kind, NoticeKind::Failure);
        assert!(notice.message.contains("quota exceeded"));
    }

    #[tokio::test]
    async fn ingestion_failure_without_body_uses_generic_detail() {
        let app = Router::new().route(
            "/sendHackerNews",
            post(|| async { StatusCode::BAD_GATEWAY }),
        );
        let dispatcher = RemoteActionDispatcher::new(Client::new(), serve(app).await);
        let notice = dispatcher
            .perform(&RemoteAction::RequestIngestion("rust".to_string()))
            .await
            .unwrap();
        assert_eq!(notice, Notice::failure("Failed: HTTP 502"));
    }

    #[tokio::test]
    async fn ingestion_success_sends_query() {
        let app = Router::new().route(
            "/sendHackerNews",
            post(|Json(body): Json<Value>| async move {
                format!("queued {}", body["query"].as_str().unwrap_or_default())
            }),
        );
        let dispatcher = RemoteActionDispatcher::new(Client::new(), serve(app).await);
        let notice = dispatcher
            .perform(&RemoteAction::RequestIngestion("rust".to_string()))
            .await
            .unwrap();
        assert_eq!(notice, Notice::info("Success: queued rust"));
    }

    #[tokio::test]
    async fn advice_is_shown_verbatim_and_failures_stay_silent() {
        let app = Router::new().route("/advice", get(|| async { "  Drink water.  " }));
        let dispatcher = RemoteActionDispatcher::new(Client::new(), serve(app).await);
        assert_eq!(
            dispatcher.perform(&RemoteAction::FetchAdvice).await,
            Some(Notice::info("  Drink water.  "))
        );

        let failing = Router::new().route(
            "/advice",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "No advice found") }),
        );
        let dispatcher = RemoteActionDispatcher::new(Client::new(), serve(failing).await);
        assert_eq!(dispatcher.perform(&RemoteAction::FetchAdvice).await, None);
    }
}
