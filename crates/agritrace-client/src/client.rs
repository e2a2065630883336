use std::sync::{PoisonError, RwLock};

use agritrace_core::error::TraceError;
use agritrace_core::types::{BlockNumber, TraceCode, TxHash};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, EndpointClass};
use crate::types::{
    AiHealth, BlockInfo, ChainInfo, ErrorBody, Health, ProductChainData, Summary, SummaryRequest,
    TransactionInfo, VerifyResult,
};

/// JSON client for the traceability backend's ledger-query and summary
/// endpoints.
///
/// Holds an optional bearer token. A `401` from any endpoint clears it, after
/// which the caller has to sign in again and call [`set_token`](Self::set_token).
pub struct BackendClient {
    config: ClientConfig,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl BackendClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            token: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_token(&self) -> bool {
        self.token.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    // ── Endpoints ─────────────────────────────────────────────────────────────

    pub async fn chain_info(&self) -> Result<ChainInfo, TraceError> {
        self.get("/blockchain/info", EndpointClass::Standard).await
    }

    pub async fn transaction(&self, hash: &TxHash) -> Result<TransactionInfo, TraceError> {
        let path = format!("/blockchain/transaction/{}", hash.to_hex());
        self.get(&path, EndpointClass::Ledger).await
    }

    pub async fn block(&self, number: BlockNumber) -> Result<BlockInfo, TraceError> {
        let path = format!("/blockchain/block/{number}");
        self.get(&path, EndpointClass::Ledger).await
    }

    /// Whether the ledger knows `code`. An unknown code is `exists: false`,
    /// not an error.
    pub async fn verify_trace_code(&self, code: &TraceCode) -> Result<VerifyResult, TraceError> {
        let path = format!("/blockchain/verify/{code}");
        self.get(&path, EndpointClass::Ledger).await
    }

    pub async fn product_chain_data(&self, code: &TraceCode) -> Result<ProductChainData, TraceError> {
        let path = format!("/blockchain/product/{code}/chain-data");
        self.get(&path, EndpointClass::Ledger).await
    }

    pub async fn health(&self) -> Result<Health, TraceError> {
        self.get("/blockchain/health", EndpointClass::Standard).await
    }

    /// Whether the summary service can reach its model. Slow, since the
    /// backend makes a real model call to find out.
    pub async fn ai_health(&self) -> Result<AiHealth, TraceError> {
        self.get("/ai/health", EndpointClass::Summary).await
    }

    /// Ask the backend for a natural-language summary of a product's history.
    /// `chain_data` is the output of [`product_chain_data`](Self::product_chain_data),
    /// if the caller already has it.
    pub async fn generate_summary(
        &self,
        code: &TraceCode,
        chain_data: Option<&Value>,
    ) -> Result<Summary, TraceError> {
        let body = SummaryRequest { trace_code: code.as_str(), chain_data };
        let req = self.request(Method::POST, "/ai/summary", EndpointClass::Summary).json(&body);
        self.send(req, "/ai/summary", EndpointClass::Summary).await
    }

    // ── Transport ─────────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str, class: EndpointClass) -> RequestBuilder {
        let req = self
            .http
            .request(method, self.url(path))
            .timeout(self.config.timeout(class));
        match self.token.read().unwrap_or_else(PoisonError::into_inner).as_deref() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, class: EndpointClass) -> Result<T, TraceError> {
        self.send(self.request(Method::GET, path, class), path, class).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        path: &str,
        class: EndpointClass,
    ) -> Result<T, TraceError> {
        debug!(path, ?class, "backend request");
        let resp = req.send().await.map_err(|e| self.transport_error(path, class, e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.transport_error(path, class, e))?;

        if !status.is_success() {
            let err = error_for_status(status, &body);
            if err == TraceError::Unauthorized {
                self.clear_token();
            }
            warn!(path, status = status.as_u16(), error = %err, "backend request failed");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| TraceError::Serialization(format!("{path}: {e}")))
    }

    fn transport_error(&self, path: &str, class: EndpointClass, e: reqwest::Error) -> TraceError {
        let err = if e.is_timeout() {
            TraceError::Timeout(format!("{path} after {}s", self.config.timeout(class).as_secs()))
        } else if e.is_decode() {
            TraceError::Serialization(format!("{path}: {e}"))
        } else {
            TraceError::Backend(format!("{}: {e}", self.url(path)))
        };
        warn!(path, error = %err, "backend unreachable");
        err
    }
}

/// Map a non-success response to an error. The message is the body's
/// `detail` when present, else the status reason.
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> TraceError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .map(|d| match d {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());

    match status {
        StatusCode::UNAUTHORIZED => TraceError::Unauthorized,
        StatusCode::NOT_FOUND => TraceError::RemoteNotFound(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => TraceError::Timeout(detail),
        s if s.is_server_error() => TraceError::Backend(format!("{}: {detail}", s.as_u16())),
        s => TraceError::Rejected { status: s.as_u16(), detail },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agritrace_core::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serve one canned response on a local port. Resolves to the raw request
    /// text once it has been answered.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = sock.read(&mut buf).await.unwrap();
            let resp = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).into_owned());
        });
        (format!("http://{addr}/api"), rx)
    }

    fn code() -> TraceCode {
        "TRACE-20241226-001".parse().unwrap()
    }

    #[test]
    fn detail_becomes_message() {
        let err = error_for_status(StatusCode::BAD_REQUEST, r#"{"detail": "quantity must be positive"}"#);
        assert_eq!(
            err,
            TraceError::Rejected { status: 400, detail: "quantity must be positive".into() }
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(error_for_status(StatusCode::UNAUTHORIZED, "{}"), TraceError::Unauthorized);
        assert_eq!(
            error_for_status(StatusCode::NOT_FOUND, r#"{"detail": "no such block"}"#),
            TraceError::RemoteNotFound("no such block".into())
        );
        assert!(error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "oops").is_retryable());
        assert!(error_for_status(StatusCode::GATEWAY_TIMEOUT, "").is_retryable());
        // non-JSON body falls back to the status reason
        assert_eq!(
            error_for_status(StatusCode::FORBIDDEN, "<html>"),
            TraceError::Rejected { status: 403, detail: "Forbidden".into() }
        );
    }

    #[test]
    fn list_detail_is_rendered() {
        let err = error_for_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "trace_code"], "msg": "field required"}]}"#,
        );
        match err {
            TraceError::Rejected { status: 422, detail } => assert!(detail.contains("field required")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn verify_sends_bearer_token() {
        let (url, req) = serve_once(
            "200 OK",
            r#"{"trace_code": "TRACE-20241226-001", "exists": true, "on_chain": true, "product_info": {"name": "Organic Tomato"}}"#,
        )
        .await;
        let client = BackendClient::new(ClientConfig::with_base_url(url));
        client.set_token("abc123");

        let res = client.verify_trace_code(&code()).await.unwrap();
        assert!(res.exists && res.on_chain);
        assert_eq!(res.product_info.unwrap()["name"], "Organic Tomato");

        let raw = req.await.unwrap();
        assert!(raw.starts_with("GET /api/blockchain/verify/TRACE-20241226-001 "));
        assert!(raw.to_ascii_lowercase().contains("authorization: bearer abc123"));
    }

    #[tokio::test]
    async fn ai_health_reports_model_failure() {
        let (url, req) = serve_once(
            "200 OK",
            r#"{"status": "error", "connected": false, "error": "invalid api key"}"#,
        )
        .await;
        let client = BackendClient::new(ClientConfig::with_base_url(url));

        let health = client.ai_health().await.unwrap();
        assert!(!health.is_healthy());
        assert_eq!(health.error.as_deref(), Some("invalid api key"));
        assert!(req.await.unwrap().starts_with("GET /api/ai/health "));
    }

    #[tokio::test]
    async fn unauthorized_clears_token() {
        let (url, _req) = serve_once("401 Unauthorized", r#"{"detail": "token expired"}"#).await;
        let client = BackendClient::new(ClientConfig::with_base_url(url));
        client.set_token("stale");

        let err = client.chain_info().await.unwrap_err();
        assert_eq!(err, TraceError::Unauthorized);
        assert!(!client.has_token());
    }

    #[tokio::test]
    async fn malformed_body_is_protocol_error() {
        let (url, _req) = serve_once("200 OK", r#"{"status": 1}"#).await;
        let client = BackendClient::new(ClientConfig::with_base_url(url));
        let err = client.health().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[tokio::test]
    async fn connection_refused_is_retryable() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = BackendClient::new(ClientConfig::with_base_url(format!("http://{addr}/api")));
        let err = client.health().await.unwrap_err();
        assert!(matches!(err, TraceError::Backend(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = BackendClient::new(ClientConfig {
            standard_timeout_secs: 1,
            ..ClientConfig::with_base_url(format!("http://{addr}/api"))
        });

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, TraceError::Timeout(_)));
        assert!(err.is_retryable());
        drop(listener);
    }
}
