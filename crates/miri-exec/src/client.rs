use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use miri_core::analysis::AnalysisResult;
use miri_core::config::ApiConfig;
use miri_core::config::ResponseMode;
use miri_core::protocol::AnalysisRequest;
use miri_core::protocol::StreamEnvelope;
use reqwest::Client;
use reqwest::StatusCode;

use crate::decoder::EnvelopeDecoder;
use crate::error::ClientError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the analysis endpoint.
#[derive(Debug, Clone)]
pub struct AnalysisClient {
    http: Client,
    endpoint: String,
    mode: ResponseMode,
    timeout_secs: u64,
}

impl AnalysisClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        // `timeout_secs` bounds the silence between reads, not the whole run.
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(Duration::from_secs(config.timeout_secs)))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ClientError::Network {
                message: format!("failed to create HTTP client: {err}"),
            })?;
        Ok(Self {
            http,
            endpoint: config.analyze_url(),
            mode: config.response_mode,
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.mode
    }

    /// Sends the request and returns the envelopes of its response body.
    pub async fn open(&self, request: &AnalysisRequest) -> Result<EnvelopeStream, ClientError> {
        tracing::debug!(
            endpoint = %self.endpoint,
            mode = self.mode.label(),
            what_ifs = request.what_ifs.len(),
            "opening analysis request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| ClientError::transport(&err, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT || status == StatusCode::RESET_CONTENT {
            return Err(ClientError::NoResponseBody);
        }

        let body = match self.mode {
            ResponseMode::Streaming => Body::Chunks(response.bytes_stream().boxed()),
            ResponseMode::Buffered => Body::Whole(Some(response)),
        };
        Ok(EnvelopeStream {
            body,
            decoder: EnvelopeDecoder::default(),
            ready: VecDeque::new(),
            ended: false,
            fused: false,
            timeout_secs: self.timeout_secs,
        })
    }

    /// Runs one request to completion, handing each envelope to `dispatch`
    /// in body order. A backend `error` envelope ends the run with
    /// [`ClientError::Backend`]; nothing after it is dispatched.
    pub async fn consume<F>(
        &self,
        request: &AnalysisRequest,
        mut dispatch: F,
    ) -> Result<RunSummary, ClientError>
    where
        F: FnMut(StreamEnvelope),
    {
        let mut stream = self.open(request).await?;
        let mut summary = RunSummary::default();
        while let Some(item) = stream.next().await {
            let envelope = item?;
            summary.record(&envelope);
            dispatch(envelope);
        }
        summary.skipped_lines = stream.skipped_lines();
        Ok(summary)
    }
}

/// Counts of what a finished run delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub logs: usize,
    pub chat_messages: usize,
    pub results: usize,
    pub skipped_lines: u64,
}

impl RunSummary {
    fn record(&mut self, envelope: &StreamEnvelope) {
        match envelope {
            StreamEnvelope::Log { .. } => self.logs += 1,
            StreamEnvelope::ChatMessage { .. } => self.chat_messages += 1,
            StreamEnvelope::Result { .. } => self.results += 1,
            StreamEnvelope::Error { .. } => {}
        }
    }
}

enum Body {
    Chunks(BoxStream<'static, reqwest::Result<Bytes>>),
    Whole(Option<reqwest::Response>),
}

/// Lazy, finite sequence of envelopes from one response. Not restartable.
pub struct EnvelopeStream {
    body: Body,
    decoder: EnvelopeDecoder,
    ready: VecDeque<StreamEnvelope>,
    ended: bool,
    fused: bool,
    timeout_secs: u64,
}

impl std::fmt::Debug for EnvelopeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeStream")
            .field("ready", &self.ready.len())
            .field("ended", &self.ended)
            .field("fused", &self.fused)
            .finish()
    }
}

impl EnvelopeStream {
    /// Next envelope in body order, `None` once the body is exhausted or
    /// after an error has been returned.
    pub async fn next(&mut self) -> Option<Result<StreamEnvelope, ClientError>> {
        if self.fused {
            return None;
        }
        loop {
            if let Some(envelope) = self.ready.pop_front() {
                return Some(self.deliver(envelope));
            }
            if self.ended {
                self.fused = true;
                return None;
            }
            match &mut self.body {
                Body::Chunks(chunks) => match chunks.next().await {
                    Some(Ok(bytes)) => {
                        let envelopes = self.decoder.push(&bytes);
                        self.ready.extend(envelopes);
                    }
                    Some(Err(err)) => {
                        self.fused = true;
                        return Some(Err(ClientError::transport(&err, self.timeout_secs)));
                    }
                    None => {
                        let envelopes = self.decoder.finish();
                        self.ready.extend(envelopes);
                        self.ended = true;
                    }
                },
                Body::Whole(response) => {
                    self.ended = true;
                    let Some(response) = response.take() else {
                        continue;
                    };
                    match read_buffered_result(response, self.timeout_secs).await {
                        Ok(data) => self.ready.push_back(StreamEnvelope::Result { data }),
                        Err(err) => {
                            self.fused = true;
                            return Some(Err(err));
                        }
                    }
                }
            }
        }
    }

    /// Malformed lines discarded so far.
    pub fn skipped_lines(&self) -> u64 {
        self.decoder.skipped()
    }

    fn deliver(&mut self, envelope: StreamEnvelope) -> Result<StreamEnvelope, ClientError> {
        match envelope {
            StreamEnvelope::Error { message } => {
                self.fused = true;
                self.ready.clear();
                Err(ClientError::Backend { message })
            }
            other => Ok(other),
        }
    }
}

async fn read_buffered_result(
    response: reqwest::Response,
    timeout_secs: u64,
) -> Result<AnalysisResult, ClientError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ClientError::transport(&err, timeout_secs))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ClientError::NoResponseBody);
    }
    serde_json::from_slice(&bytes).map_err(|err| ClientError::InvalidResponse {
        message: format!("expected an analysis result: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::body_json;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;

    use super::*;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            idea: "공유 주방".to_string(),
            what_ifs: vec!["night_only".to_string()],
            thread_id: "thread-1".to_string(),
        }
    }

    fn client(server: &MockServer, mode: ResponseMode) -> AnalysisClient {
        let config = ApiConfig {
            base_url: server.uri(),
            timeout_secs: 5,
            response_mode: mode,
        };
        AnalysisClient::new(&config).expect("client")
    }

    async fn mount_body(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(
                ResponseTemplate::new(status).set_body_raw(body.to_string(), "application/x-ndjson"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn dispatches_envelopes_in_body_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(json!({
                "idea": "공유 주방",
                "what_ifs": ["night_only"],
                "thread_id": "thread-1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                concat!(
                    "{\"type\":\"log\",\"message\":\"fetching laws\"}\n",
                    "{\"type\":\"log\",\"message\":\"scoring\"}\n",
                    "{\"type\":\"result\",\"data\":{\"verdict\":{\"verdict\":\"Safe\"}}}\n",
                ),
                "application/x-ndjson",
            ))
            .mount(&server)
            .await;

        let mut seen = Vec::new();
        let summary = client(&server, ResponseMode::Streaming)
            .consume(&request(), |envelope| seen.push(envelope))
            .await
            .expect("run succeeds");

        let kinds: Vec<&str> = seen.iter().map(StreamEnvelope::kind).collect();
        assert_eq!(kinds, vec!["log", "log", "result"]);
        match &seen[2] {
            StreamEnvelope::Result { data } => assert_eq!(data.verdict_code(), Some("Safe")),
            other => panic!("expected result, got {other:?}"),
        }
        assert_eq!(
            summary,
            RunSummary {
                logs: 2,
                chat_messages: 0,
                results: 1,
                skipped_lines: 0,
            }
        );
    }

    #[tokio::test]
    async fn error_envelope_stops_the_run() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            200,
            concat!(
                "{\"type\":\"error\",\"message\":\"rate limited\"}\n",
                "{\"type\":\"log\",\"message\":\"should not appear\"}\n",
            ),
        )
        .await;

        let mut seen = Vec::new();
        let err = client(&server, ResponseMode::Streaming)
            .consume(&request(), |envelope| seen.push(envelope))
            .await
            .expect_err("backend error");

        assert!(seen.is_empty());
        assert_eq!(err.to_string(), "rate limited");
    }

    #[tokio::test]
    async fn stream_is_fused_after_backend_error() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            200,
            "{\"type\":\"error\",\"message\":\"boom\"}\n{\"type\":\"log\",\"message\":\"x\"}\n",
        )
        .await;

        let mut stream = client(&server, ResponseMode::Streaming)
            .open(&request())
            .await
            .expect("open");
        assert!(matches!(
            stream.next().await,
            Some(Err(ClientError::Backend { .. }))
        ));
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_and_counted() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            200,
            concat!(
                "{\"type\":\"log\",\"message\":\"a\"}\n",
                "garbage\n",
                "\n",
                "{\"type\":\"log\",\"message\":\"b\"}",
            ),
        )
        .await;

        let mut logs = Vec::new();
        let summary = client(&server, ResponseMode::Streaming)
            .consume(&request(), |envelope| {
                if let StreamEnvelope::Log { message } = envelope {
                    logs.push(message);
                }
            })
            .await
            .expect("run succeeds");

        assert_eq!(logs, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(summary.skipped_lines, 1);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_with_body() {
        let server = MockServer::start().await;
        mount_body(&server, 500, "internal error").await;

        let err = client(&server, ResponseMode::Streaming)
            .open(&request())
            .await
            .expect_err("status error");
        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "internal error");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_content_is_a_missing_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let err = client(&server, ResponseMode::Streaming)
            .open(&request())
            .await
            .expect_err("no body");
        assert!(matches!(err, ClientError::NoResponseBody));
    }

    #[tokio::test]
    async fn stream_without_result_ends_cleanly() {
        let server = MockServer::start().await;
        mount_body(&server, 200, "{\"type\":\"log\",\"message\":\"only\"}\n").await;

        let summary = client(&server, ResponseMode::Streaming)
            .consume(&request(), |_| {})
            .await
            .expect("run succeeds");
        assert_eq!(summary.results, 0);
        assert_eq!(summary.logs, 1);
    }

    #[tokio::test]
    async fn buffered_mode_yields_single_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "verdict": {"verdict": "Danger", "summary": "금지 [1]"},
                "references": [{"title": "식품위생법", "url": "https://law.example/1"}]
            })))
            .mount(&server)
            .await;

        let mut seen = Vec::new();
        client(&server, ResponseMode::Buffered)
            .consume(&request(), |envelope| seen.push(envelope))
            .await
            .expect("run succeeds");

        assert_eq!(seen.len(), 1);
        match &seen[0] {
            StreamEnvelope::Result { data } => {
                assert_eq!(data.verdict_code(), Some("Danger"));
                assert_eq!(data.references.len(), 1);
            }
            other => panic!("expected result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn buffered_mode_rejects_non_result_body() {
        let server = MockServer::start().await;
        mount_body(&server, 200, "<html>upstream</html>").await;

        let err = client(&server, ResponseMode::Buffered)
            .consume(&request(), |_| {})
            .await
            .expect_err("invalid body");
        assert!(matches!(err, ClientError::InvalidResponse { .. }));
    }

    /// Serves one chunked NDJSON response, one log line every `gap`.
    async fn serve_slow_stream(listener: tokio::net::TcpListener, lines: usize, gap: Duration) {
        use tokio::io::AsyncReadExt;
        use tokio::io::AsyncWriteExt;

        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        while !received.ends_with(b"}") {
            let n = socket.read(&mut buf).await.expect("read request");
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\ncontent-type: application/x-ndjson\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
            )
            .await
            .expect("write head");
        for idx in 0..lines {
            tokio::time::sleep(gap).await;
            let line = format!("{{\"type\":\"log\",\"message\":\"step {idx}\"}}\n");
            let chunk = format!("{:x}\r\n{line}\r\n", line.len());
            socket.write_all(chunk.as_bytes()).await.expect("write chunk");
        }
        socket.write_all(b"0\r\n\r\n").await.expect("write end");
        socket.shutdown().await.expect("shutdown");
    }

    #[tokio::test]
    async fn stream_may_outlast_timeout_while_lines_keep_arriving() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(serve_slow_stream(listener, 4, Duration::from_millis(600)));

        let config = ApiConfig {
            base_url: format!("http://{addr}"),
            timeout_secs: 1,
            response_mode: ResponseMode::Streaming,
        };
        let mut logs = Vec::new();
        let summary = AnalysisClient::new(&config)
            .expect("client")
            .consume(&request(), |envelope| {
                if let StreamEnvelope::Log { message } = envelope {
                    logs.push(message);
                }
            })
            .await
            .expect("slow stream completes");
        server.await.expect("server task");

        assert_eq!(logs, vec!["step 0", "step 1", "step 2", "step 3"]);
        assert_eq!(summary.logs, 4);
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            response_mode: ResponseMode::Streaming,
        };
        let err = AnalysisClient::new(&config)
            .expect("client")
            .open(&request())
            .await
            .expect_err("connection refused");
        assert!(matches!(err, ClientError::Network { .. }));
    }

    #[test]
    fn endpoint_is_derived_from_base_url() {
        let config = ApiConfig {
            base_url: "https://miri.example/".to_string(),
            ..ApiConfig::default()
        };
        let client = AnalysisClient::new(&config).expect("client");
        assert_eq!(client.endpoint(), "https://miri.example/analyze");
        assert_eq!(client.response_mode(), ResponseMode::Streaming);
    }
}
