use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Instrument, Span};

use crate::api::health::{SessionStats, StatsSnapshot};
use crate::config::{FilterParams, RATE_LIMIT_STATUSES, RECONNECT_BACKOFF_MS, STREAM_PROGRESS_EVERY};
use crate::error::{AppError, Result};
use crate::stream::client::TwitterClient;
use crate::stream::listener::StreamHandler;
use crate::stream::messages::LineBuffer;
use crate::types::{Control, SessionState};

/// How one stream connection ended.
enum StreamEnd {
    /// The handler asked to stop.
    Stopped,
    /// The server refused the connection with this status.
    Rejected(u16),
    /// The server ended the body.
    Closed,
}

/// One streaming session: authenticate, resolve follows, then feed the
/// filter stream to the handler until it stops or the transport errors.
pub struct StreamSession<H> {
    client: TwitterClient,
    filter: FilterParams,
    handler: H,
    stats: Arc<SessionStats>,
    span: Span,
}

impl<H: StreamHandler> StreamSession<H> {
    pub fn new(
        client: TwitterClient,
        filter: FilterParams,
        handler: H,
        stats: Arc<SessionStats>,
        span: Span,
    ) -> Self {
        Self {
            client,
            filter,
            handler,
            stats,
            span,
        }
    }

    /// Runs the session to completion on the current task.
    pub async fn run(self) -> Result<StatsSnapshot> {
        let span = self.span.clone();
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> Result<StatsSnapshot> {
        let result = self.authenticate_and_stream().await;
        self.handler.on_close();

        match result {
            Ok(()) => {
                // Keep a terminal state the handler already recorded.
                if !self.stats.state().is_terminal() {
                    self.stats.set_state(SessionState::Stopped);
                }
                let snap = self.stats.snapshot();
                info!(
                    written = snap.events_written,
                    filtered = snap.events_filtered,
                    received = snap.events_received,
                    "Stream session stopped"
                );
                Ok(snap)
            }
            Err(e) => {
                self.stats.set_state(SessionState::Errored);
                error!("Stream session failed: {e}");
                Err(e)
            }
        }
    }

    async fn authenticate_and_stream(&mut self) -> Result<()> {
        self.stats.set_state(SessionState::Authenticating);
        self.client.verify_credentials().await?;

        self.stats.set_state(SessionState::ResolvingFollows);
        let follow_ids = self.client.resolve_follows(&self.filter.follow_list).await?;

        self.stats.set_state(SessionState::Streaming);
        self.stream_loop(&follow_ids).await
    }

    async fn stream_loop(&mut self, follow_ids: &[String]) -> Result<()> {
        let mut backoff_idx = 0usize;
        let mut lines = LineBuffer::default();

        loop {
            info!(
                follow = follow_ids.len(),
                track = self.filter.track_list.len(),
                "Connecting to filter stream"
            );
            match self.stream_once(follow_ids, &mut lines, &mut backoff_idx).await {
                Ok(StreamEnd::Stopped) => return Ok(()),
                Ok(StreamEnd::Rejected(status)) if status == 401 || status == 403 => {
                    return Err(AppError::Auth(status));
                }
                Ok(StreamEnd::Rejected(status)) => {
                    if self.handler.on_error(status) == Control::Stop {
                        return Err(if RATE_LIMIT_STATUSES.contains(&status) {
                            AppError::RateLimited(status)
                        } else {
                            AppError::StreamRejected(status)
                        });
                    }
                }
                Ok(StreamEnd::Closed) => info!("Filter stream closed by server"),
                Err(e) => error!("Filter stream error: {e}"),
            }

            if lines.pending() > 0 {
                warn!(bytes = lines.pending(), "discarding partial message from dropped connection");
            }
            lines.clear();

            let delay_ms = RECONNECT_BACKOFF_MS
                .get(backoff_idx)
                .copied()
                .unwrap_or(RECONNECT_BACKOFF_MS[RECONNECT_BACKOFF_MS.len() - 1]);
            backoff_idx = (backoff_idx + 1).min(RECONNECT_BACKOFF_MS.len() - 1);
            SessionStats::inc(&self.stats.reconnects);

            warn!("Filter stream reconnecting in {delay_ms}ms");
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    async fn stream_once(
        &mut self,
        follow_ids: &[String],
        lines: &mut LineBuffer,
        backoff_idx: &mut usize,
    ) -> Result<StreamEnd> {
        let resp = self
            .client
            .open_filter_stream(follow_ids, &self.filter.track_list)
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Ok(StreamEnd::Rejected(status.as_u16()));
        }
        *backoff_idx = 0;
        info!("Filter stream connected");

        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for line in lines.push(&chunk) {
                if line.trim().is_empty() {
                    continue;
                }
                let received = SessionStats::inc(&self.stats.events_received);
                if received % STREAM_PROGRESS_EVERY == 0 {
                    let snap = self.stats.snapshot();
                    info!(
                        received,
                        written = snap.events_written,
                        filtered = snap.events_filtered,
                        "[STREAM] progress"
                    );
                }
                if self.handler.on_event(&line) == Control::Stop {
                    return Ok(StreamEnd::Stopped);
                }
            }
        }
        Ok(StreamEnd::Closed)
    }
}

impl<H: StreamHandler + Send + 'static> StreamSession<H> {
    /// Runs the session on its own task.
    pub fn spawn(self) -> JoinHandle<Result<StatsSnapshot>> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;
    use crate::config::{Credentials, StreamConfig};
    use crate::stream::listener::FileListener;
    use crate::stream::messages::tests::{ORIGINAL, REPLY, RETWEET};
    use crate::types::StopCondition;

    #[derive(Clone)]
    struct Fake {
        accept_credentials: bool,
        stream_calls: Arc<AtomicUsize>,
        /// Status returned on every stream connection after the first.
        later_status: StatusCode,
    }

    async fn verify(State(f): State<Fake>) -> StatusCode {
        if f.accept_credentials {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        }
    }

    async fn show(Query(q): Query<HashMap<String, String>>) -> Response {
        match q.get("screen_name").map(String::as_str) {
            Some("marketwatcher") => Json(serde_json::json!({"id_str": "6253282"})).into_response(),
            _ => StatusCode::NOT_FOUND.into_response(),
        }
    }

    async fn filter(State(f): State<Fake>) -> Response {
        if f.stream_calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return f.later_status.into_response();
        }
        let split = ORIGINAL.len() / 2;
        let chunks: Vec<std::result::Result<String, std::io::Error>> = vec![
            Ok("\r\n".to_string()),
            Ok(format!("{RETWEET}\r\n{}", &ORIGINAL[..split])),
            Ok(format!("{}\r\n{REPLY}\r\n", &ORIGINAL[split..])),
            Ok(format!("{ORIGINAL}\r\n")),
        ];
        Body::from_stream(futures_util::stream::iter(chunks)).into_response()
    }

    async fn serve(fake: Fake) -> SocketAddr {
        let app = Router::new()
            .route("/1.1/account/verify_credentials.json", get(verify))
            .route("/1.1/users/show.json", get(show))
            .route("/stream", post(filter))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        addr
    }

    fn config(addr: SocketAddr, follow: &[&str]) -> StreamConfig {
        StreamConfig {
            log_level: "debug".to_string(),
            credentials: Credentials {
                consumer_key: "ck".to_string(),
                consumer_secret: "cs".to_string(),
                access_token: "at".to_string(),
                access_token_secret: "ats".to_string(),
            },
            filter: FilterParams {
                track_list: vec!["spx".to_string()],
                follow_list: follow.iter().map(|s| s.to_string()).collect(),
                is_async: false,
            },
            stop_condition: StopCondition::Never,
            output_path: PathBuf::new(),
            api_base_url: format!("http://{addr}/1.1"),
            stream_url: format!("http://{addr}/stream"),
            api_port: None,
        }
    }

    fn session(
        cfg: &StreamConfig,
        path: &std::path::Path,
    ) -> (StreamSession<FileListener>, Arc<SessionStats>) {
        let stats = Arc::new(SessionStats::new());
        let listener = FileListener::open(path, cfg.stop_condition, Arc::clone(&stats)).unwrap();
        let client = TwitterClient::new(cfg).unwrap();
        let s = StreamSession::new(
            client,
            cfg.filter.clone(),
            listener,
            Arc::clone(&stats),
            Span::none(),
        );
        (s, stats)
    }

    #[tokio::test]
    async fn streams_originals_then_errors_on_rate_limit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let addr = serve(Fake {
            accept_credentials: true,
            stream_calls: Arc::clone(&calls),
            later_status: StatusCode::from_u16(420).unwrap(),
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let cfg = config(addr, &["marketwatcher"]);
        let (s, stats) = session(&cfg, &path);

        let err = s.run().await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited(420)), "got {err:?}");

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, format!("{ORIGINAL}\n{ORIGINAL}\n"));

        let snap = stats.snapshot();
        assert_eq!(snap.state, SessionState::Errored);
        assert_eq!(snap.events_received, 4);
        assert_eq!(snap.events_filtered, 2);
        assert_eq!(snap.reconnects, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn forbidden_stream_ends_the_session() {
        let calls = Arc::new(AtomicUsize::new(0));
        let addr = serve(Fake {
            accept_credentials: true,
            stream_calls: Arc::clone(&calls),
            later_status: StatusCode::FORBIDDEN,
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(addr, &[]);
        let (s, stats) = session(&cfg, &dir.path().join("out.jsonl"));

        let result = tokio::time::timeout(Duration::from_secs(5), s.run())
            .await
            .expect("session kept reconnecting after 403");
        assert!(matches!(result, Err(AppError::Auth(403))), "got {result:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(stats.snapshot().reconnects, 1);
        assert_eq!(stats.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn rejected_credentials_are_fatal() {
        let addr = serve(Fake {
            accept_credentials: false,
            stream_calls: Arc::new(AtomicUsize::new(0)),
            later_status: StatusCode::OK,
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(addr, &[]);
        let (s, stats) = session(&cfg, &dir.path().join("out.jsonl"));

        assert!(matches!(s.run().await, Err(AppError::Auth(401))));
        assert_eq!(stats.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn one_unknown_handle_aborts_resolution() {
        let calls = Arc::new(AtomicUsize::new(0));
        let addr = serve(Fake {
            accept_credentials: true,
            stream_calls: Arc::clone(&calls),
            later_status: StatusCode::OK,
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(addr, &["marketwatcher", "nobody_here"]);
        let (s, _stats) = session(&cfg, &dir.path().join("out.jsonl"));

        match s.run().await {
            Err(AppError::UnknownHandle { handle, .. }) => assert_eq!(handle, "nobody_here"),
            other => panic!("expected UnknownHandle, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn spawned_session_stops_on_elapsed_bound() {
        let calls = Arc::new(AtomicUsize::new(0));
        let addr = serve(Fake {
            accept_credentials: true,
            stream_calls: Arc::clone(&calls),
            later_status: StatusCode::from_u16(420).unwrap(),
        })
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut cfg = config(addr, &[]);
        cfg.stop_condition = StopCondition::ElapsedSeconds(0);
        let (s, stats) = session(&cfg, &path);

        let snap = s.spawn().await.unwrap().unwrap();
        assert_eq!(snap.state, SessionState::Stopped);
        assert_eq!(snap.events_written, 0);
        assert_eq!(stats.snapshot().reconnects, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
