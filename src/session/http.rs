//! HTTP transfer session backed by reqwest

use super::traits::{SessionEvent, SessionEventSender, TransferEvent, TransferSession};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::types::{TransferHandle, TransferRequest};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// A transfer currently owned by the session
struct ActiveTransfer {
    cancel_token: CancellationToken,
    part_path: PathBuf,
}

struct Inner {
    client: reqwest::Client,
    /// Runtime transfers are spawned on, whichever thread calls `start`
    runtime: tokio::runtime::Handle,
    config: SessionConfig,
    events: SessionEventSender,
    next_handle: AtomicU64,
    active: parking_lot::Mutex<HashMap<TransferHandle, ActiveTransfer>>,
}

/// Transfer session that streams HTTP responses into temporary files
///
/// Each transfer writes into `<temp_dir>/<sha256(url)>.part`. A cancelled
/// transfer leaves its part file behind; starting the same URL again sends a
/// `Range` request and, if the server answers `206 Partial Content`, continues
/// from where it stopped and publishes [`TransferEvent::Resumed`].
///
/// When a request cannot connect, the session publishes
/// [`TransferEvent::WaitingForConnectivity`] once and keeps probing every
/// `connectivity_poll_interval` until `connectivity_timeout` elapses.
///
/// When the in-flight count drops to zero, whether through completion,
/// failure or cancellation, the session publishes
/// [`SessionEvent::AllEventsDelivered`]. Hosts woken in the background
/// request the same signal with [`flush_events`](TransferSession::flush_events).
///
/// The session is bound to the Tokio runtime it was created on; `start` may
/// then be called from any thread, including ones outside that runtime.
#[derive(Clone)]
pub struct HttpTransferSession {
    inner: Arc<Inner>,
}

impl HttpTransferSession {
    /// Create a session
    ///
    /// Creates the temporary directory if needed. Must be called from within
    /// a Tokio runtime; transfers are spawned on that runtime.
    pub fn new(config: SessionConfig, events: SessionEventSender) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::Config {
            message: format!("HTTP transfer session requires a Tokio runtime: {}", e),
            key: None,
        })?;

        std::fs::create_dir_all(&config.temp_dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create temp directory '{}': {}",
                    config.temp_dir.display(),
                    e
                ),
            ))
        })?;

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::transport(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            session = %config.identifier,
            temp_dir = %config.temp_dir.display(),
            "HTTP transfer session initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                runtime,
                config,
                events,
                next_handle: AtomicU64::new(1),
                active: parking_lot::Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Number of transfers currently running
    pub fn active_count(&self) -> usize {
        self.inner.active.lock().len()
    }

    /// Location of the resumable part file for a URL
    pub fn part_path_for(&self, url: &str) -> PathBuf {
        self.inner.config.temp_dir.join(format!("{}.part", url_digest(url)))
    }
}

impl TransferSession for HttpTransferSession {
    fn start(&self, request: TransferRequest) -> Result<TransferHandle> {
        // Reject malformed requests before a handle exists
        build_request(&self.inner.client, &request, 0)?;

        let handle = TransferHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        let cancel_token = CancellationToken::new();

        let part_path = {
            let mut active = self.inner.active.lock();
            let shared = self.part_path_for(&request.url);
            // Two live transfers of one URL must not share a part file
            let part_path = if active.values().any(|t| t.part_path == shared) {
                self.inner
                    .config
                    .temp_dir
                    .join(format!("{}-{}.part", url_digest(&request.url), handle))
            } else {
                shared
            };
            active.insert(
                handle,
                ActiveTransfer {
                    cancel_token: cancel_token.clone(),
                    part_path: part_path.clone(),
                },
            );
            part_path
        };

        tracing::debug!(
            handle = handle.0,
            url = %request.url,
            part = %part_path.display(),
            "Starting HTTP transfer"
        );

        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn(async move {
            inner.run(handle, request, part_path, cancel_token).await;
        });

        Ok(handle)
    }

    fn cancel(&self, handle: TransferHandle) {
        let remaining = {
            let mut active = self.inner.active.lock();
            let Some(transfer) = active.remove(&handle) else {
                return;
            };
            transfer.cancel_token.cancel();
            active.len()
        };
        tracing::debug!(handle = handle.0, remaining, "HTTP transfer cancelled");

        if remaining == 0 {
            self.inner.events.send(SessionEvent::AllEventsDelivered).ok();
        }
    }

    fn flush_events(&self) {
        // Events are published as they happen; the channel is FIFO, so the
        // signal lands behind everything already queued
        self.inner.events.send(SessionEvent::AllEventsDelivered).ok();
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

impl Inner {
    fn emit(&self, handle: TransferHandle, kind: TransferEvent) {
        // Receiver gone means the coordinator shut down; nothing left to notify
        self.events.send(SessionEvent::transfer(handle, kind)).ok();
    }

    async fn run(
        &self,
        handle: TransferHandle,
        request: TransferRequest,
        part_path: PathBuf,
        cancel_token: CancellationToken,
    ) {
        let outcome = tokio::select! {
            _ = cancel_token.cancelled() => None,
            result = self.download(handle, &request, &part_path) => Some(result),
        };

        let Some(result) = outcome else {
            tracing::debug!(handle = handle.0, "Transfer task stopped after cancellation");
            return;
        };

        // A cancel racing with completion wins: publish nothing
        let remaining = {
            let mut active = self.active.lock();
            if active.remove(&handle).is_none() {
                return;
            }
            active.len()
        };

        match result {
            Ok((temp_path, status)) => {
                tracing::debug!(
                    handle = handle.0,
                    status,
                    temp = %temp_path.display(),
                    "HTTP transfer finished"
                );
                self.emit(
                    handle,
                    TransferEvent::CompletedToTemporaryLocation {
                        temp_path,
                        status_code: Some(status),
                    },
                );
            }
            Err(e) => {
                tracing::warn!(handle = handle.0, url = %request.url, error = %e, "HTTP transfer failed");
                self.emit(
                    handle,
                    TransferEvent::Failed {
                        status_code: None,
                        error: Some(e.to_string()),
                    },
                );
            }
        }

        if remaining == 0 {
            self.events.send(SessionEvent::AllEventsDelivered).ok();
        }
    }

    /// Stream the response body to disk, returning the temporary file and status
    async fn download(
        &self,
        handle: TransferHandle,
        request: &TransferRequest,
        part_path: &Path,
    ) -> Result<(PathBuf, u16)> {
        let offset = match tokio::fs::metadata(part_path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        let response = self.send(handle, request, offset).await?;
        let status = response.status();
        let temp_path = self.config.temp_dir.join(format!(
            "{}-{}.download",
            url_digest(&request.url),
            handle
        ));

        if status.as_u16() >= 400 {
            if status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
                // Stale part file; the next attempt starts from zero
                tokio::fs::remove_file(part_path).await.ok();
            }
            // Error bodies never touch the resumable part file
            let body = response.bytes().await.map_err(Error::transport)?;
            tokio::fs::write(&temp_path, &body).await?;
            return Ok((temp_path, status.as_u16()));
        }

        let resumed = offset > 0 && status == reqwest::StatusCode::PARTIAL_CONTENT;
        let remaining_len = response.content_length().map(|len| len as i64);
        let (mut written, expected) = if resumed {
            let offset = offset as i64;
            (offset, remaining_len.map(|len| len + offset).unwrap_or(-1))
        } else {
            (0, remaining_len.unwrap_or(-1))
        };

        let mut file = if resumed {
            tracing::info!(
                handle = handle.0,
                offset = written,
                expected_total = expected,
                "Resuming transfer"
            );
            self.emit(
                handle,
                TransferEvent::Resumed {
                    offset: written,
                    expected_total: expected,
                },
            );
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(part_path)
                .await?
        } else {
            tokio::fs::File::create(part_path).await?
        };

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(Error::transport)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as i64;
            self.emit(
                handle,
                TransferEvent::Progress {
                    bytes_written: written,
                    bytes_expected: expected,
                },
            );
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(part_path, &temp_path).await?;
        Ok((temp_path, status.as_u16()))
    }

    /// Send the request, waiting for connectivity when the connection fails
    async fn send(
        &self,
        handle: TransferHandle,
        request: &TransferRequest,
        offset: u64,
    ) -> Result<reqwest::Response> {
        let deadline = Instant::now() + self.config.connectivity_timeout;
        let mut waiting = false;

        loop {
            let req = build_request(&self.client, request, offset)?;
            match self.client.execute(req).await {
                Ok(response) => {
                    if waiting {
                        tracing::info!(handle = handle.0, "Connectivity restored");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_connect() => {
                    if !waiting {
                        waiting = true;
                        tracing::warn!(
                            handle = handle.0,
                            url = %request.url,
                            error = %e,
                            "Transfer waiting for connectivity"
                        );
                        self.emit(handle, TransferEvent::WaitingForConnectivity);
                    }
                    if Instant::now() >= deadline {
                        return Err(Error::transport(format!(
                            "connectivity not restored within {}s: {}",
                            self.config.connectivity_timeout.as_secs(),
                            e
                        )));
                    }
                    tokio::time::sleep(self.config.connectivity_poll_interval).await;
                }
                Err(e) => return Err(Error::transport(e)),
            }
        }
    }
}

/// Translate a request description into a reqwest request
///
/// A non-zero `offset` adds a `Range: bytes=<offset>-` header.
fn build_request(
    client: &reqwest::Client,
    request: &TransferRequest,
    offset: u64,
) -> Result<reqwest::Request> {
    let method = reqwest::Method::from_bytes(request.method.as_bytes())
        .map_err(|_| Error::InvalidRequest(format!("invalid method '{}'", request.method)))?;
    let url = reqwest::Url::parse(&request.url)
        .map_err(|e| Error::InvalidRequest(format!("invalid URL '{}': {}", request.url, e)))?;

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in &request.headers {
        let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::InvalidRequest(format!("invalid header name '{}'", name)))?;
        let value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|_| Error::InvalidRequest(format!("invalid value for header '{}'", name)))?;
        headers.append(name, value);
    }
    if offset > 0 {
        let range = reqwest::header::HeaderValue::from_str(&format!("bytes={}-", offset))
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
        headers.insert(reqwest::header::RANGE, range);
    }

    let mut builder = client.request(method, url).headers(headers);
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }
    builder
        .build()
        .map_err(|e| Error::InvalidRequest(e.to_string()))
}

/// Stable file-name-safe digest of a URL
fn url_digest(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}
