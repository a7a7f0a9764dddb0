//! RPC transport for management endpoints
//!
//! Newline-delimited JSON over TCP. A request is a single [`RequestEnvelope`]
//! line; the server answers with one or more [`ResponseFrame`] lines. Unary
//! calls read exactly one frame; streaming calls read frames until the end
//! marker or a terminal error. Every read is bounded by the per-RPC deadline
//! from [`TransportConfig`].
//!
//! Security note: only the explicitly-insecure TCP path is implemented here;
//! certificate-based configurations are validated and then rejected so a
//! misconfigured client fails fast instead of silently downgrading.

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use futures::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// A lazy, finite, non-restartable sequence of streamed response items
pub type ResponseStream<T> = BoxStream<'static, Result<T>>;

// =============================================================================
// Wire Types
// =============================================================================

/// One request line sent to a management endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub method: String,
    pub body: serde_json::Value,
}

/// One response line received from a management endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Decoded payload; absent on error and end frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Remote-side failure reported in-band
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// End-of-stream marker; with no error this means success
    #[serde(default)]
    pub end: bool,
}

impl ResponseFrame {
    pub fn body_of<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            body: Some(serde_json::to_value(value)?),
            ..Default::default()
        })
    }

    pub fn error_of(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn end_of_stream() -> Self {
        Self {
            end: true,
            ..Default::default()
        }
    }
}

// =============================================================================
// RPC Channel
// =============================================================================

/// A connection handle to one management endpoint.
///
/// `connect` probes the endpoint so connection failures surface immediately;
/// each RPC then dials its own short-lived connection (there is no
/// multiplexing in this framing).
#[derive(Debug, Clone)]
pub struct RpcChannel {
    addr: String,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl RpcChannel {
    /// Validate the transport settings and probe the endpoint.
    pub async fn connect(addr: &str, cfg: &TransportConfig) -> Result<Self> {
        cfg.validate()?;
        if !cfg.allow_insecure {
            return Err(Error::Configuration(
                "certificate-based transport is not available in this build; \
                 set transport.allow_insecure or terminate TLS in front of the endpoint"
                    .into(),
            ));
        }

        let channel = Self {
            addr: addr.to_string(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
        };

        let probe = channel.dial().await?;
        drop(probe);
        debug!(addr, "management endpoint reachable");

        Ok(channel)
    }

    /// Override the per-RPC deadline.
    pub fn with_request_timeout(mut self, deadline: Duration) -> Self {
        self.request_timeout = deadline;
        self
    }

    async fn dial(&self) -> Result<TcpStream> {
        match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::Connect {
                addr: self.addr.clone(),
                source: e,
            }),
            Err(_) => Err(Error::Timeout {
                addr: self.addr.clone(),
                secs: self.connect_timeout.as_secs(),
            }),
        }
    }

    async fn send_request<Req: Serialize>(
        &self,
        method: &str,
        req: &Req,
    ) -> Result<BufReader<TcpStream>> {
        let envelope = RequestEnvelope {
            method: method.to_string(),
            body: serde_json::to_value(req)?,
        };
        let line = serde_json::to_string(&envelope)?;

        let mut stream = self.dial().await?;
        let write = async {
            stream.write_all(line.as_bytes()).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await
        };
        write.await.map_err(|e| Error::Connect {
            addr: self.addr.clone(),
            source: e,
        })?;

        Ok(BufReader::new(stream))
    }

    async fn read_frame(&self, reader: &mut BufReader<TcpStream>) -> Result<Option<ResponseFrame>> {
        let mut line = String::new();
        let n = match timeout(self.request_timeout, reader.read_line(&mut line)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                return Err(Error::Connect {
                    addr: self.addr.clone(),
                    source: e,
                })
            }
            Err(_) => {
                return Err(Error::Timeout {
                    addr: self.addr.clone(),
                    secs: self.request_timeout.as_secs(),
                })
            }
        };

        if n == 0 {
            return Ok(None);
        }

        let frame = serde_json::from_str(&line).map_err(|e| Error::Payload {
            addr: self.addr.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(frame))
    }

    fn decode_body<Resp: DeserializeOwned>(&self, frame: ResponseFrame) -> Result<Resp> {
        if let Some(reason) = frame.error {
            return Err(Error::Rpc {
                addr: self.addr.clone(),
                reason,
            });
        }
        let body = frame.body.ok_or_else(|| Error::Payload {
            addr: self.addr.clone(),
            reason: "response frame carries no body".into(),
        })?;
        serde_json::from_value(body).map_err(|e| Error::Payload {
            addr: self.addr.clone(),
            reason: e.to_string(),
        })
    }

    /// Issue a unary RPC: one request line, one response frame.
    pub async fn unary<Req, Resp>(&self, method: &str, req: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let mut reader = self.send_request(method, req).await?;
        let frame = self.read_frame(&mut reader).await?.ok_or_else(|| Error::Rpc {
            addr: self.addr.clone(),
            reason: "connection closed before response".into(),
        })?;
        self.decode_body(frame)
    }

    /// Issue a streaming RPC: one request line, then a sequence of response
    /// frames terminated by the end marker or a terminal error.
    pub async fn streaming<Req, Resp>(&self, method: &str, req: &Req) -> Result<ResponseStream<Resp>>
    where
        Req: Serialize,
        Resp: DeserializeOwned + Send + 'static,
    {
        let reader = self.send_request(method, req).await?;
        let channel = self.clone();

        struct StreamState {
            channel: RpcChannel,
            reader: BufReader<TcpStream>,
            done: bool,
        }

        let state = StreamState {
            channel,
            reader,
            done: false,
        };

        let stream = futures::stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }

            let frame = match st.channel.read_frame(&mut st.reader).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    st.done = true;
                    let err = Error::Rpc {
                        addr: st.channel.addr.clone(),
                        reason: "stream closed without end marker".into(),
                    };
                    return Some((Err(err), st));
                }
                Err(e) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
            };

            if frame.end && frame.error.is_none() {
                st.done = true;
                return None;
            }

            let item = st.channel.decode_body(frame);
            if item.is_err() {
                st.done = true;
            }
            Some((item, st))
        });

        Ok(Box::pin(stream))
    }
}
