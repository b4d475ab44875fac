//! The HTTP primitive: one outbound request, one buffered response.
//!
//! Stateless. The caller measures elapsed time around [`request`] and owns
//! every returned buffer. Errors form a closed taxonomy whose [`kind`] names
//! are part of the result envelope sent back to the coordinator.
//!
//! [`kind`]: TransportError::kind

use std::time::Duration;

use reqwest::Url;

use crate::api::HttpMethod;

/// Hard cap on buffered response bodies. One byte past this fails the job.
pub(crate) const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

pub(crate) const USER_AGENT: &str = "EZworker/1.0";
pub(crate) const ACCEPT: &str = "application/json";

#[derive(Debug, thiserror::Error)]
pub(crate) enum TransportError {
    #[error("invalid target url: {0:?}")]
    InvalidUrl(String),
    #[error("target url has no host: {0:?}")]
    NoHost(String),
    #[error("connect failed: {0}")]
    RequestFailed(reqwest::Error),
    #[error("send failed: {0}")]
    SendFailed(reqwest::Error),
    #[error("receive failed: {0}")]
    ReceiveFailed(reqwest::Error),
    #[error("response body exceeds {MAX_RESPONSE_BYTES} bytes")]
    ReadFailed,
    #[error("request timed out")]
    Timeout,
}

impl TransportError {
    /// Stable name reported as the `error_kind` of a failed job.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            TransportError::InvalidUrl(_) => "InvalidUrl",
            TransportError::NoHost(_) => "NoHost",
            TransportError::RequestFailed(_) => "RequestFailed",
            TransportError::SendFailed(_) => "SendFailed",
            TransportError::ReceiveFailed(_) => "ReceiveFailed",
            TransportError::ReadFailed => "ReadFailed",
            TransportError::Timeout => "Timeout",
        }
    }
}

/// Status and fully buffered body of one response.
#[derive(Debug)]
pub(crate) struct Fetched {
    pub(crate) status: u16,
    pub(crate) body: Vec<u8>,
}

/// Parse a job target into a request URL and the rate-limiter host key.
///
/// The host key is the lowercased network authority, ports and scheme
/// excluded. Anything that is not absolute `http`/`https` is rejected here,
/// before the limiter or the network is ever touched.
pub(crate) fn prepare(target_url: &str) -> Result<(Url, String), TransportError> {
    let url =
        Url::parse(target_url).map_err(|_| TransportError::InvalidUrl(target_url.to_string()))?;
    let host = url
        .host_str()
        .map(|host| host.to_ascii_lowercase())
        .ok_or_else(|| TransportError::NoHost(target_url.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok((url, host)),
        _ => Err(TransportError::InvalidUrl(target_url.to_string())),
    }
}

/// Issue one request and buffer the full response up to [`MAX_RESPONSE_BYTES`].
///
/// The fixed identity headers are always attached; `Content-Type` only when a
/// non-empty body is sent. The timeout covers the whole exchange, body read
/// included.
pub(crate) async fn request(
    http: &reqwest::Client,
    method: HttpMethod,
    url: Url,
    headers: &[(String, String)],
    body: Option<&[u8]>,
    timeout: Duration,
) -> Result<Fetched, TransportError> {
    let mut req = http
        .request(method.into(), url)
        .timeout(timeout)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .header(reqwest::header::ACCEPT, ACCEPT);
    for (name, value) in headers {
        req = req.header(name, value);
    }
    if let Some(body) = body {
        if !body.is_empty() {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }
    }

    let res = req.send().await.map_err(classify_send_error)?;
    let status = res.status().as_u16();
    let body = read_capped(res).await?;
    Ok(Fetched { status, body })
}

fn classify_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::RequestFailed(err)
    } else {
        TransportError::SendFailed(err)
    }
}

async fn read_capped(mut res: reqwest::Response) -> Result<Vec<u8>, TransportError> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let chunk = res.chunk().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::ReceiveFailed(err)
            }
        })?;
        let Some(chunk) = chunk else {
            return Ok(buf);
        };
        if buf.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(TransportError::ReadFailed);
        }
        buf.extend_from_slice(&chunk);
    }
}
