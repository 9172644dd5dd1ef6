//! Shared key-injecting transparent reverse proxy (spec §4.6): strips the
//! client's own auth header, injects the server-held credential for the
//! target upstream, strips hop-by-hop headers in both directions, and
//! streams the body through in 32 KiB chunks rather than buffering it
//! whole.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;

use crate::error::AppError;

pub const FLUSH_CHUNK_BYTES: usize = 32 * 1024;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Credential to inject into the outbound request, replacing whatever the
/// client sent (if anything).
pub enum Injected<'a> {
    Bearer(&'a str),
    QueryKey(&'a str),
}

pub struct ProxyRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Forwards `req` to `url`, injecting `credential` and stripping client auth
/// plus hop-by-hop headers. Streams the upstream body back in
/// [`FLUSH_CHUNK_BYTES`]-sized flushes rather than buffering it.
pub async fn forward(
    client: &Client,
    req: ProxyRequest,
    credential: Injected<'_>,
    extra_query: &[(&str, &str)],
) -> Result<(StatusCode, HeaderMap, Body), AppError> {
    let mut headers = req.headers;
    headers.remove("authorization");
    headers.remove("x-api-key");
    headers.remove("x-goog-api-key");
    headers.remove("api-key");
    strip_hop_by_hop(&mut headers);

    let mut builder = client.request(req.method, &req.url).headers(headers).body(req.body);

    match credential {
        Injected::Bearer(token) => {
            builder = builder.bearer_auth(token);
        }
        Injected::QueryKey(key) => {
            builder = builder.query(&[("key", key)]);
        }
    }
    if !extra_query.is_empty() {
        builder = builder.query(extra_query);
    }

    let upstream = builder
        .send()
        .await
        .map_err(|e| AppError::UpstreamTransport(e.to_string()))?;

    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut resp_headers = HeaderMap::new();
    for (name, value) in upstream.headers() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_ref()), HeaderValue::from_bytes(value.as_bytes())) {
            resp_headers.append(name, value);
        }
    }

    let stream = upstream.bytes_stream().map(|r| r.map_err(std::io::Error::other));
    let chunked = futures_util::stream::unfold(stream, |mut s| async move {
        let mut buf = Vec::with_capacity(FLUSH_CHUNK_BYTES);
        while buf.len() < FLUSH_CHUNK_BYTES {
            match s.next().await {
                Some(Ok(bytes)) => buf.extend_from_slice(&bytes),
                Some(Err(e)) => return Some((Err(e), s)),
                None if buf.is_empty() => return None,
                None => break,
            }
        }
        Some((Ok(Bytes::from(buf)), s))
    });

    Ok((status, resp_headers, Body::from_stream(chunked)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        strip_hop_by_hop(&mut headers);
        assert!(headers.get("connection").is_none());
        assert!(headers.get("content-type").is_some());
    }
}
