//! HTTP/1 listener: tokio + hyper, one task per connection.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response as HyperResponse, StatusCode};
use hyper_util::rt::TokioIo;
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::server::ApiServer;
use crate::{RequestContext, Response};

/// Serve `server` on `listener` until `shutdown` resolves.
pub async fn serve<F>(server: Arc<ApiServer>, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down listener");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(x) => x,
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let server = Arc::clone(&server);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let server = Arc::clone(&server);
                        async move { Ok::<_, Infallible>(handle_hyper(server, req).await) }
                    });
                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        debug!(error = %err, %peer, "connection closed with error");
                    }
                });
            }
        }
    }
}

/// Build a multi-thread runtime, bind `config.addr()` and serve until Ctrl-C.
pub fn run(
    server: ApiServer,
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = config.addr();
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(async move {
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, base_url = server.base_url(), "listening");
        let shutdown = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };
        serve(Arc::new(server), listener, shutdown).await?;
        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
    })
}

async fn handle_hyper(
    server: Arc<ApiServer>,
    req: Request<hyper::body::Incoming>,
) -> HyperResponse<Full<Bytes>> {
    let resp = match to_request_context(req).await {
        Ok(ctx) => server.handle(ctx).await,
        Err(err) => Response::text(400, format!("api: cannot read request: {}", err)),
    };
    into_hyper_response(resp)
}

async fn to_request_context(req: Request<hyper::body::Incoming>) -> Result<RequestContext, hyper::Error> {
    let (parts, body) = req.into_parts();
    let headers = parts
        .headers
        .iter()
        .map(|(k, v)| (k.as_str().to_owned(), v.to_str().unwrap_or("").to_owned()))
        .collect();
    let body = body.collect().await?.to_bytes();
    Ok(RequestContext {
        method: parts.method.as_str().to_owned(),
        path: decode_path(parts.uri.path()),
        query: parts
            .uri
            .query()
            .map(RequestContext::parse_query)
            .unwrap_or_default(),
        headers,
        params: Vec::new(),
        body: body.to_vec(),
    })
}

/// Percent-decode a request path; undecodable input is kept as sent.
fn decode_path(raw: &str) -> String {
    match percent_decode_str(raw).decode_utf8() {
        Ok(path) => path.into_owned(),
        Err(_) => raw.to_owned(),
    }
}

fn into_hyper_response(resp: Response) -> HyperResponse<Full<Bytes>> {
    let mut builder = HyperResponse::builder().status(resp.status_code);
    if let Some(content_type) = &resp.content_type {
        builder = builder.header(CONTENT_TYPE, content_type.as_str());
    }
    for (name, value) in &resp.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(resp.body)))
        .unwrap_or_else(|err| {
            warn!(error = %err, "invalid response");
            let mut fallback = HyperResponse::new(Full::new(Bytes::from_static(b"api: invalid response")));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_headers_are_copied() {
        let resp = Response::new(200, "application/json", b"{}".to_vec())
            .with_header("x-content-type-options", "nosniff");
        let hyper_resp = into_hyper_response(resp);
        assert_eq!(hyper_resp.status(), StatusCode::OK);
        assert_eq!(hyper_resp.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(hyper_resp.headers()["x-content-type-options"], "nosniff");
    }

    #[test]
    fn paths_are_percent_decoded() {
        assert_eq!(decode_path("/api/Echo.%65cho"), "/api/Echo.echo");
        assert_eq!(decode_path("/api/a%20b+c"), "/api/a b+c");
        assert_eq!(decode_path("/api/%FF"), "/api/%FF");
    }

    #[test]
    fn bad_header_falls_back_to_500() {
        let resp = Response::text(200, "x").with_header("bad header", "v");
        assert_eq!(into_hyper_response(resp).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
