// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! HTTP control surface: configuration read/write and tick invocation.

use std::sync::Arc;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;

use crate::config::Configuration;
use crate::ports::ConfigStore;
use crate::scheduler::Scheduler;

pub const CONFIG_PATH: &str = "/bigstats/config";
pub const TICK_PATH: &str = "/bigstats/tick";

static BADREQUEST: &[u8] = b"Bad request";
static NOTFOUND: &[u8] = b"Not found";

type HttpResponse = Response<BoxBody<Bytes, std::io::Error>>;

#[derive(Debug, Serialize, Deserialize)]
struct ConfigBody {
    config: Configuration,
}

pub struct ControlState {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<dyn ConfigStore>,
}

fn full(bytes: impl Into<Bytes>) -> BoxBody<Bytes, std::io::Error> {
    Full::new(bytes.into()).map_err(|e| match e {}).boxed()
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Result<HttpResponse, hyper::http::Error> {
    let body = serde_json::to_vec(value).unwrap_or_else(|e| {
        error!("Failed to serialize response: {e}");
        b"{}".to_vec()
    });
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full(body))
}

fn bad_request(reason: &str) -> Result<HttpResponse, hyper::http::Error> {
    json_response(StatusCode::BAD_REQUEST, &json!({ "error": reason }))
}

fn not_found() -> Result<HttpResponse, hyper::http::Error> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(full(NOTFOUND))
}

async fn get_config(state: &ControlState) -> Result<HttpResponse, hyper::http::Error> {
    match state.store.load().await {
        Ok(config) => json_response(StatusCode::OK, &json!({ "config": config })),
        Err(e) => {
            error!("{e}");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, &json!({ "error": e.to_string() }))
        }
    }
}

async fn post_config(state: &ControlState, body: &[u8]) -> Result<HttpResponse, hyper::http::Error> {
    let request: ConfigBody = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            warn!("rejecting configuration: {e}");
            return bad_request(&e.to_string());
        }
    };
    let config = match request.config.validate() {
        Ok(config) => config,
        Err(e) => {
            warn!("rejecting configuration: {e}");
            return bad_request(&e.to_string());
        }
    };
    match state.store.save(config).await {
        Ok(saved) => json_response(StatusCode::OK, &json!({ "config": saved })),
        Err(e) => {
            error!("{e}");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, &json!({ "error": e.to_string() }))
        }
    }
}

/// Dispatch one request. Split from the hyper plumbing so it can be driven
/// directly.
pub async fn route(
    state: &ControlState,
    method: &Method,
    path: &str,
    body: &[u8],
) -> Result<HttpResponse, hyper::http::Error> {
    match (method, path) {
        (&Method::GET, CONFIG_PATH) => get_config(state).await,
        (&Method::POST, CONFIG_PATH) => post_config(state, body).await,
        (&Method::POST, TICK_PATH) => {
            debug!("tick requested over http");
            Response::builder()
                .header(CONTENT_TYPE, "text/plain")
                .body(full(state.scheduler.on_tick()))
        }
        _ => {
            info!("{method} Request to unknown endpoint: {path}");
            not_found()
        }
    }
}

async fn handle_request(
    state: Arc<ControlState>,
    req: Request<hyper::body::Incoming>,
) -> Result<HttpResponse, hyper::http::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let body = match req.collect().await {
        Ok(body) => body.to_bytes(),
        Err(e) => {
            error!("Failed to read request body: {e}");
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .body(full(BADREQUEST));
        }
    };
    route(&state, &method, &path, &body).await
}

/// Accept connections until the task is dropped.
pub async fn serve(listener: TcpListener, state: Arc<ControlState>) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("connection from {peer}");
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(Arc::clone(&state), req));
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {err}");
            }
        });
    }
}
