//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Routing is a plain match
//! on method and path; `route` is generic over the request body so the whole
//! router can be driven in-process.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::certifications::CertificationWorkflow;
use crate::config::Args;
use crate::connections::{RequestService, SuggestionService};
use crate::db::MongoClient;
use crate::members::MemberAdmin;
use crate::routes;
use crate::store::{
    MemoryProfileStore, MemoryRequestStore, MongoProfileStore, MongoRequestStore, ProfileStore,
    RequestStore,
};
use crate::types::{ProfileError, Result};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Which backend holds profiles and requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    MongoDb,
    Memory,
}

impl StoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::MongoDb => "mongodb",
            StoreKind::Memory => "memory",
        }
    }
}

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store_kind: StoreKind,
    pub profiles: Arc<dyn ProfileStore>,
    pub requests: Arc<dyn RequestStore>,
    pub jwt: JwtValidator,
    pub suggestions: SuggestionService,
    pub connection_requests: RequestService,
    pub certifications: CertificationWorkflow,
    pub members: MemberAdmin,
}

impl AppState {
    /// Wire the services over the given stores
    pub fn new(
        args: Args,
        store_kind: StoreKind,
        profiles: Arc<dyn ProfileStore>,
        requests: Arc<dyn RequestStore>,
    ) -> Result<Self> {
        let jwt = match (&args.jwt_secret, args.dev_mode) {
            (Some(secret), _) => JwtValidator::new(secret.clone(), args.jwt_expiry_seconds)?,
            (None, true) => JwtValidator::new_dev(),
            (None, false) => {
                return Err(ProfileError::Config(
                    "JWT_SECRET is required in production mode".into(),
                ))
            }
        };

        Ok(Self {
            store_kind,
            suggestions: SuggestionService::new(profiles.clone(), requests.clone()),
            connection_requests: RequestService::new(profiles.clone(), requests.clone()),
            certifications: CertificationWorkflow::new(profiles.clone(), args.save_retries),
            members: MemberAdmin::new(profiles.clone(), args.save_retries),
            profiles,
            requests,
            jwt,
            args,
        })
    }

    /// State backed by in-memory stores (dev mode, tests)
    pub fn in_memory(args: Args) -> Result<Self> {
        Self::new(
            args,
            StoreKind::Memory,
            Arc::new(MemoryProfileStore::new()),
            Arc::new(MemoryRequestStore::new()),
        )
    }

    /// State backed by MongoDB collections
    pub async fn with_mongo(args: Args, mongo: &MongoClient) -> Result<Self> {
        let profiles = Arc::new(MongoProfileStore::new(mongo).await?);
        let requests = Arc::new(MongoRequestStore::new(mongo).await?);
        Self::new(args, StoreKind::MongoDb, profiles, requests)
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Profilehub listening on {} ({} store)",
        state.args.listen,
        state.store_kind.as_str()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - dev JWT secret accepted");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());
    Ok(to_boxed(route(state, req).await))
}

/// Route a request to its handler
pub async fn route<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("Routing {} {}", method, path);

    match (method, path.as_str()) {
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        (_, p) if p.starts_with("/connections/") => {
            routes::handle_connections_request(req, state, p).await
        }

        (_, p) if p == "/users/certifications" || p.starts_with("/users/certifications/") => {
            routes::handle_user_certifications_request(req, state, p).await
        }

        (_, p) if p == "/admin/users" || p.starts_with("/admin/users/") => {
            routes::handle_admin_users_request(req, state, p).await
        }

        (_, p) if p.starts_with("/admin/certifications/") || p.starts_with("/certifications/") => {
            routes::handle_admin_certifications_request(req, state, p).await
        }

        (_, p) => not_found_response(p),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "Authorization, Content-Type")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    debug!("No route for {}", path);
    let body = serde_json::json!({
        "success": false,
        "message": format!("Route {} not found", path),
        "code": "NOT_FOUND",
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
