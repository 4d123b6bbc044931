//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Each connection gets its
//! own task; requests are routed by method and path.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::cache::MemoryCache;
use crate::cert::CertificateAuthority;
use crate::config::Args;
use crate::keyset::KeysetManager;
use crate::passcode::{LogMailer, Mailer, PasscodeManager};
use crate::routes::{self, FullBody, MAX_BODY_BYTES};
use crate::types::VerifyError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Anonymity set and ring verification
    pub keyset: KeysetManager,
    /// Member certificate issuance
    pub ca: CertificateAuthority,
    /// Email passcodes
    pub passcode: PasscodeManager,
    /// Backing store shared by `ca` and `passcode`
    pub cache: Arc<MemoryCache>,
    pub started_at: Instant,
}

impl AppState {
    /// Build every component from configuration, delivering passcodes to the log
    pub fn new(args: Args) -> Result<Self, VerifyError> {
        let mailer = Arc::new(LogMailer::new(args.dev_mode));
        Self::with_mailer(args, mailer)
    }

    pub fn with_mailer(args: Args, mailer: Arc<dyn Mailer>) -> Result<Self, VerifyError> {
        let cache = Arc::new(MemoryCache::new(args.cache_config()));
        let keyset = KeysetManager::new(args.keyset_config())?;
        let ca = CertificateAuthority::new(args.cert_config(), cache.clone())?;
        let passcode = PasscodeManager::new(args.passcode_config(), cache.clone(), mailer)?;

        Ok(Self {
            args,
            keyset,
            ca,
            passcode,
            cache,
            started_at: Instant::now(),
        })
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), VerifyError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("Cealgull Verify listening on {}", state.args.listen);

    if state.args.dev_mode {
        warn!("Development mode enabled - passcodes are written to the log");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req: Request<Incoming>| {
                        let state = Arc::clone(&state);
                        async move { Ok::<_, Infallible>(handle_request(state, req).await) }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
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

/// Collect a request body, refusing anything over [`MAX_BODY_BYTES`]
async fn read_body<B>(body: B) -> Result<Bytes, VerifyError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| VerifyError::BadRequest(format!("Failed to read body: {}", e)))
}

/// Route an incoming HTTP request
pub async fn handle_request<B>(state: Arc<AppState>, req: Request<B>) -> Response<FullBody>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let method = parts.method;
    let path = parts.uri.path().to_string();

    debug!("{} {}", method, path);

    let body = match read_body(body).await {
        Ok(body) => body,
        Err(e) => return routes::error_response(e),
    };

    let result = match (&method, path.as_str()) {
        (&Method::GET, "/health") => Ok(routes::health_check(&state)),
        (&Method::POST, "/auth/email") => routes::handle_email(&state, &body),
        (&Method::POST, "/auth/verify") => routes::handle_verify(&state, &body),
        (&Method::POST, "/cert/sign") => routes::handle_sign(&state, &parts.headers, &body),
        (&Method::POST, "/cert/resign") => routes::handle_resign(&state, &body),
        (&Method::POST, "/cert/verify") => routes::handle_verify_cert(&state, &body),
        _ => Err(VerifyError::RouteNotFound(format!("{} {}", method, path))),
    };

    result.unwrap_or_else(routes::error_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use clap::Parser;
    use http_body_util::Full;
    use hyper::StatusCode;

    use crate::keyset::RingCredential;
    use crate::passcode::MailError;
    use crate::routes::cert::{CertRequest, SIGNATURE_HEADER};

    /// Keeps the last message body so tests can read the passcode
    #[derive(Default)]
    struct Inbox(Mutex<Option<String>>);

    impl Inbox {
        fn code(&self) -> String {
            let body = self.0.lock().unwrap().clone().unwrap();
            body.chars().filter(|c| c.is_ascii_digit()).collect()
        }
    }

    impl Mailer for Inbox {
        fn send(&self, _recipient: &str, body: &str) -> Result<(), MailError> {
            *self.0.lock().unwrap() = Some(body.to_string());
            Ok(())
        }
    }

    fn test_state(extra: &[&str]) -> (Arc<AppState>, Arc<Inbox>) {
        let dir = concat!(env!("CARGO_MANIFEST_DIR"), "/testdata");
        let key = format!("{}/ca_key.pem", dir);
        let cert = format!("{}/ca_cert.pem", dir);
        let mut argv = vec![
            "cealgull-verify",
            "--ca-private-key",
            key.as_str(),
            "--ca-certificate",
            cert.as_str(),
            "--anonymity-set-size",
            "4",
        ];
        argv.extend_from_slice(extra);

        let args = Args::try_parse_from(argv).unwrap();
        let inbox = Arc::new(Inbox::default());
        let state = AppState::with_mailer(args, inbox.clone()).unwrap();
        (Arc::new(state), inbox)
    }

    fn post(path: &str, body: serde_json::Value) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> (StatusCode, serde_json::Value) {
        let response = handle_request(Arc::clone(state), req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn random_pub() -> String {
        BASE64.encode(rand::random::<[u8; 32]>())
    }

    /// Run the passcode exchange and return the dispatched credential
    async fn obtain_credential(state: &Arc<AppState>, inbox: &Inbox, account: &str) -> RingCredential {
        let (status, _) = send(state, post("/auth/email", serde_json::json!({"account": account}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(
            state,
            post("/auth/verify", serde_json::json!({"account": account, "code": inbox.code()})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(json).unwrap()
    }

    fn signed_sign_request(credential: &RingCredential, pub_key: &str) -> Request<Full<Bytes>> {
        let req = CertRequest {
            pub_key: pub_key.to_string(),
        };
        let signature = credential.sign(&req.canonical_bytes().unwrap()).unwrap();
        let mut request = post("/cert/sign", serde_json::json!({"pub": pub_key}));
        request
            .headers_mut()
            .insert(SIGNATURE_HEADER, signature.parse().unwrap());
        request
    }

    #[tokio::test]
    async fn test_full_enrolment_flow() {
        let (state, inbox) = test_state(&[]);
        let credential = obtain_credential(&state, &inbox, "alice").await;
        assert_eq!(credential.ring_size(), 4);

        let pub_key = random_pub();
        let (status, json) = send(&state, signed_sign_request(&credential, &pub_key)).await;
        assert_eq!(status, StatusCode::OK);
        let cert = json["cert"].as_str().unwrap().to_string();
        assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));

        let (status, json) = send(&state, post("/cert/verify", serde_json::json!({"cert": cert}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["code"], "N0001");

        let (status, json) = send(&state, post("/cert/resign", serde_json::json!({"pub": pub_key}))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["cert"].as_str().unwrap().starts_with("-----BEGIN CERTIFICATE-----"));

        let (status, json) = send(
            &state,
            Request::get("/health").body(Full::new(Bytes::new())).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["verifications"], 1);
        assert_eq!(json["anonymity_set_size"], 4);
    }

    #[tokio::test]
    async fn test_sign_requires_signature() {
        let (state, _) = test_state(&[]);

        let (status, json) = send(&state, post("/cert/sign", serde_json::json!({"pub": random_pub()}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "S0010");

        let mut req = post("/cert/sign", serde_json::json!({"pub": random_pub()}));
        req.headers_mut().insert(SIGNATURE_HEADER, "bm90IGEgc2ln".parse().unwrap());
        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "A9998");
        assert_eq!(state.keyset.verifications(), 0);
    }

    #[tokio::test]
    async fn test_signature_bound_to_public_key() {
        let (state, inbox) = test_state(&[]);
        let credential = obtain_credential(&state, &inbox, "bob").await;

        // Signature over one key, body carrying another
        let mut req = signed_sign_request(&credential, &random_pub());
        *req.body_mut() = Full::new(Bytes::from(serde_json::json!({"pub": random_pub()}).to_string()));

        let (status, json) = send(&state, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "A9999");
    }

    #[tokio::test]
    async fn test_rotation_invalidates_dispatched_credential() {
        let (state, inbox) = test_state(&["--keyset-capacity", "1"]);
        let credential = obtain_credential(&state, &inbox, "carol").await;

        let (status, _) = send(&state, signed_sign_request(&credential, &random_pub())).await;
        assert_eq!(status, StatusCode::OK);

        let (status, json) = send(&state, signed_sign_request(&credential, &random_pub())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "A9999");
    }

    #[tokio::test]
    async fn test_resign_unregistered_key() {
        let (state, _) = test_state(&[]);
        let (status, json) = send(&state, post("/cert/resign", serde_json::json!({"pub": random_pub()}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "C0003");
    }

    #[tokio::test]
    async fn test_wrong_passcode() {
        let (state, inbox) = test_state(&[]);
        send(&state, post("/auth/email", serde_json::json!({"account": "dave"}))).await;
        let wrong = if inbox.code() == "999999" { "000000" } else { "999999" };

        let (status, json) = send(
            &state,
            post("/auth/verify", serde_json::json!({"account": "dave", "code": wrong})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "E0005");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (state, _) = test_state(&[]);

        let (status, json) = send(&state, post("/cert/verify", serde_json::json!({"nope": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "B0001");

        let (status, json) = send(&state, post("/cert/verify", serde_json::json!({"cert": "junk"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "C0004");

        let (status, json) = send(&state, post("/nowhere", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "B0404");

        let oversized = "x".repeat(MAX_BODY_BYTES + 1);
        let (status, json) = send(&state, post("/auth/email", serde_json::json!({"account": oversized}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "B0001");
    }
}
