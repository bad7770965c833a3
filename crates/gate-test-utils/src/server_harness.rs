//! Test server harness for E2E testing
//!
//! Provides `TestGateServer`: the real demo router on a random port, with the
//! identity provider's JWKS endpoint replaced by a wiremock server.

use crate::crypto_fixtures::{jwks_document, TestKeypair};
use crate::token_builders::TestClaimsBuilder;
use auth_gate::auth::{AuthGate, KeySetCache, SignatureVerifier};
use auth_gate::config::Config;
use auth_gate::routes;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audience configured on every test server.
pub const TEST_AUDIENCE: &str = "my-api";

const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Global metrics handle shared by all test servers in a process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            // Another harness in the process may already own the global recorder
            routes::init_metrics_recorder().unwrap_or_else(|_| {
                metrics_exporter_prometheus::PrometheusBuilder::new()
                    .build_recorder()
                    .handle()
            })
        })
        .clone()
}

/// Cache settings for a test server. Defaults match production except the
/// fetch timeout, which is short so timeout tests stay fast.
#[derive(Debug, Clone)]
pub struct TestGateOptions {
    pub cache_ttl_seconds: u64,
    pub min_refresh_interval_seconds: u64,
    pub fetch_timeout_seconds: u64,
    pub algorithms: String,
}

impl Default for TestGateOptions {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 300,
            min_refresh_interval_seconds: 10,
            fetch_timeout_seconds: 1,
            algorithms: "RS256".to_string(),
        }
    }
}

/// Test harness for spawning the gate's demo server in E2E tests.
///
/// The issuer domain is the mock server's `host:port`, so tokens must carry
/// `iss = "https://{host:port}/"`; [`TestGateServer::claims`] does this.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_private_route() -> Result<(), anyhow::Error> {
///     let keypair = TestKeypair::primary();
///     let server = TestGateServer::spawn(&[&keypair]).await?;
///
///     let response = reqwest::Client::new()
///         .get(format!("{}/private", server.url()))
///         .bearer_auth(keypair.sign(&server.claims().build()))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGateServer {
    addr: SocketAddr,
    jwks_server: MockServer,
    config: Config,
    gate: Arc<AuthGate>,
    _handle: JoinHandle<()>,
}

impl TestGateServer {
    /// Spawn a server whose provider publishes `keypairs`, with default options.
    pub async fn spawn(keypairs: &[&TestKeypair]) -> Result<Self, anyhow::Error> {
        Self::spawn_with(keypairs, TestGateOptions::default()).await
    }

    /// Spawn a server whose provider publishes `keypairs`.
    ///
    /// The server will:
    /// - Start a mock JWKS endpoint serving `keypairs`
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        keypairs: &[&TestKeypair],
        options: TestGateOptions,
    ) -> Result<Self, anyhow::Error> {
        let jwks_server = MockServer::start().await;
        mount_keys(&jwks_server, keypairs).await;

        let vars = HashMap::from([
            (
                "AUTH0_DOMAIN".to_string(),
                jwks_server.address().to_string(),
            ),
            ("API_AUDIENCE".to_string(), TEST_AUDIENCE.to_string()),
            ("ALGORITHMS".to_string(), options.algorithms.clone()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            (
                "JWKS_CACHE_TTL_SECONDS".to_string(),
                options.cache_ttl_seconds.to_string(),
            ),
            (
                "JWKS_FETCH_TIMEOUT_SECONDS".to_string(),
                options.fetch_timeout_seconds.to_string(),
            ),
            (
                "JWKS_MIN_REFRESH_INTERVAL_SECONDS".to_string(),
                options.min_refresh_interval_seconds.to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        // Same cache settings as AuthGate::from_config, but plain HTTP to the mock
        let key_cache = KeySetCache::new(config.jwks_fetch_timeout())?
            .with_ttl(config.jwks_cache_ttl())
            .with_min_refresh_interval(config.jwks_min_refresh_interval())
            .with_scheme("http");

        let gate = Arc::new(AuthGate::new(
            &config.issuer_domain,
            Arc::new(key_cache),
            SignatureVerifier::from_config(&config),
        ));

        let app = routes::build_routes(Arc::clone(&gate), get_test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            jwks_server,
            config,
            gate,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Issuer domain the gate is configured for (`127.0.0.1:{port}`).
    pub fn issuer_domain(&self) -> &str {
        &self.config.issuer_domain
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The gate serving this server's protected routes.
    pub fn gate(&self) -> &Arc<AuthGate> {
        &self.gate
    }

    /// The mock identity provider.
    pub fn jwks_server(&self) -> &MockServer {
        &self.jwks_server
    }

    /// Claims builder preset with this server's issuer and audience.
    pub fn claims(&self) -> TestClaimsBuilder {
        TestClaimsBuilder::new(self.issuer_domain(), TEST_AUDIENCE)
    }

    /// Replace the published key set, e.g. to simulate rotation.
    /// Also clears the recorded JWKS requests.
    pub async fn publish_keys(&self, keypairs: &[&TestKeypair]) {
        self.jwks_server.reset().await;
        mount_keys(&self.jwks_server, keypairs).await;
    }

    /// Make the JWKS endpoint answer every request with `status`.
    pub async fn fail_jwks(&self, status: u16) {
        self.jwks_server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.jwks_server)
            .await;
    }

    /// Publish `keypairs`, answering each JWKS request only after `delay`.
    pub async fn delay_jwks(&self, keypairs: &[&TestKeypair], delay: Duration) {
        self.jwks_server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_document(keypairs))
                    .set_delay(delay),
            )
            .mount(&self.jwks_server)
            .await;
    }

    /// Number of JWKS requests received since start or the last reset.
    pub async fn jwks_request_count(&self) -> usize {
        self.jwks_server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }
}

impl Drop for TestGateServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

async fn mount_keys(jwks_server: &MockServer, keypairs: &[&TestKeypair]) {
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keypairs)))
        .mount(jwks_server)
        .await;
}
