//! REST client for the replicated row store.
//!
//! Every call walks the configured replica endpoints in order. A transport
//! error, timeout or non-2xx answer moves on to the next endpoint; when the
//! last one fails the call returns [`StoreError::Unavailable`].

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use serde_json::Value;
use tracing::{debug, error, warn};
use valet_core::config::StoreConfig;

use crate::error::{StoreError, StoreResult};
use crate::store::PlacementStore;
use crate::tables::Table;

/// Client for the `keyspaces/{ks}/tables/{table}/rows` API.
#[derive(Debug, Clone)]
pub struct MusicClient {
    endpoints: Vec<String>,
    keyspace: String,
    namespace: Option<String>,
    user_id: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl MusicClient {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        if config.endpoints.is_empty() {
            return Err(StoreError::NoEndpoints);
        }
        Ok(Self {
            endpoints: config
                .endpoints
                .iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            keyspace: config.keyspace.clone(),
            namespace: config.namespace.clone(),
            user_id: config.user_id.clone(),
            password: config.password.clone(),
            timeout: config.request_timeout(),
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    fn rows_path(&self, table: Table, key: Option<&str>) -> String {
        let path = format!("/keyspaces/{}/tables/{}/rows", self.keyspace, table);
        match key {
            Some(key) => format!("{path}?request_id={}", urlencoding::encode(key)),
            None => path,
        }
    }

    fn build_request(
        &self,
        method: &Method,
        uri: &Uri,
        body: &Bytes,
    ) -> Result<Request<Full<Bytes>>, http::Error> {
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(uri.clone())
            .header("content-type", "application/json")
            .header("user-agent", "valet-api/0.1");
        if let Some(authority) = uri.authority() {
            builder = builder.header("host", authority.as_str());
        }
        if let Some(ns) = &self.namespace {
            builder = builder.header("ns", ns);
        }
        if let Some(user_id) = &self.user_id {
            builder = builder.header("userId", user_id);
        }
        if let (Some(user_id), Some(password)) = (&self.user_id, &self.password) {
            builder = builder.header("authorization", basic_auth(user_id, password));
        }
        if let Some(password) = &self.password {
            builder = builder.header("password", password);
        }
        builder.body(Full::new(body.clone()))
    }

    /// Send one call with replica failover. Returns the parsed response
    /// body (`Value::Null` when empty or not JSON).
    async fn call(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> StoreResult<Value> {
        let body = match body {
            Some(document) => Bytes::from(
                serde_json::to_vec(document).map_err(|e| StoreError::Serialize(e.to_string()))?,
            ),
            None => Bytes::new(),
        };

        let mut last = String::new();
        for (attempt, endpoint) in self.endpoints.iter().enumerate() {
            let url = format!("{endpoint}{path}");
            let outcome = match url.parse::<Uri>() {
                Ok(uri) => match self.build_request(&method, &uri, &body) {
                    Ok(request) => send_once(request, self.timeout).await,
                    Err(e) => Err(e.to_string()),
                },
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(value) => {
                    debug!(operation, %endpoint, attempt, "store call succeeded");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(operation, %endpoint, attempt, error = %e, "store call failed, trying next replica");
                    last = e;
                }
            }
        }

        error!(operation, attempts = self.endpoints.len(), "all store replicas failed");
        Err(StoreError::Unavailable {
            operation: operation.to_string(),
            attempts: self.endpoints.len(),
            last,
        })
    }
}

#[async_trait]
impl PlacementStore for MusicClient {
    async fn insert(&self, table: Table, document: &Value) -> StoreResult<()> {
        let path = self.rows_path(table, None);
        self.call("insert", Method::POST, &path, Some(document)).await?;
        Ok(())
    }

    async fn get(&self, table: Table, key: &str) -> StoreResult<Option<Value>> {
        let path = self.rows_path(table, Some(key));
        let response = self.call("get", Method::GET, &path, None).await?;
        Ok(response
            .pointer("/result/row 0")
            .filter(|row| !row.is_null())
            .cloned())
    }

    async fn delete(&self, table: Table, key: &str, document: &Value) -> StoreResult<()> {
        let path = self.rows_path(table, Some(key));
        self.call("delete", Method::DELETE, &path, Some(document)).await?;
        Ok(())
    }
}

/// `Basic` credentials for stores that authenticate with an
/// `Authorization` header.
fn basic_auth(user_id: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user_id}:{password}")))
}

/// Perform a single HTTP/1 exchange with one replica.
async fn send_once(request: Request<Full<Bytes>>, timeout: Duration) -> Result<Value, String> {
    let authority = request
        .uri()
        .authority()
        .ok_or_else(|| format!("no host in {}", request.uri()))?;
    let address = format!("{}:{}", authority.host(), authority.port_u16().unwrap_or(80));

    let exchange = async {
        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .map_err(|e| format!("connect {address}: {e}"))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("handshake {address}: {e}"))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| format!("request {address}: {e}"))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| format!("body {address}: {e}"))?
            .to_bytes();

        if !status.is_success() {
            return Err(format!("{address} answered {status}"));
        }
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body).unwrap_or(Value::Null))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(outcome) => outcome,
        Err(_) => Err(format!("{address} timed out after {timeout:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Clone, Default)]
    struct Seen {
        calls: Arc<Mutex<Vec<(String, Option<String>, Option<String>)>>>,
        authorization: Arc<Mutex<Vec<Option<String>>>>,
    }

    async fn rows_get(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> axum::Json<Value> {
        let ns = headers.get("ns").and_then(|v| v.to_str().ok()).map(String::from);
        let key = query.get("request_id").cloned();
        let authorization = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        seen.authorization.lock().unwrap().push(authorization);
        seen.calls.lock().unwrap().push(("GET".into(), key.clone(), ns));
        match key.as_deref() {
            Some("create-present") => axum::Json(json!({
                "result": {"row 0": {"request_id": "create-present", "status": "{}"}}
            })),
            _ => axum::Json(json!({"result": {}})),
        }
    }

    async fn rows_post(State(seen): State<Seen>, body: String) -> StatusCode {
        seen.calls.lock().unwrap().push(("POST".into(), None, Some(body)));
        StatusCode::OK
    }

    async fn spawn_replica(seen: Seen) -> String {
        let app = Router::new()
            .route(
                "/keyspaces/valet/tables/{table}/rows",
                get(rows_get).post(rows_post),
            )
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn dead_endpoint() -> String {
        // Bind then drop so the port refuses connections.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn client(endpoints: Vec<String>) -> MusicClient {
        let config = StoreConfig {
            endpoints,
            namespace: Some("org.onap.fgps".to_string()),
            user_id: Some("valet".to_string()),
            password: Some("secret".to_string()),
            request_timeout: "2s".to_string(),
            ..StoreConfig::default()
        };
        MusicClient::new(&config).unwrap()
    }

    #[test]
    fn no_endpoints_is_rejected() {
        assert!(matches!(
            MusicClient::new(&StoreConfig::default()),
            Err(StoreError::NoEndpoints)
        ));
    }

    #[test]
    fn rows_path_encodes_key() {
        let client = client(vec!["http://db1:8080/MUSIC/rest/v2/".to_string()]);
        assert_eq!(client.endpoints(), ["http://db1:8080/MUSIC/rest/v2"]);
        assert_eq!(
            client.rows_path(Table::Results, Some("create-a b&c")),
            "/keyspaces/valet/tables/results/rows?request_id=create-a%20b%26c"
        );
        assert_eq!(
            client.rows_path(Table::Requests, None),
            "/keyspaces/valet/tables/requests/rows"
        );
    }

    #[tokio::test]
    async fn get_unwraps_first_row_with_headers() {
        let seen = Seen::default();
        let endpoint = spawn_replica(seen.clone()).await;
        let client = client(vec![endpoint]);

        let row = client.get(Table::Results, "create-present").await.unwrap();
        assert_eq!(row.unwrap()["request_id"], "create-present");
        assert!(client.get(Table::Results, "create-absent").await.unwrap().is_none());

        let calls = seen.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].2.as_deref(), Some("org.onap.fgps"));
        let authorization = seen.authorization.lock().unwrap();
        assert_eq!(authorization[0].as_deref(), Some("Basic dmFsZXQ6c2VjcmV0"));
    }

    #[test]
    fn basic_auth_needs_both_credentials() {
        let config = StoreConfig {
            endpoints: vec!["http://db1:8080".to_string()],
            user_id: Some("valet".to_string()),
            ..StoreConfig::default()
        };
        let client = MusicClient::new(&config).unwrap();
        let uri: Uri = "http://db1:8080/keyspaces/valet/tables/results/rows".parse().unwrap();
        let request = client.build_request(&Method::GET, &uri, &Bytes::new()).unwrap();
        assert!(request.headers().get("authorization").is_none());
        assert_eq!(
            request.headers().get("userId").and_then(|v| v.to_str().ok()),
            Some("valet")
        );
    }

    #[tokio::test]
    async fn fails_over_to_next_replica() {
        let seen = Seen::default();
        let live = spawn_replica(seen.clone()).await;
        let client = client(vec![dead_endpoint().await, live]);

        let document = json!({"values": {"request_id": "create-1"}});
        client.insert(Table::Requests, &document).await.unwrap();

        let calls = seen.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "POST");
        let body: Value = serde_json::from_str(calls[0].2.as_deref().unwrap()).unwrap();
        assert_eq!(body, document);
    }

    #[tokio::test]
    async fn all_replicas_down_is_unavailable() {
        let client = client(vec![dead_endpoint().await, dead_endpoint().await]);
        let err = client.get(Table::Results, "create-1").await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Unavailable { attempts: 2, ref operation, .. } if operation == "get"
        ));
    }
}
