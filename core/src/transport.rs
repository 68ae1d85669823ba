//! HTTP transport for query request functions.
//!
//! # Design
//! Same split as a host-does-IO client: `build_request` turns a
//! `RequestConfig` into a plain `HttpRequest`, `execute` performs the
//! round-trip, and `parse_json` interprets the `HttpResponse`. Only
//! `execute` touches the network, so the other two are tested without a
//! server. `ureq` is blocking, so `execute` runs it on tokio's blocking pool.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TransportSettings;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestConfig};

/// Executes requests against a base URL.
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    settings: TransportSettings,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_settings(TransportSettings {
            base_url: base_url.to_string(),
            ..TransportSettings::default()
        })
    }

    pub fn with_settings(settings: TransportSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            agent: agent(settings.timeout),
            settings,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a relative URL onto the base URL. Absolute URLs pass through.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("{}{url}", self.base_url)
        } else {
            format!("{}/{url}", self.base_url)
        }
    }

    pub fn build_request<P: Serialize>(&self, config: &RequestConfig<P>) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: config.method,
            url: self.resolve_url(&config.url),
            query: query_pairs(config.params.as_ref())?,
            headers: config.headers.clone(),
            timeout: config.timeout.or(self.settings.timeout),
        })
    }

    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = match request.timeout {
            Some(timeout) if Some(timeout) != self.settings.timeout => agent(Some(timeout)),
            _ => self.agent.clone(),
        };
        tracing::trace!(method = %request.method, url = %request.url, "sending request");
        tokio::task::spawn_blocking(move || execute_blocking(&agent, request))
            .await
            .map_err(|e| ApiError::Network(format!("transport task failed: {e}")))?
    }

    /// Decode a successful response, or map a non-2xx one to
    /// [`ApiError::Transport`].
    pub fn parse_json<O: DeserializeOwned>(&self, response: HttpResponse) -> Result<O, ApiError> {
        if !response.is_success() {
            return Err(transport_error(&response));
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Build, execute and decode in one go.
    pub async fn get_json<P, O>(&self, config: &RequestConfig<P>) -> Result<O, ApiError>
    where
        P: Serialize,
        O: DeserializeOwned,
    {
        let request = self.build_request(config)?;
        let url = request.url.clone();
        let result = self
            .execute(request)
            .await
            .and_then(|response| self.parse_json(response));
        if let Err(error) = &result {
            tracing::warn!(%url, %error, "request failed");
        }
        result
    }
}

fn agent(timeout: Option<std::time::Duration>) -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(timeout)
        .build()
        .new_agent()
}

fn execute_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, ApiError> {
    let mut builder = match request.method {
        HttpMethod::Get => agent.get(&request.url),
    };
    for (key, value) in &request.query {
        builder = builder.query(key, value);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let mut response = builder.call().map_err(|e| ApiError::Network(e.to_string()))?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| ApiError::Network(e.to_string()))?;

    Ok(HttpResponse {
        status,
        headers,
        body,
    })
}

/// Flatten params into query pairs. Params must serialize to a JSON object;
/// `null` fields are dropped and arrays repeat the key.
fn query_pairs<P: Serialize>(params: Option<&P>) -> Result<Vec<(String, String)>, ApiError> {
    let Some(params) = params else {
        return Ok(Vec::new());
    };
    let value = serde_json::to_value(params).map_err(|e| ApiError::Serialization(e.to_string()))?;
    let map = match value {
        Value::Object(map) => map,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(ApiError::Serialization(format!(
                "query params must be an object, got {other}"
            )))
        }
    };
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                pairs.extend(items.iter().map(|item| (key.clone(), scalar(item))));
            }
            other => pairs.push((key, scalar(&other))),
        }
    }
    Ok(pairs)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    status_code: Option<u16>,
    message: Option<Value>,
    error: Option<String>,
}

fn transport_error(response: &HttpResponse) -> ApiError {
    match serde_json::from_str::<ErrorBody>(&response.body) {
        Ok(body) => ApiError::Transport {
            status_code: body.status_code.or(Some(response.status)),
            message: body.message.map(|m| match m {
                Value::String(s) => s,
                Value::Array(items) => items.iter().map(scalar).collect::<Vec<_>>().join(", "),
                other => other.to_string(),
            }),
            error: body.error,
        },
        Err(_) => ApiError::Transport {
            status_code: Some(response.status),
            message: Some(response.body.clone()).filter(|b| !b.is_empty()),
            error: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::http::TransportConfig;

    fn transport() -> HttpTransport {
        HttpTransport::new("http://localhost:3000")
    }

    fn get_config<P>(url: &str, params: Option<P>) -> RequestConfig<P> {
        RequestConfig::new(HttpMethod::Get, url.to_string(), params, TransportConfig::default())
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let transport = HttpTransport::new("http://localhost:3000/");
        assert_eq!(transport.base_url(), "http://localhost:3000");
        assert_eq!(transport.resolve_url("/todos"), "http://localhost:3000/todos");
    }

    #[test]
    fn resolve_url_variants() {
        let t = transport();
        assert_eq!(t.resolve_url("todos/x"), "http://localhost:3000/todos/x");
        assert_eq!(t.resolve_url("https://other.example/a"), "https://other.example/a");
    }

    #[test]
    fn build_request_without_params() {
        let req = transport().build_request(&get_config::<Value>("/todos", None)).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/todos");
        assert!(req.query.is_empty());
        assert!(req.timeout.is_none());
    }

    #[test]
    fn build_request_flattens_params() {
        let params = json!({"page": 2, "verbose": true, "q": "milk", "skip": null, "tag": ["a", "b"]});
        let req = transport().build_request(&get_config("/todos", Some(params))).unwrap();
        let mut query = req.query.clone();
        query.sort();
        assert_eq!(
            query,
            vec![
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "milk".to_string()),
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("verbose".to_string(), "true".to_string()),
            ]
        );
    }

    #[test]
    fn build_request_rejects_scalar_params() {
        let err = transport().build_request(&get_config("/todos", Some(3u32))).unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }

    #[test]
    fn build_request_keeps_headers_and_timeout() {
        let transport_config = TransportConfig::default()
            .header("authorization", "Bearer t")
            .timeout(Duration::from_secs(1));
        let config = RequestConfig::<Value>::new(HttpMethod::Get, "/todos".into(), None, transport_config);
        let req = transport().build_request(&config).unwrap();
        assert_eq!(req.headers, vec![("authorization".to_string(), "Bearer t".to_string())]);
        assert_eq!(req.timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn settings_timeout_is_the_fallback() {
        let transport = HttpTransport::with_settings(TransportSettings {
            base_url: "http://localhost:3000".into(),
            timeout: Some(Duration::from_secs(5)),
        });
        let req = transport.build_request(&get_config::<Value>("/todos", None)).unwrap();
        assert_eq!(req.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_json_success() {
        let todos: Vec<Value> = transport().parse_json(response(200, r#"[{"slug":"a"}]"#)).unwrap();
        assert_eq!(todos.len(), 1);
    }

    #[test]
    fn parse_json_bad_body() {
        let err = transport().parse_json::<Vec<Value>>(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn structured_error_body_is_read() {
        let body = r#"{"statusCode":404,"message":"todo 'x' does not exist","error":"Not Found"}"#;
        let err = transport().parse_json::<Value>(response(404, body)).unwrap_err();
        assert_eq!(
            err,
            ApiError::Transport {
                status_code: Some(404),
                message: Some("todo 'x' does not exist".to_string()),
                error: Some("Not Found".to_string()),
            }
        );
    }

    #[test]
    fn message_arrays_are_joined() {
        let body = r#"{"statusCode":400,"message":["page must be positive","per_page too large"],"error":"Bad Request"}"#;
        let err = transport().parse_json::<Value>(response(400, body)).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Transport { message: Some(ref m), .. } if m == "page must be positive, per_page too large"
        ));
    }

    #[test]
    fn plain_error_body_keeps_status() {
        let err = transport().parse_json::<Value>(response(500, "internal error")).unwrap_err();
        assert_eq!(
            err,
            ApiError::Transport {
                status_code: Some(500),
                message: Some("internal error".to_string()),
                error: None,
            }
        );
    }

    #[test]
    fn empty_error_body_has_no_message() {
        let err = transport().parse_json::<Value>(response(503, "")).unwrap_err();
        assert_eq!(err.status_code(), Some(503));
        assert!(matches!(err, ApiError::Transport { message: None, .. }));
    }
}
