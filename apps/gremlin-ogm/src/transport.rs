//! # Rexster HTTP Client
//!
//! Sends Gremlin scripts to Rexster's `tp/gremlin` extension and hands the
//! result rows back to the mapper.

use crate::config::{ConnectionConfig, Endpoint};
use gremlin_ogm_core::primitives::ROLLBACK;
use gremlin_ogm_core::{OgmError, Params, QueryExecutor};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Blocking client for one graph on one or more Rexster hosts.
#[derive(Debug)]
pub struct RexsterClient {
    http: reqwest::blocking::Client,
    endpoints: Vec<Endpoint>,
    next: AtomicUsize,
    graph: String,
    credentials: Option<(String, Option<String>)>,
}

impl RexsterClient {
    /// Build a client from the `[connection]` settings.
    pub fn new(config: &ConnectionConfig) -> Result<Self, OgmError> {
        let endpoints = config.endpoints()?;
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OgmError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoints,
            next: AtomicUsize::new(0),
            graph: config.graph.clone(),
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
        })
    }

    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Run a script. Transactional calls first roll back whatever
    /// transaction the server thread still holds.
    pub fn execute_script(
        &self,
        script: &str,
        params: &Params,
        transaction: bool,
    ) -> Result<Vec<Value>, OgmError> {
        let script = if transaction {
            format!("{ROLLBACK}\n{script}")
        } else {
            script.to_string()
        };
        let body = serde_json::json!({ "script": script, "params": params });

        let endpoint = self.pick();
        let req = self.request(endpoint).json(&body);
        tracing::debug!(host = %endpoint, script_len = script.len(), params = params.len(), "POST gremlin");
        let resp = self.send(endpoint, req)?;
        self.handle_response(resp)
    }

    /// Round-robin over the configured hosts.
    fn pick(&self) -> &Endpoint {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[idx]
    }

    /// Build a request with JSON headers and optional basic auth.
    fn request(&self, endpoint: &Endpoint) -> reqwest::blocking::RequestBuilder {
        let url = format!("{}/graphs/{}/tp/gremlin", endpoint.base_url(), self.graph);
        let mut req = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some((ref user, ref password)) = self.credentials {
            req = req.basic_auth(user, password.as_ref());
        }
        req
    }

    /// Send a request and map connection errors.
    fn send(
        &self,
        endpoint: &Endpoint,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, OgmError> {
        req.send()
            .map_err(|e| OgmError::Query(format!("cannot reach Rexster at {endpoint}: {e}")))
    }

    /// Non-200 becomes a query error carrying the server's message;
    /// 200 yields the `results` rows.
    fn handle_response(&self, resp: reqwest::blocking::Response) -> Result<Vec<Value>, OgmError> {
        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| OgmError::Query(format!("reading response: {e}")))?;
        tracing::debug!(status = status.as_u16(), body_len = text.len(), "gremlin response");

        let parsed: Option<Value> = serde_json::from_str(&text).ok();
        if status != reqwest::StatusCode::OK {
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("error"))
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or(text);
            return Err(OgmError::Query(message));
        }

        let mut parsed = parsed.ok_or_else(|| {
            OgmError::Deserialization(format!("response is not JSON: {}", truncate(&text)))
        })?;
        match parsed.get_mut("results").map(Value::take) {
            Some(Value::Array(rows)) => Ok(rows),
            Some(Value::Null) => Ok(Vec::new()),
            Some(single) => Ok(vec![single]),
            None => Err(OgmError::Deserialization(
                "response has no 'results' field".to_string(),
            )),
        }
    }
}

impl QueryExecutor for RexsterClient {
    fn execute(&self, script: &str, params: &Params) -> Result<Vec<Value>, OgmError> {
        self.execute_script(script, params, true)
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hosts_rotate() {
        let config = ConnectionConfig {
            hosts: vec!["a".into(), "b:9000".into()],
            ..ConnectionConfig::default()
        };
        let client = RexsterClient::new(&config).expect("client");
        assert_eq!(client.pick().host, "a");
        assert_eq!(client.pick().host, "b");
        assert_eq!(client.pick().host, "a");
    }

    #[test]
    fn construction_validates_hosts() {
        let config = ConnectionConfig {
            hosts: vec![],
            ..ConnectionConfig::default()
        };
        assert!(matches!(RexsterClient::new(&config), Err(OgmError::Config(_))));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(300);
        assert_eq!(truncate(&long).chars().count(), 200);
        assert_eq!(truncate("short"), "short");
    }
}
