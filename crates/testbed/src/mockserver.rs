//! Client for the programmable HTTP mock server on the `internet` VM.
//!
//! Tests register one-shot expectations before exercising the deployment,
//! then ask the mock server to verify how often each one was hit.

use crate::http::{client, ensure_success, http_error};
use serde_json::{Value, json};
use std::net::Ipv4Addr;
use std::time::Duration;
use testbed_core::{Error, Result};

pub struct MockServer {
    client: reqwest::Client,
    base_url: String,
    expectations: Vec<Value>,
}

impl MockServer {
    pub fn new(host: Ipv4Addr, port: u16, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: client(timeout, false)?,
            base_url: format!("http://{host}:{port}"),
            expectations: Vec::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests registered through [`MockServer::expect`] since the last clear.
    pub fn expectations(&self) -> &[Value] {
        &self.expectations
    }

    /// Resets the server and installs a low-priority catch-all 404.
    pub async fn clear(&mut self) -> Result<()> {
        self.expectations.clear();
        self.put("reset", None).await?;
        self.put("expectation", Some(&catch_all())).await?;
        Ok(())
    }

    /// Registers an expectation that matches once.
    ///
    /// `expectation` uses the mock server's JSON schema, e.g.
    /// `{"httpRequest": {...}, "httpResponse": {...}}`.
    pub async fn expect(&mut self, expectation: Value) -> Result<()> {
        let body = one_shot(expectation)?;
        let response = self.put("expectation", Some(&body)).await?;
        let created: Value = response.json().await.map_err(http_error)?;
        let request = created
            .pointer("/0/httpRequest")
            .cloned()
            .ok_or_else(|| Error::Parse(format!("mock server returned no httpRequest: {created}")))?;
        self.expectations.push(request);
        Ok(())
    }

    /// Fails the test unless every registered request was received exactly
    /// `times` times.
    pub async fn assert_called(&self, times: u32) -> Result<()> {
        for request in &self.expectations {
            let response = self
                .client
                .put(format!("{}/verify", self.base_url))
                .json(&verification(request, times))
                .send()
                .await
                .map_err(http_error)?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.map_err(http_error)?;
                panic!("mock server verification failed ({status}) for {request}:\n{body}");
            }
        }
        Ok(())
    }

    pub async fn assert_not_called(&self) -> Result<()> {
        self.assert_called(0).await
    }

    async fn put(&self, path: &str, body: Option<&Value>) -> Result<reqwest::Response> {
        let mut request = self.client.put(format!("{}/{path}", self.base_url));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(http_error)?;
        ensure_success(response)
    }
}

fn catch_all() -> Value {
    json!({
        "httpRequest": {},
        "httpResponse": {
            "statusCode": 404,
            "body": "Mockserver fallback",
        },
        "priority": -10,
    })
}

fn one_shot(mut expectation: Value) -> Result<Value> {
    match expectation.as_object_mut() {
        Some(fields) => {
            fields.insert("times".to_string(), json!({"remainingTimes": 1}));
        }
        None => {
            return Err(Error::InvalidConfig(format!(
                "mock server expectation must be an object: {expectation}"
            )));
        }
    }
    Ok(expectation)
}

fn verification(request: &Value, times: u32) -> Value {
    json!({
        "httpRequest": request,
        "times": {
            "atLeast": times,
            "atMost": times,
        },
    })
}
