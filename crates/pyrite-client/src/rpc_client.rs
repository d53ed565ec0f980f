use anyhow::{bail, Context};
use serde_json::{json, Value};

/// One-shot `call` client over the node's HTTP adapter. Subscriptions are
/// a WebSocket affair; the CLI only ever needs single answers.
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ApiClient {
    pub fn new(host: &str) -> Self {
        let endpoint = if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/call")
        } else {
            format!("http://{host}/call")
        };
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }

    pub async fn call(&self, name: &str, args: Value) -> anyhow::Result<Value> {
        let body = json!({
            "id": 1u64,
            "version": 1u64,
            "type": "call",
            "name": name,
            "args": args,
        });
        let response: Value = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to {}", self.endpoint))?
            .json()
            .await
            .context("parsing node answer")?;

        if response["status"] != "success" {
            bail!(
                "node error on `{name}`: {}",
                response["result"].as_str().unwrap_or("unknown")
            );
        }
        Ok(response["result"].clone())
    }
}
