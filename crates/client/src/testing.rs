//! Scripted transport for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use gamedata_core::{Error, RawResponse};

use crate::fetch::Transport;

#[derive(Debug, Clone)]
enum Script {
    Respond(RawResponse),
    Fail,
}

/// Transport answering from a per-URL script and counting requests.
///
/// Unscripted URLs fail with a network error.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: RawResponse) {
        self.scripts.lock().unwrap().insert(url.to_string(), Script::Respond(response));
    }

    pub fn respond_json(&self, url: &str, value: serde_json::Value) {
        self.respond(url, RawResponse::new(200, value.to_string()));
    }

    pub fn fail(&self, url: &str) {
        self.scripts.lock().unwrap().insert(url.to_string(), Script::Fail);
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, Error> {
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let script = self.scripts.lock().unwrap().get(url).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail) => Err(Error::Network(format!("{url}: connection refused"))),
            None => Err(Error::Network(format!("{url}: no route"))),
        }
    }
}
