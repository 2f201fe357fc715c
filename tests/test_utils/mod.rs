//! Test utilities shared by the integration tests.
//!
//! Provides a recording [`Transport`] fake and engine builders so exchanges can
//! be exercised without network access.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use token_exchange::{
    engine::TokenExchangeEngine,
    providers::ProviderRegistry,
    transport::{Transport, TransportError, TransportRequest, TransportResponse},
};

/// Transport fake that records every request and replays canned outcomes in order.
///
/// Once the queue is exhausted the last outcome keeps being returned.
#[derive(Default)]
pub struct RecordingTransport {
    outcomes: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
    last: Mutex<Option<Result<TransportResponse, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn responding(status: u16, body: Value) -> Arc<Self> {
        let transport = Self::new();
        transport.push(Ok(TransportResponse::new(status, body)));
        transport
    }

    pub fn failing(error: TransportError) -> Arc<Self> {
        let transport = Self::new();
        transport.push(Err(error));
        transport
    }

    pub fn push(&self, outcome: Result<TransportResponse, TransportError>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request);

        let next = self.outcomes.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(outcome) = next {
            *last = Some(outcome);
        }
        last.clone()
            .unwrap_or_else(|| Err(TransportError::Other("no canned response".to_string())))
    }
}

/// Engine over the built-in registry and the given transport.
pub fn engine_with(transport: Arc<RecordingTransport>) -> TokenExchangeEngine {
    TokenExchangeEngine::new(Arc::new(ProviderRegistry::builtin()), transport)
        .with_timeout(Duration::from_secs(5))
}

/// A complete RFC 6749 token response.
pub fn token_body() -> Value {
    json!({
        "access_token": "access-token-1",
        "refresh_token": "refresh-token-2",
        "token_type": "Bearer",
        "expires_in": 3599
    })
}
