#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bot_core::config::{ConfigError, ExchangeConfig};
use bot_core::store::ConfigStore;
use gemini::error::Result;
use gemini::transport::{HttpTransport, TransportRequest, TransportResponse};
use reqwest::StatusCode;

pub const BASE_URL: &str = "https://gemini.test";

/// Transport that answers from a fixed URL table and records every request.
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, (StatusCode, String)>>,
    requests: Mutex<Vec<TransportRequest>>,
    stalled: Mutex<HashSet<String>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{BASE_URL}{path}"), (status, body.to_string()));
    }

    pub fn ok(&self, path: &str, body: &str) {
        self.respond(path, StatusCode::OK, body);
    }

    /// Requests to `path` are recorded and then never answered.
    pub fn stall(&self, path: &str) {
        self.stalled
            .lock()
            .unwrap()
            .insert(format!("{BASE_URL}{path}"));
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        let route = self.routes.lock().unwrap().get(&request.url).cloned();
        let stalled = self.stalled.lock().unwrap().contains(&request.url);
        self.requests.lock().unwrap().push(request);
        if stalled {
            std::future::pending::<()>().await;
        }
        let (status, body) = route.unwrap_or((StatusCode::NOT_FOUND, "not found".to_string()));
        Ok(TransportResponse { status, body })
    }
}

/// In-memory store that counts persistence calls.
pub struct RecordingStore {
    config: Mutex<ExchangeConfig>,
    updates: AtomicUsize,
    fail_updates: bool,
}

impl RecordingStore {
    pub fn new(config: ExchangeConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            updates: AtomicUsize::new(0),
            fail_updates: false,
        })
    }

    pub fn failing(config: ExchangeConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            updates: AtomicUsize::new(0),
            fail_updates: true,
        })
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> ExchangeConfig {
        self.config.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConfigStore for RecordingStore {
    async fn get_exchange_config(&self, name: &str) -> Result<ExchangeConfig, ConfigError> {
        let config = self.config.lock().unwrap().clone();
        if config.name.eq_ignore_ascii_case(name) {
            Ok(config)
        } else {
            Err(ConfigError::ExchangeNotFound(name.to_string()))
        }
    }

    async fn update_exchange_config(&self, config: ExchangeConfig) -> Result<(), ConfigError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates {
            return Err(ConfigError::Io {
                path: "config.yaml".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read only"),
            });
        }
        *self.config.lock().unwrap() = config;
        Ok(())
    }
}

pub fn exchange_config(available: &str, enabled: &str) -> ExchangeConfig {
    ExchangeConfig {
        enabled: true,
        available_pairs: available.to_string(),
        enabled_pairs: enabled.to_string(),
        ..Default::default()
    }
}

pub fn ticker_body(base: &str, quote: &str, last: &str) -> String {
    format!(
        r#"{{"ask":"{last}","bid":"{last}","last":"{last}","volume":{{"{base}":"1.5","{quote}":"150.25","timestamp":1620000000000}}}}"#
    )
}
