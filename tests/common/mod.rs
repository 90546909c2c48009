//! Shared utilities for the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use component_engine::{Component, ComponentBase, ComponentError, EngineHandle};

/// Ordered log of `"<phase>:<name>"` entries shared between components.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub label: String,
}

/// Component that records every lifecycle call in a journal.
pub struct Recorder {
    base: ComponentBase,
    journal: Journal,
    fail_start: bool,
    label: Mutex<Option<String>>,
}

impl Recorder {
    pub fn new(name: &str, journal: &Journal) -> Self {
        Self {
            base: ComponentBase::new(name),
            journal: journal.clone(),
            fail_start: false,
            label: Mutex::new(None),
        }
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn label(&self) -> Option<String> {
        self.label.lock().unwrap().clone()
    }

    fn record(&self, phase: &str) {
        let entry = format!("{phase}:{}", Component::name(self));
        self.journal.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Component for Recorder {
    type Config = RecorderConfig;

    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ComponentBase {
        &mut self.base
    }

    async fn configure(&self, config: RecorderConfig) -> Result<(), ComponentError> {
        self.record("configure");
        *self.label.lock().unwrap() = Some(config.label);
        Ok(())
    }

    async fn start(&self, _engine: EngineHandle) -> Result<(), ComponentError> {
        self.record("start");
        if self.fail_start {
            return Err(ComponentError::failed("recorder refused to start"));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ComponentError> {
        self.record("shutdown");
        Ok(())
    }
}

/// Raw component table with the given entries, one `[name]` table each.
pub fn component_tables(names: &[&str]) -> toml::Table {
    names
        .iter()
        .map(|name| (name.to_string(), toml::Value::Table(toml::Table::new())))
        .collect()
}

/// Start a TCP server that accepts connections and keeps them open.
pub async fn start_mock_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 256];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });

    addr
}

/// Start a TCP server that closes every connection right after accepting it.
pub async fn start_closing_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                drop(socket);
            });
        }
    });

    addr
}
