// src/publish.rs

//! Best-effort announcements of changed packages
//!
//! After a new generation of a database is diffed against the installed
//! one, the changed package names are wrapped in a versioned envelope and
//! handed to a [`Publish`] transport. Delivery problems are logged and never
//! fail the synchronization.

use crate::config::Config;
use crate::diff::ChangeSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Schema version of [`RepoUpdateMessage`]
pub const SCHEMA_VERSION: u32 = 1;

/// Publishing failures; kept apart from [`crate::Error`] since they are never escalated
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("connection to message endpoint failed: {0}")]
    Connection(String),

    #[error("message endpoint rejected message with HTTP {0}")]
    Rejected(u16),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Body announcing that a repository changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoUpdateMessage {
    /// Label of the repository, e.g. `f40-updates`
    pub name: String,
    pub packages: Vec<String>,
    /// Artifact URL path, without scheme or host
    pub url: String,
}

/// What actually goes over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub schema_version: u32,
    pub body: RepoUpdateMessage,
}

/// Message transport
pub trait Publish: Send + Sync {
    fn publish(&self, envelope: &Envelope) -> Result<(), PublishError>;
}

/// Transport that only logs; used when no endpoint is configured
#[derive(Debug, Default)]
pub struct LogPublisher;

impl Publish for LogPublisher {
    fn publish(&self, envelope: &Envelope) -> Result<(), PublishError> {
        let json = serde_json::to_string(envelope)?;
        info!("{}: {}", envelope.topic, json);
        Ok(())
    }
}

/// Transport POSTing JSON envelopes to an HTTP endpoint
pub struct HttpPublisher {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpPublisher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Connection(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

impl Publish for HttpPublisher {
    fn publish(&self, envelope: &Envelope) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(envelope)
            .send()
            .map_err(|e| PublishError::Connection(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PublishError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Announces change-sets through a transport
pub struct ChangePublisher {
    topic: String,
    transport: Box<dyn Publish>,
}

impl ChangePublisher {
    pub fn new(topic: impl Into<String>, transport: Box<dyn Publish>) -> Self {
        Self {
            topic: topic.into(),
            transport,
        }
    }

    /// HTTP transport when an endpoint is configured, log-only otherwise
    pub fn from_config(config: &Config) -> Result<Self, PublishError> {
        let transport: Box<dyn Publish> = match &config.publish.endpoint {
            Some(endpoint) => Box::new(HttpPublisher::new(endpoint.clone(), config.http_timeout())?),
            None => Box::new(LogPublisher),
        };
        Ok(Self::new(config.publish.topic.clone(), transport))
    }

    /// Publish `changes` for the repository `label`; empty sets are skipped
    pub fn announce(&self, label: &str, changes: &ChangeSet, source_url: &str) {
        if changes.is_empty() {
            warn!("[{}] No real changes detected, skipping publish", label);
            return;
        }

        let envelope = Envelope {
            topic: self.topic.clone(),
            schema_version: SCHEMA_VERSION,
            body: RepoUpdateMessage {
                name: label.to_string(),
                packages: changes.iter().cloned().collect(),
                url: strip_origin(source_url),
            },
        };

        info!(
            "[{}] Publishing {} changed packages for {}",
            label,
            changes.len(),
            envelope.body.url
        );

        if let Err(e) = self.transport.publish(&envelope) {
            error!("[{}] Failed to publish repo update: {}", label, e);
        }
    }
}

/// Drop scheme and host so the message does not point at the master mirror
pub fn strip_origin(source_url: &str) -> String {
    match url::Url::parse(source_url) {
        Ok(parsed) => parsed.path().trim_start_matches('/').to_string(),
        Err(_) => source_url.to_string(),
    }
}
