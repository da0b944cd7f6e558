pub mod client;

pub use client::{DeliveryClient, DeliveryError};

use crate::source::record::Record;
use async_trait::async_trait;
use std::fmt;

/// How the collector answered one batch.
///
/// Only `Accepted` lets a cycle commit its offsets; `Rejected` and
/// `TransportError` are equivalent for that purpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Any 2xx response.
    Accepted { status: u16 },
    /// A non-2xx response.
    Rejected { status: u16, body: String },
    /// Connection failure, timeout, or any error before a status arrived.
    TransportError(String),
}

impl DeliveryOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DeliveryOutcome::Accepted { .. })
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Accepted { status } => write!(f, "accepted (HTTP {status})"),
            DeliveryOutcome::Rejected { status, body } => {
                write!(f, "rejected (HTTP {status}): {body}")
            }
            DeliveryOutcome::TransportError(message) => write!(f, "transport error: {message}"),
        }
    }
}

/// Destination for a cycle's batch.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn send(&self, records: &[Record]) -> DeliveryOutcome;
}
