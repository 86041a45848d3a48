// Collaborator traits
//
// These traits keep the reconciler independent of the wire and the database:
// - ControlTransport sends one GET to the call-center platform and returns its text
// - RecordStore is the generic create/read/update store for leads, callbacks, sales
//
// In-memory implementations live in `memory` for examples and testing.

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::error::{StoreError, TransportError};
use crate::record::{Record, RecordKind};

/// Sends a request target to the platform and returns the raw reply body
#[async_trait]
pub trait ControlTransport: Send + Sync {
    /// Perform the GET; non-2xx statuses and I/O failures are transport errors
    async fn get(&self, url: &Url) -> Result<String, TransportError>;
}

/// Generic record store collaborator
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record from a JSON object of fields
    async fn create(&self, kind: RecordKind, fields: serde_json::Value) -> Result<Record, StoreError>;

    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Record, StoreError>;

    /// Merge `patch` (a JSON object) into the record's fields
    async fn update(
        &self,
        kind: RecordKind,
        id: Uuid,
        patch: serde_json::Value,
    ) -> Result<Record, StoreError>;

    async fn list(&self, kind: RecordKind) -> Result<Vec<Record>, StoreError>;
}
