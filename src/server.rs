use std::sync::Arc;

use crate::schema::SchemaContainer;

/// The API being served: where it is mounted and what it serves.
pub trait Server: Send + Sync {
    /// Base URL (or just base path) that every href is relative to.
    fn url(&self) -> &str;

    fn schemas(&self) -> &SchemaContainer;
}

#[derive(Debug, Clone)]
pub struct JsonApiServer {
    base_url: String,
    schemas: Arc<SchemaContainer>,
}

impl JsonApiServer {
    pub fn new(base_url: impl Into<String>, schemas: Arc<SchemaContainer>) -> Self {
        Self {
            base_url: base_url.into(),
            schemas,
        }
    }

    pub fn schema_container(&self) -> Arc<SchemaContainer> {
        self.schemas.clone()
    }
}

impl Server for JsonApiServer {
    fn url(&self) -> &str {
        &self.base_url
    }

    fn schemas(&self) -> &SchemaContainer {
        &self.schemas
    }
}
