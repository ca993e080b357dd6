//! Schema resolution.
//!
//! A claim schema is a JSON document whose `$metadata.uris.jsonLdContext`
//! names the JSON-LD context the credential is expressed in. The claim
//! engine only needs the context URL and, optionally, the list of subject
//! fields the schema requires.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::crypto::hash::{hash_data, Hash256};
use crate::error::{IssuerError, Result};

/// A schema document that passed context validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSchema {
    pub uri: String,
    pub json_ld_context: String,
    /// `properties.credentialSubject.required`, minus `id`.
    pub required_fields: Vec<String>,
    pub document: Value,
}

impl ValidatedSchema {
    /// Hash identifying (context, credential type), committed in every
    /// claim index.
    pub fn schema_hash(&self, credential_type: &str) -> Hash256 {
        hash_data(&[
            b"schema",
            self.json_ld_context.as_bytes(),
            b"#",
            credential_type.as_bytes(),
        ])
    }

    /// Check that the subject is an object carrying every required field.
    pub fn check_subject(&self, subject: &Value) -> Result<()> {
        let object = subject.as_object().ok_or_else(|| {
            IssuerError::InvalidInput("credentialSubject must be a JSON object".into())
        })?;
        for field in &self.required_fields {
            if !object.contains_key(field) {
                return Err(IssuerError::InvalidInput(format!(
                    "credentialSubject is missing required field {field:?} of {}",
                    self.uri
                )));
            }
        }
        Ok(())
    }
}

/// Source of schema documents.
#[async_trait]
pub trait SchemaResolver: Send + Sync {
    /// Fetch and parse the document behind `uri`.
    async fn fetch(&self, uri: &str) -> Result<Value>;

    /// Check the document carries the context attributes a claim needs.
    fn validate_context(&self, uri: &str, document: &Value) -> Result<ValidatedSchema> {
        validate_schema_document(uri, document)
    }

    /// Fetch then validate.
    async fn resolve(&self, uri: &str) -> Result<ValidatedSchema> {
        let document = self.fetch(uri).await?;
        self.validate_context(uri, &document)
    }
}

/// Default context validation.
pub fn validate_schema_document(uri: &str, document: &Value) -> Result<ValidatedSchema> {
    if !document.is_object() {
        return Err(IssuerError::ProcessSchema(format!(
            "{uri}: schema document is not a JSON object"
        )));
    }
    let context = document
        .pointer("/$metadata/uris/jsonLdContext")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            IssuerError::JsonLdContext(format!("{uri}: $metadata.uris.jsonLdContext is missing"))
        })?;

    let required_fields = document
        .pointer("/properties/credentialSubject/required")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(Value::as_str)
                .filter(|f| *f != "id")
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Ok(ValidatedSchema {
        uri: uri.to_string(),
        json_ld_context: context.to_string(),
        required_fields,
        document: document.clone(),
    })
}

// ── StaticSchemaResolver ─────────────────────────────────────────────────────

/// Resolver over documents registered in memory.
#[derive(Default)]
pub struct StaticSchemaResolver {
    documents: RwLock<HashMap<String, Value>>,
}

impl StaticSchemaResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: &str, document: Value) {
        self.documents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(uri.to_string(), document);
    }

    pub fn with_schema(self, uri: &str, document: Value) -> Self {
        self.insert(uri, document);
        self
    }
}

#[async_trait]
impl SchemaResolver for StaticSchemaResolver {
    async fn fetch(&self, uri: &str) -> Result<Value> {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(uri)
            .cloned()
            .ok_or_else(|| IssuerError::ProcessSchema(format!("{uri}: unknown schema")))
    }
}

// ── DirectorySchemaResolver ──────────────────────────────────────────────────

/// Resolver over JSON files: `file://` URIs, or paths relative to a root
/// directory. Remote URIs are not fetched.
pub struct DirectorySchemaResolver {
    root: PathBuf,
}

impl DirectorySchemaResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn locate(&self, uri: &str) -> Result<PathBuf> {
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if uri.contains("://") {
            return Err(IssuerError::ProcessSchema(format!(
                "{uri}: only file:// and relative schema locations are supported"
            )));
        }
        let relative = Path::new(uri);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(IssuerError::ProcessSchema(format!(
                "{uri}: schema path must stay inside {}",
                self.root.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SchemaResolver for DirectorySchemaResolver {
    async fn fetch(&self, uri: &str) -> Result<Value> {
        let path = self.locate(uri)?;
        let data = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| IssuerError::ProcessSchema(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| IssuerError::ProcessSchema(format!("{}: {e}", path.display())))
    }
}
