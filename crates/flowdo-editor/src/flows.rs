//! Named flows saved to a per-user remote store.
//!
//! The hosted backend lives outside this workspace; [`FlowRepository`] is
//! the contract it has to meet. Every call names the signed-in user
//! explicitly, and anonymous calls fail with `NotAuthenticated`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowdo_core::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub String);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlowStoreError {
    #[error("flow storage is not configured")]
    NotConfigured,

    #[error("user must be authenticated to {0} flows")]
    NotAuthenticated(&'static str),

    #[error("you do not have permission to access flow {0}")]
    PermissionDenied(FlowId),

    #[error("flow {0} not found")]
    NotFound(FlowId),

    #[error("flow storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFlow {
    pub id: FlowId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub flow_data: Snapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SavedFlow {
    /// Case-insensitive substring match over title, description and tags.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }
}

/// Fields for a new flow.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFlow {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub flow_data: Snapshot,
}

/// An update always replaces the flow data; the metadata fields change only
/// when present.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowUpdate {
    pub flow_data: Snapshot,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl FlowUpdate {
    pub fn data(flow_data: Snapshot) -> Self {
        Self {
            flow_data,
            title: None,
            description: None,
            tags: None,
        }
    }
}

fn require<'a>(user: Option<&'a UserId>, verb: &'static str) -> Result<&'a UserId, FlowStoreError> {
    user.ok_or(FlowStoreError::NotAuthenticated(verb))
}

#[async_trait]
pub trait FlowRepository: Send + Sync {
    async fn create(&mut self, user: Option<&UserId>, flow: NewFlow) -> Result<FlowId, FlowStoreError>;

    /// `Ok(None)` if no such flow exists.
    async fn load(&self, user: Option<&UserId>, id: &FlowId) -> Result<Option<SavedFlow>, FlowStoreError>;

    async fn update(
        &mut self,
        user: Option<&UserId>,
        id: &FlowId,
        update: FlowUpdate,
    ) -> Result<(), FlowStoreError>;

    async fn delete(&mut self, user: Option<&UserId>, id: &FlowId) -> Result<(), FlowStoreError>;

    /// The user's flows, most recently updated first.
    async fn list(&self, user: Option<&UserId>) -> Result<Vec<SavedFlow>, FlowStoreError>;

    /// Filter the user's flows client-side by `term`.
    async fn search(&self, user: Option<&UserId>, term: &str) -> Result<Vec<SavedFlow>, FlowStoreError> {
        require(user, "search")?;
        let flows = self.list(user).await?;
        Ok(flows.into_iter().filter(|f| f.matches(term)).collect())
    }
}

/// Process-local repository for tests and offline use.
#[derive(Debug, Default)]
pub struct MemoryFlowRepository {
    /// Flow plus a write sequence number that breaks timestamp ties.
    flows: HashMap<FlowId, (SavedFlow, u64)>,
    writes: u64,
}

impl MemoryFlowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    fn next_write(&mut self) -> u64 {
        self.writes += 1;
        self.writes
    }

    fn owned_mut(&mut self, user: &UserId, id: &FlowId) -> Result<&mut (SavedFlow, u64), FlowStoreError> {
        let entry = self
            .flows
            .get_mut(id)
            .ok_or_else(|| FlowStoreError::NotFound(id.clone()))?;
        if entry.0.user_id != *user {
            return Err(FlowStoreError::PermissionDenied(id.clone()));
        }
        Ok(entry)
    }
}

#[async_trait]
impl FlowRepository for MemoryFlowRepository {
    async fn create(&mut self, user: Option<&UserId>, flow: NewFlow) -> Result<FlowId, FlowStoreError> {
        let user = require(user, "save")?;
        let id = FlowId(uuid::Uuid::new_v4().simple().to_string());
        let now = Utc::now();
        let saved = SavedFlow {
            id: id.clone(),
            user_id: user.clone(),
            title: flow.title,
            description: flow.description,
            tags: flow.tags,
            flow_data: flow.flow_data,
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_write();
        self.flows.insert(id.clone(), (saved, seq));
        log::info!("flow {id} saved for {}", user.0);
        Ok(id)
    }

    async fn load(&self, user: Option<&UserId>, id: &FlowId) -> Result<Option<SavedFlow>, FlowStoreError> {
        let user = require(user, "load")?;
        match self.flows.get(id) {
            None => Ok(None),
            Some((flow, _)) if flow.user_id != *user => Err(FlowStoreError::PermissionDenied(id.clone())),
            Some((flow, _)) => Ok(Some(flow.clone())),
        }
    }

    async fn update(
        &mut self,
        user: Option<&UserId>,
        id: &FlowId,
        update: FlowUpdate,
    ) -> Result<(), FlowStoreError> {
        let user = require(user, "update")?.clone();
        let seq = self.next_write();
        let (flow, write) = self.owned_mut(&user, id)?;
        flow.flow_data = update.flow_data;
        flow.updated_at = Utc::now();
        if let Some(title) = update.title {
            flow.title = title;
        }
        if let Some(description) = update.description {
            flow.description = description;
        }
        if let Some(tags) = update.tags {
            flow.tags = tags;
        }
        *write = seq;
        Ok(())
    }

    async fn delete(&mut self, user: Option<&UserId>, id: &FlowId) -> Result<(), FlowStoreError> {
        let user = require(user, "delete")?.clone();
        self.owned_mut(&user, id)?;
        self.flows.remove(id);
        log::info!("flow {id} deleted");
        Ok(())
    }

    async fn list(&self, user: Option<&UserId>) -> Result<Vec<SavedFlow>, FlowStoreError> {
        let user = require(user, "load")?;
        let mut mine: Vec<&(SavedFlow, u64)> = self.flows.values().filter(|(f, _)| f.user_id == *user).collect();
        mine.sort_by(|(a, wa), (b, wb)| b.updated_at.cmp(&a.updated_at).then(wb.cmp(wa)));
        Ok(mine.into_iter().map(|(f, _)| f.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(title: &str) -> NewFlow {
        NewFlow {
            title: title.to_string(),
            description: String::new(),
            tags: Vec::new(),
            flow_data: Snapshot::default(),
        }
    }

    #[test]
    fn search_matches_tags_case_insensitively() {
        let saved = SavedFlow {
            id: FlowId("f".into()),
            user_id: UserId("u".into()),
            title: "Biology".into(),
            description: "cells".into(),
            tags: vec!["Exam-Prep".into()],
            flow_data: Snapshot::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(saved.matches("exam"));
        assert!(saved.matches("BIO"));
        assert!(saved.matches("Cell"));
        assert!(!saved.matches("physics"));
    }

    #[tokio::test]
    async fn anonymous_calls_are_rejected() {
        let mut repo = MemoryFlowRepository::new();
        assert_eq!(
            repo.create(None, flow("x")).await,
            Err(FlowStoreError::NotAuthenticated("save"))
        );
        assert_eq!(repo.list(None).await, Err(FlowStoreError::NotAuthenticated("load")));
        assert_eq!(
            repo.search(None, "x").await,
            Err(FlowStoreError::NotAuthenticated("search"))
        );
    }

    #[tokio::test]
    async fn missing_flow_loads_as_none() {
        let repo = MemoryFlowRepository::new();
        let me = UserId("me".into());
        assert_eq!(repo.load(Some(&me), &FlowId("nope".into())).await, Ok(None));
    }
}
