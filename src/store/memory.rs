use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Mutation, SessionStore, StoreError, StoreResult};
use crate::types::*;

/// Session store that keeps everything in process memory
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self) -> StoreResult<Session> {
        let session = Session::new(ulid::Ulid::new().to_string());
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> StoreResult<Session> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn apply(&self, id: &str, mutation: Mutation) -> StoreResult<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        session.apply(mutation);
        Ok(session.clone())
    }

    async fn delete_if_empty(&self, id: &str) -> StoreResult<bool> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(session) if session.is_empty() => {
                sessions.remove(id);
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }

    async fn delete_session(&self, id: &str) -> StoreResult<bool> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn session_ids(&self) -> StoreResult<Vec<SessionId>> {
        Ok(self.sessions.read().await.keys().cloned().collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(name: &str) -> Mutation {
        Mutation::Join {
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let store = InMemorySessionStore::new();
        let created = store.create_session().await.unwrap();

        let fetched = store.get_session(&created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert!(fetched.participants.is_empty());
        assert!(!fetched.votes_revealed);
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let store = InMemorySessionStore::new();
        let a = store.create_session().await.unwrap();
        let b = store.create_session().await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.session_ids().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let store = InMemorySessionStore::new();
        let result = store.get_session("nope").await;
        assert_eq!(result, Err(StoreError::NotFound("nope".to_string())));
    }

    #[tokio::test]
    async fn test_apply_returns_post_mutation_state() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await.unwrap();

        let after = store.apply(&session.id, join("Alice")).await.unwrap();
        assert!(after.participants.contains_key("Alice"));

        let stored = store.get_session(&session.id).await.unwrap();
        assert_eq!(stored, after);
    }

    #[tokio::test]
    async fn test_apply_unknown_session() {
        let store = InMemorySessionStore::new();
        let result = store.apply("nope", Mutation::Reveal).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_if_empty() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await.unwrap();
        store.apply(&session.id, join("Alice")).await.unwrap();

        assert_eq!(store.delete_if_empty(&session.id).await, Ok(false));

        store
            .apply(
                &session.id,
                Mutation::RemoveParticipant {
                    name: "Alice".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(store.delete_if_empty(&session.id).await, Ok(true));
        assert!(store.get_session(&session.id).await.is_err());
        assert!(store.session_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_session() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await.unwrap();
        store.apply(&session.id, join("Alice")).await.unwrap();

        assert_eq!(store.delete_session(&session.id).await, Ok(true));
        assert_eq!(store.delete_session(&session.id).await, Ok(false));
    }

    #[tokio::test]
    async fn test_concurrent_joins_same_name() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let id = session.id.clone();
            tasks.push(tokio::spawn(async move {
                store.apply(&id, join("Alice")).await.unwrap()
            }));
        }

        let mut suits = Vec::new();
        for task in tasks {
            let state = task.await.unwrap();
            suits.push(state.participant("Alice").unwrap().suit);
        }

        let stored = store.get_session(&session.id).await.unwrap();
        assert_eq!(stored.participants.len(), 1);
        let suit = stored.participant("Alice").unwrap().suit;
        assert!(suits.iter().all(|s| *s == suit));
    }
}
