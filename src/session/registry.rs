use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::Session;
use crate::error::ProctorError;

/// Process-wide map from session id to `Session`.
///
/// The map lock is held only for lookups and inserts/removals, never while a
/// frame is analysed, so sessions do not serialize each other. At most one
/// `Session` exists per live id: concurrent first use of an id converges on
/// the instance inserted first.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing session for `id`, or a new one inserted atomically.
    pub fn get_or_create(&self, id: &str) -> Result<Arc<Session>, ProctorError> {
        if id.trim().is_empty() {
            return Err(ProctorError::BadRequest("session id must not be empty".into()));
        }
        {
            let sessions = self
                .sessions
                .read()
                .map_err(|_| ProctorError::Poisoned("session registry"))?;
            if let Some(session) = sessions.get(id) {
                return Ok(session.clone());
            }
        }

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ProctorError::Poisoned("session registry"))?;
        // Another caller may have inserted between the two locks.
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                log::info!("session {} created", id);
                Arc::new(Session::new(id))
            })
            .clone();
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, ProctorError> {
        self.sessions
            .read()
            .map_err(|_| ProctorError::Poisoned("session registry"))?
            .get(id)
            .cloned()
            .ok_or_else(|| ProctorError::SessionNotFound(id.to_string()))
    }

    /// Remove `id`. Callers already holding the session may finish with it;
    /// later lookups will not find it.
    pub fn delete(&self, id: &str) -> Result<Arc<Session>, ProctorError> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| ProctorError::Poisoned("session registry"))?
            .remove(id)
            .ok_or_else(|| ProctorError::SessionNotFound(id.to_string()))?;
        log::info!("session {} deleted", id);
        Ok(removed)
    }

    /// Registered ids, sorted. Reflects one point in time.
    pub fn list(&self) -> Result<Vec<String>, ProctorError> {
        let mut ids: Vec<String> = self
            .sessions
            .read()
            .map_err(|_| ProctorError::Poisoned("session registry"))?
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn len(&self) -> Result<usize, ProctorError> {
        Ok(self
            .sessions
            .read()
            .map_err(|_| ProctorError::Poisoned("session registry"))?
            .len())
    }

    pub fn is_empty(&self) -> Result<bool, ProctorError> {
        Ok(self.len()? == 0)
    }
}
