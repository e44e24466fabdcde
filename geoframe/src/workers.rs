//! Transformations CRS attribuées à chaque thread de travail
//!
//! Un objet de transformation n'est jamais partagé : chaque thread possède le
//! sien, indexé par `ThreadId`. Le verrou ne protège que l'emprunt et la
//! restitution ; la transformation elle-même s'exécute hors verrou.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::crs::CrsTransform;

type Handles = HashMap<ThreadId, Box<dyn CrsTransform>>;

/// Pool de transformations, une par thread
#[derive(Default)]
pub struct WorkerTransforms {
    handles: Mutex<Handles>,
}

impl std::fmt::Debug for WorkerTransforms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerTransforms")
            .field("threads", &self.len())
            .finish()
    }
}

/// Transformation empruntée, restituée au drop
struct Borrowed<'a> {
    pool: &'a WorkerTransforms,
    id: ThreadId,
    handle: Option<Box<dyn CrsTransform>>,
}

impl Drop for Borrowed<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Une transformation installée pendant l'emprunt est prioritaire
            self.pool.lock().entry(self.id).or_insert(handle);
        }
    }
}

impl WorkerTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Le thread courant possède-t-il une transformation ?
    pub fn has_current(&self) -> bool {
        self.lock().contains_key(&thread::current().id())
    }

    /// Installe la transformation du thread courant (remplace l'ancienne)
    pub fn insert_current(&self, transform: Box<dyn CrsTransform>) {
        self.lock().insert(thread::current().id(), transform);
    }

    /// Exécute `f` avec la transformation du thread courant, si elle existe
    pub fn with_current<R>(&self, f: impl FnOnce(&dyn CrsTransform) -> R) -> Option<R> {
        let id = thread::current().id();
        let handle = self.lock().remove(&id)?;
        let borrowed = Borrowed {
            pool: self,
            id,
            handle: Some(handle),
        };
        let transform = borrowed.handle.as_deref()?;
        Some(f(transform))
    }

    /// Libère la transformation du thread courant (fin de vie du worker)
    pub fn release_current(&self) -> bool {
        self.lock().remove(&thread::current().id()).is_some()
    }

    /// Nombre de threads disposant d'une transformation
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Libère toutes les transformations
    pub fn clear(&self) {
        self.lock().clear();
    }
}
