//! Dobles de prueba compartidos por los tests de los módulos.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    error::{IngestError, Stage},
    models::{Distance, VectorStorePoint},
    vector_store::VectorStore,
};

#[derive(Debug, Default)]
struct Collection {
    size: u64,
    points: BTreeMap<u64, VectorStorePoint>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Collection>,
    exists_calls: usize,
    info_calls: usize,
    create_calls: usize,
    upsert_calls: usize,
    failing_paths: HashSet<String>,
}

/// Vector store en memoria que se comporta como Qdrant: los ids son la
/// identidad del punto y la dimensión de la colección es obligatoria.
/// Los clones comparten estado para poder inspeccionarlo tras la ejecución.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Hace fallar los upserts de puntos con esta ruta.
    pub fn fail_upserts_for(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_paths
            .insert(path.to_string());
    }

    pub fn points(&self, collection: &str) -> Vec<VectorStorePoint> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map(|c| c.points.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn stored_size(&self, collection: &str) -> Option<u64> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map(|c| c.size)
    }

    pub fn exists_calls(&self) -> usize {
        self.state.lock().unwrap().exists_calls
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn upsert_calls(&self) -> usize {
        self.state.lock().unwrap().upsert_calls
    }

    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.exists_calls + state.info_calls + state.create_calls + state.upsert_calls
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn collection_exists(&self, name: &str) -> Result<bool, IngestError> {
        let mut state = self.state.lock().unwrap();
        state.exists_calls += 1;
        Ok(state.collections.contains_key(name))
    }

    async fn collection_size(&self, name: &str) -> Result<u64, IngestError> {
        let mut state = self.state.lock().unwrap();
        state.info_calls += 1;
        state
            .collections
            .get(name)
            .map(|c| c.size)
            .ok_or_else(|| {
                IngestError::permanent(
                    Stage::Store,
                    format!("Collection `{name}` doesn't exist!"),
                )
            })
    }

    async fn create_collection(
        &self,
        name: &str,
        size: u64,
        _distance: Distance,
    ) -> Result<(), IngestError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if state.collections.contains_key(name) {
            return Err(IngestError::remote(
                Stage::Store,
                format!("Collection `{name}` already exists!"),
            ));
        }
        state.collections.insert(
            name.to_string(),
            Collection {
                size,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn upsert_points(
        &self,
        collection: &str,
        points: Vec<VectorStorePoint>,
    ) -> Result<(), IngestError> {
        let mut state = self.state.lock().unwrap();
        state.upsert_calls += 1;

        if points
            .iter()
            .any(|p| state.failing_paths.contains(&p.payload.path))
        {
            return Err(IngestError::remote(Stage::Store, "simulated failure"));
        }

        let Some(target) = state.collections.get_mut(collection) else {
            return Err(IngestError::remote(
                Stage::Store,
                format!("Collection `{collection}` doesn't exist!"),
            ));
        };

        for point in points {
            if point.vector.len() as u64 != target.size {
                return Err(IngestError::remote(
                    Stage::Store,
                    format!(
                        "Wrong input: Vector dimension error: expected dim: {}, got {}",
                        target.size,
                        point.vector.len()
                    ),
                ));
            }
            target.points.insert(point.id, point);
        }
        Ok(())
    }
}
