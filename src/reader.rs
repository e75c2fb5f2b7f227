//! Lectura tolerante de ficheros de código.

use std::{fs, path::Path};

use tracing::warn;

use crate::error::IngestError;

/// Lee el fichero completo como UTF-8.
pub fn try_read_source(path: &Path) -> Result<String, IngestError> {
    fs::read_to_string(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Como `try_read_source`, pero nunca falla: registra el problema y devuelve `None`.
pub fn read_source(path: &Path) -> Option<String> {
    match try_read_source(path) {
        Ok(content) => Some(content),
        Err(err) => {
            warn!("{err}");
            None
        }
    }
}
