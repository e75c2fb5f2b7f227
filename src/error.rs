//! Errores tipados de la ingesta. El orquestador los inspecciona para decidir
//! si omite un fichero o aborta la ejecución.

use std::{fmt, path::PathBuf};

use thiserror::Error;

/// Servicio remoto que ha fallado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Describe,
    Embed,
    Store,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Describe => "descripción",
            Self::Embed => "embedding",
            Self::Store => "vector store",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("No se pudo leer {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fichero vacío, nada que describir: {}", .0.display())]
    EmptyContent(PathBuf),

    #[error("Error del servicio de {stage}: {message}")]
    Remote {
        stage: Stage,
        message: String,
        /// Si merece la pena reintentar (429, 5xx, caídas de red, timeouts).
        transient: bool,
    },

    #[error("Dimensión del vector incorrecta: se esperaban {expected}, llegaron {actual}")]
    DimensionMismatch { expected: u64, actual: u64 },

    #[error("La carpeta '{}' no existe", .0.display())]
    MissingFolder(PathBuf),
}

impl IngestError {
    /// Error remoto clasificado a partir del código HTTP que aparezca en el mensaje.
    pub fn remote(stage: Stage, err: impl fmt::Display) -> Self {
        let message = err.to_string();
        let transient = is_transient_message(&message);
        Self::Remote {
            stage,
            message,
            transient,
        }
    }

    pub fn transient(stage: Stage, err: impl fmt::Display) -> Self {
        Self::Remote {
            stage,
            message: err.to_string(),
            transient: true,
        }
    }

    pub fn permanent(stage: Stage, err: impl fmt::Display) -> Self {
        Self::Remote {
            stage,
            message: err.to_string(),
            transient: false,
        }
    }

    /// Sólo una precondición estructural aborta la ejecución.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MissingFolder(_))
    }

    /// Errores que merece la pena reintentar.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Remote { transient: true, .. })
    }
}

const PERMANENT_MARKERS: [&str; 5] = [
    "invalid_api_key",
    "invalid api key",
    "invalid_request_error",
    "model_not_found",
    "unauthorized",
];

/// 429 y 5xx se reintentan; el resto de 4xx no. Sin código, sólo se
/// descartan los errores que el proveedor marca como de petición o credenciales.
fn is_transient_message(message: &str) -> bool {
    match http_status(message) {
        Some(429) => true,
        Some(status) if (400..500).contains(&status) => false,
        Some(_) => true,
        None => {
            let lower = message.to_lowercase();
            !PERMANENT_MARKERS.iter().any(|marker| lower.contains(marker))
        }
    }
}

/// Primer número de tres cifras entre 400 y 599 que aparezca aislado.
fn http_status(message: &str) -> Option<u16> {
    message
        .split(|c: char| !c.is_ascii_digit())
        .filter(|token| token.len() == 3)
        .filter_map(|token| token.parse::<u16>().ok())
        .find(|status| (400..600).contains(status))
}
