//! Timeout y reintentos con backoff exponencial para las llamadas remotas.

use std::{future::Future, time::Duration};

use crate::error::{IngestError, Stage};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Tiempo máximo de cada intento.
    pub timeout: Duration,
    /// Intervalo antes del primer reintento.
    pub initial_interval: Duration,
    /// Tiempo total permitido para reintentar. Cero desactiva los reintentos.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            initial_interval: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_elapsed: Duration) -> Self {
        Self {
            timeout,
            max_elapsed,
            ..Self::default()
        }
    }

    /// Un único intento con timeout.
    #[cfg(test)]
    pub fn no_retries(timeout: Duration) -> Self {
        Self::new(timeout, Duration::ZERO)
    }

    fn strategy(&self) -> backoff::ExponentialBackoff {
        backoff::ExponentialBackoffBuilder::default()
            .with_initial_interval(self.initial_interval)
            .with_multiplier(2.0)
            .with_randomization_factor(0.2)
            .with_max_elapsed_time(Some(self.max_elapsed))
            .build()
    }

    /// Ejecuta `op` reintentando sólo los errores remotos transitorios.
    pub async fn run<T, F, Fut>(&self, stage: Stage, mut op: F) -> Result<T, IngestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IngestError>>,
    {
        let timeout = self.timeout;
        let attempt = || {
            let fut = op();
            async move {
                match tokio::time::timeout(timeout, fut).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) if err.is_transient() => {
                        tracing::debug!("Fallo transitorio en {stage}: {err}");
                        Err(backoff::Error::transient(err))
                    }
                    Ok(Err(err)) => Err(backoff::Error::permanent(err)),
                    Err(_) => Err(backoff::Error::transient(IngestError::transient(
                        stage,
                        format!("sin respuesta tras {timeout:?}"),
                    ))),
                }
            }
        };

        backoff::future::retry(self.strategy(), attempt).await
    }
}
