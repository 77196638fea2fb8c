//! Application state.

use std::sync::Arc;

use handsign_inference::{PredictionPipeline, StartupComponent, StartupError};

use crate::config::ApiConfig;

/// Why startup did not produce a pipeline.
#[derive(Debug, Clone)]
pub struct StartupFailure {
    pub component: StartupComponent,
    pub message: String,
}

impl From<&StartupError> for StartupFailure {
    fn from(err: &StartupError) -> Self {
        Self {
            component: err.component(),
            message: err.to_string(),
        }
    }
}

/// Outcome of the model loading phase.
///
/// Fixed for the life of the process. A failed startup never hands out a
/// partially built pipeline.
#[derive(Debug, Clone)]
pub enum Readiness {
    Ready(Arc<PredictionPipeline>),
    Failed(StartupFailure),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    readiness: Readiness,
}

impl AppState {
    /// State backed by a loaded pipeline.
    pub fn ready(config: ApiConfig, pipeline: PredictionPipeline) -> Self {
        Self {
            config,
            readiness: Readiness::Ready(Arc::new(pipeline)),
        }
    }

    /// State for a service whose startup failed.
    pub fn failed(config: ApiConfig, err: &StartupError) -> Self {
        Self {
            config,
            readiness: Readiness::Failed(err.into()),
        }
    }

    /// Build state from the result of loading the pipeline.
    pub fn from_startup(
        config: ApiConfig,
        startup: Result<PredictionPipeline, StartupError>,
    ) -> Self {
        match startup {
            Ok(pipeline) => Self::ready(config, pipeline),
            Err(err) => Self::failed(config, &err),
        }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// The pipeline, if startup succeeded.
    pub fn pipeline(&self) -> Option<&Arc<PredictionPipeline>> {
        match &self.readiness {
            Readiness::Ready(pipeline) => Some(pipeline),
            Readiness::Failed(_) => None,
        }
    }

    /// The startup failure, if any.
    pub fn startup_failure(&self) -> Option<&StartupFailure> {
        match &self.readiness {
            Readiness::Ready(_) => None,
            Readiness::Failed(failure) => Some(failure),
        }
    }
}
