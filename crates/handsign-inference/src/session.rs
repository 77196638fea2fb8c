//! ONNX Runtime session construction shared by the detector and classifier.

use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::{debug, info};

use crate::error::{StartupComponent, StartupError};

/// Create an ONNX Runtime session with automatic execution provider selection.
pub(crate) fn create_session(
    model_path: &Path,
    component: StartupComponent,
) -> Result<Session, StartupError> {
    if !model_path.exists() {
        return Err(StartupError::ModelNotFound {
            component,
            path: model_path.to_path_buf(),
        });
    }

    let model_bytes = std::fs::read(model_path).map_err(|e| {
        StartupError::model_load(component, format!("failed to read model file: {e}"))
    })?;

    let builder = Session::builder()
        .map_err(|e| StartupError::model_load(component, format!("ORT session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| StartupError::model_load(component, format!("ORT opt level: {e}")))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!(component = %component, "Using CUDA execution provider");
                return Ok(session);
            }
        }
        debug!(component = %component, "CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!(component = %component, "Using CoreML execution provider");
                return Ok(session);
            }
        }
        debug!(component = %component, "CoreML execution provider not available, using CPU");
    }

    debug!(component = %component, path = %model_path.display(), "Using CPU execution provider");
    let session = builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| StartupError::model_load(component, format!("ORT load model: {e}")))?;

    info!(component = %component, path = %model_path.display(), "ONNX session created");
    Ok(session)
}
