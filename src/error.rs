//! Renderer error type

use crate::backend::BackendError;
use thiserror::Error;

/// Errors raised while building resources, shaders, pipelines or the frame graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RendererError {
    #[error("no resource descriptor registered for '{0}'")]
    UnknownResourceName(String),
    #[error("resource '{0}' must be created with initial data")]
    MissingResourceData(String),
    #[error("resource '{name}' expects {expected} images, got {actual}")]
    InvalidImageCount {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("no resource instance supplied for '{0}'")]
    ResourceInstanceMissing(String),
    #[error("resource instance '{0}' is not part of the binding list")]
    UnexpectedResourceInstance(String),
    #[error("resource '{name}' is not a {expected}")]
    ResourceKindMismatch { name: String, expected: &'static str },
    #[error("'{name}' appears more than once in {list}")]
    DuplicateName { list: String, name: String },
    #[error("vertex slot '{0}' is required by this template")]
    MissingVertexSlot(String),
    #[error("failed to decode image for '{name}': {message}")]
    ImageDecode { name: String, message: String },
    #[error("images supplied for '{name}' differ in size")]
    ImageSizeMismatch { name: String },
    #[error("scene contains {count} {kind}s, exactly one is required")]
    AmbiguousSceneGraph { kind: &'static str, count: usize },
    #[error("scene has no {missing}")]
    IncompleteScene { missing: &'static str },
    #[error("neither a point light nor a directional light is bound")]
    NoLightBound,
    #[error("shader template '{template}': {message}")]
    ShaderTemplate { template: String, message: String },
    #[error("pipeline '{label}' failed to build: {message}")]
    PipelineBuildFailure { label: String, message: String },
    #[error("GPU device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("cannot {operation} while the renderer is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error(transparent)]
    Backend(BackendError),
}

impl From<BackendError> for RendererError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::PipelineCreationFailed(message) => RendererError::PipelineBuildFailure {
                label: String::from("<backend>"),
                message,
            },
            BackendError::DeviceCreationFailed(message) => RendererError::DeviceUnavailable(message),
            BackendError::DeviceLost => RendererError::DeviceUnavailable("device lost".into()),
            other => RendererError::Backend(other),
        }
    }
}

impl RendererError {
    /// Attach a pipeline label to a build failure coming from the backend
    pub fn for_pipeline(self, label: &str) -> Self {
        match self {
            RendererError::PipelineBuildFailure { message, .. } => {
                RendererError::PipelineBuildFailure {
                    label: label.to_string(),
                    message,
                }
            }
            other => other,
        }
    }
}

pub type RendererResult<T> = Result<T, RendererError>;
