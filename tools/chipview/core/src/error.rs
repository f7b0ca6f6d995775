use std::fmt;

use thiserror::Error;

use crate::backend::BackendKind;

/// Programmable stage a shader diagnostic belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// One failed tier, kept so the final error can report the whole chain.
#[derive(Debug)]
pub struct TierFailure {
    pub kind: BackendKind,
    pub cause: RenderError,
}

#[derive(Debug, Error)]
pub enum RenderError {
    /// Adapter, device or context acquisition failed.
    #[error("{kind} unavailable: {reason}")]
    BackendUnavailable { kind: BackendKind, reason: String },

    /// Buffer, texture, sampler or bind group allocation failed.
    #[error("failed to create {what}: {reason}")]
    ResourceCreationFailure { what: &'static str, reason: String },

    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompileFailure { stage: ShaderStage, log: String },

    #[error("shader program failed to link: {log}")]
    ProgramLinkFailure { log: String },

    /// Every tier was tried and rejected.
    #[error("No renderer available")]
    NoBackendAvailable { attempts: Vec<TierFailure> },

    /// The engine handed out a buffer that does not match its own dimensions.
    #[error("framebuffer is {actual} bytes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    /// The active backend lost its device or surface after negotiation.
    #[error("render session lost: {reason}")]
    SessionLost { reason: String },
}

impl RenderError {
    pub fn unavailable(kind: BackendKind, reason: impl Into<String>) -> Self {
        RenderError::BackendUnavailable { kind, reason: reason.into() }
    }

    pub fn resource(what: &'static str, reason: impl Into<String>) -> Self {
        RenderError::ResourceCreationFailure { what, reason: reason.into() }
    }

    /// Multi-line description including every tier cause, for logs.
    pub fn chain(&self) -> String {
        match self {
            RenderError::NoBackendAvailable { attempts } => {
                let mut out = self.to_string();
                for attempt in attempts {
                    out.push_str(&format!("\n  {}: {}", attempt.kind, attempt.cause));
                }
                out
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_lists_every_tier() {
        let err = RenderError::NoBackendAvailable {
            attempts: vec![
                TierFailure {
                    kind: BackendKind::ModernGpu,
                    cause: RenderError::unavailable(BackendKind::ModernGpu, "no adapter"),
                },
                TierFailure {
                    kind: BackendKind::LegacyRaster,
                    cause: RenderError::ProgramLinkFailure { log: "bad varyings".into() },
                },
            ],
        };

        let chain = err.chain();
        assert!(chain.starts_with("No renderer available"));
        assert!(chain.contains("modern GPU: modern GPU unavailable: no adapter"));
        assert!(chain.contains("legacy raster: shader program failed to link: bad varyings"));
    }

    #[test]
    fn shader_errors_name_their_stage() {
        let err = RenderError::ShaderCompileFailure {
            stage: ShaderStage::Fragment,
            log: "0:3: syntax error".into(),
        };
        assert_eq!(err.to_string(), "fragment shader failed to compile: 0:3: syntax error");
    }
}
