use std::fmt;

use thiserror::Error;

/// Pipeline stage that produced a tagged error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Synthesize,
    Load,
    Normalize,
    Chunk,
    Featurize,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Synthesize => "synthesize",
            Stage::Load => "load",
            Stage::Normalize => "normalize",
            Stage::Chunk => "chunk",
            Stage::Featurize => "featurize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors produced by melsync-core.
#[derive(Debug, Error)]
pub enum MelsyncError {
    #[error("failed to decode audio: {0}")]
    Decode(#[source] hound::Error),

    #[error("invalid pipeline state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    #[error("tile shape invariant violated: expected {expected:?}, got {actual:?}")]
    ShapeInvariant {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("resampler error: {0}")]
    Resample(String),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("voice '{actor}/{style}' not found (available: {available})")]
    VoiceNotFound {
        actor: String,
        style: String,
        available: String,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<MelsyncError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MelsyncError {
    /// Tag an error with the stage that produced it. Already-tagged errors
    /// keep their original stage.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            tagged @ MelsyncError::Stage { .. } => tagged,
            other => MelsyncError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage tag, if the error went through the orchestrator.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            MelsyncError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying stage error with any stage tag stripped.
    pub fn root(&self) -> &MelsyncError {
        match self {
            MelsyncError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, MelsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tag_is_kept_on_retag() {
        let err = MelsyncError::Cancelled.at(Stage::Featurize).at(Stage::Load);
        assert_eq!(err.stage(), Some(Stage::Featurize));
        assert!(matches!(err.root(), MelsyncError::Cancelled));
    }

    #[test]
    fn tagged_message_names_stage() {
        let err = MelsyncError::EmptyInput("text").at(Stage::Synthesize);
        assert_eq!(err.to_string(), "synthesize stage failed: empty input: text");
    }
}
