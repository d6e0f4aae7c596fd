//! Observable events emitted by the engine
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable engine events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Classification
    /// Classification pass begins
    ClassifyBegin,
    /// Classification pass complete
    ClassifyComplete,
    /// Node resolved by the conservative default rule
    ShapeUnregistered,
    /// A rule broke the combination law (FATAL for the pass)
    ClassificationInconsistency,

    // Decomposition
    /// Tree split into provider query and deferred plan
    DecomposeComplete,
    /// Supported parts of an absorbing projection were pushed down
    ProjectionCaptured,

    // Execution
    /// Provider query handed to the provider
    ProviderExecute,
    /// Provider refused the query
    ProviderFailed,
    /// Row source or local operation failed during deferred evaluation
    DeferredEvaluationFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ClassifyBegin => "CLASSIFY_BEGIN",
            Event::ClassifyComplete => "CLASSIFY_COMPLETE",
            Event::ShapeUnregistered => "SHAPE_UNREGISTERED",
            Event::ClassificationInconsistency => "CLASSIFICATION_INCONSISTENCY",
            Event::DecomposeComplete => "DECOMPOSE_COMPLETE",
            Event::ProjectionCaptured => "PROJECTION_CAPTURED",
            Event::ProviderExecute => "PROVIDER_EXECUTE",
            Event::ProviderFailed => "PROVIDER_FAILED",
            Event::DeferredEvaluationFailed => "DEFERRED_EVALUATION_FAILED",
        }
    }

    /// Default level for this event
    pub fn level(&self) -> log::Level {
        match self {
            Event::ClassifyBegin | Event::ClassifyComplete => log::Level::Trace,
            Event::DecomposeComplete | Event::ProjectionCaptured | Event::ProviderExecute => {
                log::Level::Debug
            }
            Event::ShapeUnregistered => log::Level::Warn,
            Event::ClassificationInconsistency
            | Event::ProviderFailed
            | Event::DeferredEvaluationFailed => log::Level::Error,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::ShapeUnregistered.as_str(), "SHAPE_UNREGISTERED");
        assert_eq!(
            Event::ClassificationInconsistency.to_string(),
            "CLASSIFICATION_INCONSISTENCY"
        );
    }

    #[test]
    fn test_failures_log_as_errors() {
        assert_eq!(Event::ClassificationInconsistency.level(), log::Level::Error);
        assert_eq!(Event::DeferredEvaluationFailed.level(), log::Level::Error);
        assert_eq!(Event::ShapeUnregistered.level(), log::Level::Warn);
    }
}
