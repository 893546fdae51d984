//! Terminal states of a message flow

use std::fmt;

/// Pipeline stage that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Downloading,
    Transcribing,
    Replying,
    Synthesizing,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Transcribing => "transcribing",
            Self::Replying => "replying",
            Self::Synthesizing => "synthesizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a flow ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Every stage succeeded
    Done,
    /// Nothing to process; the user was asked for a text message
    Prompted,
    /// A stage failed before anything was delivered
    Failed { stage: Stage },
    /// A stage failed after earlier results were already delivered
    AbortedAfterPartialSuccess { stage: Stage },
}

impl FlowOutcome {
    /// Whether the flow ended in a failure
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed { .. } | Self::AbortedAfterPartialSuccess { .. })
    }

    /// Stage that failed, if any
    #[must_use]
    pub const fn failed_stage(self) -> Option<Stage> {
        match self {
            Self::Failed { stage } | Self::AbortedAfterPartialSuccess { stage } => Some(stage),
            Self::Done | Self::Prompted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_classification() {
        assert!(!FlowOutcome::Done.is_failure());
        assert!(!FlowOutcome::Prompted.is_failure());
        assert!(FlowOutcome::Failed { stage: Stage::Downloading }.is_failure());

        let aborted = FlowOutcome::AbortedAfterPartialSuccess { stage: Stage::Synthesizing };
        assert_eq!(aborted.failed_stage(), Some(Stage::Synthesizing));
        assert_eq!(Stage::Synthesizing.to_string(), "synthesizing");
    }
}
