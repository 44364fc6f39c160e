//! Error types for document construction and validation.

use thiserror::Error;

/// Errors raised while constructing states, rules and machines.
///
/// These correspond to a bad value handed to a builder or setter and are
/// reported at the call that supplied the value, before it ever enters the
/// graph.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("state name must be a non-empty string")]
    EmptyStateName,

    #[error("unknown comparator '{0}'")]
    UnknownComparator(String),

    #[error("comparator {comparator} requires a {expected} value, got {actual}")]
    ComparatorValueMismatch {
        comparator: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("variable must be a non-empty path string")]
    EmptyVariable,

    #[error("comparison list must not be empty")]
    EmptyComparisonList,

    #[error("error name list must not be empty")]
    EmptyErrorNameList,

    #[error("error names must be non-empty strings")]
    EmptyErrorName,

    #[error("retry interval must be at least 1 second, got {0}")]
    InvalidRetryInterval(u32),

    #[error("backoff rate must be at least 1.0, got {0}")]
    InvalidBackoffRate(f64),

    #[error("retry list must not be empty (state '{0}')")]
    EmptyRetryList(String),

    #[error("catcher list must not be empty (state '{0}')")]
    EmptyCatcherList(String),

    #[error("a resource must be specified (state '{0}')")]
    MissingResource(String),

    #[error("timeout seconds must be greater than zero (state '{0}')")]
    InvalidTimeoutSeconds(String),

    #[error("heartbeat seconds must be greater than zero (state '{0}')")]
    InvalidHeartbeatSeconds(String),

    #[error("wait duration must be at least 1 second (state '{0}')")]
    InvalidWaitSeconds(String),

    #[error("timestamp must be a UTC datetime of the form YYYY-MM-DDTHH:MM:SSZ (state '{0}')")]
    InvalidTimestamp(String),

    #[error("a wait path must be a non-empty string (state '{0}')")]
    EmptyWaitPath(String),

    #[error("a pass result must be a JSON object or array (state '{0}')")]
    InvalidResultPayload(String),

    #[error("an input or output path must be a non-empty string (state '{0}')")]
    EmptyDataPath(String),

    #[error("choice state must declare at least one rule (state '{0}')")]
    EmptyChoiceList(String),

    #[error("parallel state must declare at least one branch (state '{0}')")]
    EmptyBranchList(String),

    #[error("step must not be zero (state '{0}')")]
    ZeroStep(String),

    #[error("a loop body state is required (state '{0}')")]
    MissingLoopBody(String),

    #[error("iterations must be greater than zero (state '{0}')")]
    InvalidIterations(String),

    #[error("max concurrency must be greater than zero (state '{0}')")]
    InvalidMaxConcurrency(String),

    #[error("iterator path must be a non-empty string (state '{0}')")]
    EmptyIteratorPath(String),

    #[error("state '{name}' of type {state_type} does not support {capability}")]
    UnsupportedCapability {
        name: String,
        state_type: &'static str,
        capability: &'static str,
    },

    #[error("name template must contain a '{{}}' placeholder")]
    InvalidNameTemplate,

    #[error("the {role} resource must be a non-empty invocation reference")]
    MissingExtResource { role: &'static str },

    #[error("only version 1.0 of the states language is supported, got '{0}'")]
    UnsupportedVersion(String),

    #[error("a start state must be specified for the state machine")]
    MissingStartState,
}

/// Errors raised by `validate()` and by serialization.
///
/// Cross-field and graph-wide invariants are only checkable once the graph
/// is assembled, so these surface when a machine, branch or state is
/// validated or rendered to JSON. Serialization re-checks local invariants
/// rather than trusting that `validate()` ran first.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("state '{0}' must either be an end state or declare a next state")]
    MissingTransition(String),

    #[error("state '{0}' declares both a next state and an end state")]
    ConflictingTransition(String),

    #[error("wait state '{0}' must declare exactly one wait specification")]
    MissingWaitTrigger(String),

    #[error("choice state '{0}' must declare at least one rule")]
    EmptyChoiceList(String),

    #[error("parallel state '{0}' must declare at least one branch")]
    EmptyBranchList(String),

    #[error("task state '{0}' must declare a resource")]
    MissingResource(String),

    #[error("duplicate state name '{0}' within a branch")]
    DuplicateStateName(String),

    #[error("retrier on state '{0}' must declare at least one error name")]
    EmptyRetrierErrorList(String),

    #[error("catcher on state '{0}' must declare at least one error name")]
    EmptyCatcherErrorList(String),

    #[error("comparison value does not match comparator {comparator} in a rule of state '{state}'")]
    ComparisonMismatch {
        state: String,
        comparator: &'static str,
    },

    /// Composite expansion constructs states on the fly, so construction
    /// errors can surface during validation or serialization.
    #[error(transparent)]
    Build(#[from] BuildError),
}
