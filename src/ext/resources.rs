//! Invocation references used by the derived composite states.
//!
//! The composite expansions splice in external list-transformation
//! functions (initialize an empty result list, extract loop inputs,
//! consolidate cycle results, finalize the collected output). Those
//! functions live entirely outside this crate and are referenced purely by
//! opaque identifier strings, supplied here as an explicit configuration
//! value keyed by role.

use crate::error::BuildError;
use serde::{Deserialize, Serialize};

/// The six invocation references required by the `For` and
/// `LimitedParallel` expansions.
///
/// Built through [`ExtResourcesBuilder`], which requires every role to be
/// present and non-empty — a composite can never observe a missing entry.
///
/// By contract (not enforced here), the referenced functions implement:
/// - `Initializer`: wraps its input as `[input, []]`
/// - `Extractor`: returns the first element of its input pair
/// - `Consolidator`: appends a cycle's results onto the accumulated list
/// - `Finalizer` / `ParallelFinalizer`: flatten collected iteration results
///   into a single list, for sequential and concurrent loops respectively
/// - `LimitedParallelConsolidator`: concatenates a list of result lists
///
/// # Example
///
/// ```rust
/// use statecraft::ext::ExtResources;
///
/// let resources = ExtResources::builder()
///     .initializer("arn:aws:lambda:eu-west-1:1234:function:init")
///     .extractor("arn:aws:lambda:eu-west-1:1234:function:extract")
///     .consolidator("arn:aws:lambda:eu-west-1:1234:function:consolidate")
///     .finalizer("arn:aws:lambda:eu-west-1:1234:function:finalize")
///     .parallel_finalizer("arn:aws:lambda:eu-west-1:1234:function:finalize-par")
///     .limited_parallel_consolidator("arn:aws:lambda:eu-west-1:1234:function:lp-consolidate")
///     .build()
///     .unwrap();
/// assert!(resources.initializer().ends_with("init"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtResources {
    initializer: String,
    extractor: String,
    consolidator: String,
    finalizer: String,
    parallel_finalizer: String,
    limited_parallel_consolidator: String,
}

impl ExtResources {
    pub fn builder() -> ExtResourcesBuilder {
        ExtResourcesBuilder::default()
    }

    pub fn initializer(&self) -> &str {
        &self.initializer
    }

    pub fn extractor(&self) -> &str {
        &self.extractor
    }

    pub fn consolidator(&self) -> &str {
        &self.consolidator
    }

    pub fn finalizer(&self) -> &str {
        &self.finalizer
    }

    pub fn parallel_finalizer(&self) -> &str {
        &self.parallel_finalizer
    }

    pub fn limited_parallel_consolidator(&self) -> &str {
        &self.limited_parallel_consolidator
    }
}

/// Builder for [`ExtResources`]; every role is required.
#[derive(Default, Debug)]
pub struct ExtResourcesBuilder {
    initializer: Option<String>,
    extractor: Option<String>,
    consolidator: Option<String>,
    finalizer: Option<String>,
    parallel_finalizer: Option<String>,
    limited_parallel_consolidator: Option<String>,
}

fn required(value: Option<String>, role: &'static str) -> Result<String, BuildError> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(BuildError::MissingExtResource { role }),
    }
}

impl ExtResourcesBuilder {
    pub fn initializer(mut self, reference: impl Into<String>) -> Self {
        self.initializer = Some(reference.into());
        self
    }

    pub fn extractor(mut self, reference: impl Into<String>) -> Self {
        self.extractor = Some(reference.into());
        self
    }

    pub fn consolidator(mut self, reference: impl Into<String>) -> Self {
        self.consolidator = Some(reference.into());
        self
    }

    pub fn finalizer(mut self, reference: impl Into<String>) -> Self {
        self.finalizer = Some(reference.into());
        self
    }

    pub fn parallel_finalizer(mut self, reference: impl Into<String>) -> Self {
        self.parallel_finalizer = Some(reference.into());
        self
    }

    pub fn limited_parallel_consolidator(mut self, reference: impl Into<String>) -> Self {
        self.limited_parallel_consolidator = Some(reference.into());
        self
    }

    pub fn build(self) -> Result<ExtResources, BuildError> {
        Ok(ExtResources {
            initializer: required(self.initializer, "Initializer")?,
            extractor: required(self.extractor, "Extractor")?,
            consolidator: required(self.consolidator, "Consolidator")?,
            finalizer: required(self.finalizer, "Finalizer")?,
            parallel_finalizer: required(self.parallel_finalizer, "ParallelFinalizer")?,
            limited_parallel_consolidator: required(
                self.limited_parallel_consolidator,
                "LimitedParallelConsolidator",
            )?,
        })
    }
}
