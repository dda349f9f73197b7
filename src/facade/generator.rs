//! Deferred computations for compute-if-absent caching.

use serde_json::Value;

use crate::events::GeneratorRef;
use crate::summary::SourceSpan;

/// A deferred computation passed to [`remember`](crate::facade::CacheFacade::remember),
/// evaluated only on a cache miss.
///
/// Carrying the source span lets the audit trail record the generator's
/// logic rather than just its output.
pub struct Generator {
    compute: Box<dyn FnOnce() -> Value + Send>,
    source: Option<SourceSpan>,
}

impl Generator {
    /// Wrap a computation with no source information.
    pub fn new(compute: impl FnOnce() -> Value + Send + 'static) -> Self {
        Self {
            compute: Box::new(compute),
            source: None,
        }
    }

    /// Attach the computation's source location.
    #[must_use]
    pub fn with_source(mut self, span: SourceSpan) -> Self {
        self.source = Some(span);
        self
    }

    /// The source span, if one was attached.
    #[must_use]
    pub fn source(&self) -> Option<&SourceSpan> {
        self.source.as_ref()
    }

    /// Run the computation, yielding the value and an audit reference.
    pub(crate) fn run(self) -> (Value, GeneratorRef) {
        let reference = GeneratorRef {
            source: self.source,
        };
        ((self.compute)(), reference)
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_run_yields_value_and_reference() {
        let generator = Generator::new(|| json!([1, 2, 3]))
            .with_source(SourceSpan::new("app/service.rs", 10, 12));

        let (value, reference) = generator.run();
        assert_eq!(value, json!([1, 2, 3]));
        assert_eq!(
            reference.source,
            Some(SourceSpan::new("app/service.rs", 10, 12))
        );
    }

    #[test]
    fn test_without_source() {
        let (value, reference) = Generator::new(|| json!(42)).run();
        assert_eq!(value, json!(42));
        assert!(reference.source.is_none());
    }
}
