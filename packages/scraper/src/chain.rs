//! Ordered fallback chain of extraction strategies.
//!
//! Strategies run strictly in priority order and the chain stops at the
//! first one that produces at least one candidate. A strategy that
//! returns an error, produces nothing, or panics inside a third-party
//! parser is recorded and skipped; it never blocks the strategies after
//! it. Only when every strategy comes up empty does the caller get
//! [`ChainError::NoExtractionPossible`].

use std::panic::AssertUnwindSafe;

use crate::{ChainError, DocumentKind, ExtractionCandidate, ExtractionHints, RawDocument, StrategyError};

/// One algorithm for turning a document into candidates.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in provenance and logs (e.g. `"text_table"`).
    fn name(&self) -> &'static str;

    /// Returns `true` if the strategy can read documents of this kind.
    fn accepts(&self, kind: DocumentKind) -> bool;

    /// Extracts candidates from `document`.
    ///
    /// # Errors
    ///
    /// Returns [`StrategyError`] if the document cannot be read. The chain
    /// treats this the same as an empty result.
    fn extract(
        &self,
        document: &RawDocument,
        hints: &ExtractionHints,
    ) -> Result<Vec<ExtractionCandidate>, StrategyError>;
}

/// What happened when the chain tried one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The strategy does not read this document kind.
    Skipped,
    /// The strategy ran and found nothing.
    Empty,
    /// The strategy returned an error or panicked.
    Failed(String),
    /// The strategy produced this many candidates.
    Produced(usize),
}

/// One entry in the chain's audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    /// Strategy name.
    pub strategy: &'static str,
    /// Result of the attempt.
    pub outcome: AttemptOutcome,
}

impl std::fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            AttemptOutcome::Skipped => write!(f, "{}: skipped", self.strategy),
            AttemptOutcome::Empty => write!(f, "{}: empty", self.strategy),
            AttemptOutcome::Failed(msg) => write!(f, "{}: failed: {msg}", self.strategy),
            AttemptOutcome::Produced(n) => write!(f, "{}: {n} candidates", self.strategy),
        }
    }
}

/// Formats attempts as a single `; `-separated line.
#[must_use]
pub fn describe_attempts(attempts: &[StrategyAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Successful chain output.
#[derive(Debug, Clone)]
pub struct ChainOutput {
    /// Name of the strategy that produced the candidates.
    pub strategy: &'static str,
    /// The candidates, in document order.
    pub candidates: Vec<ExtractionCandidate>,
    /// Every attempt up to and including the winning one.
    pub attempts: Vec<StrategyAttempt>,
}

/// An ordered list of strategies.
#[derive(Default)]
pub struct StrategyChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl std::fmt::Debug for StrategyChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|s| s.name()))
            .finish()
    }
}

impl StrategyChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy at the lowest priority.
    #[must_use]
    pub fn with(mut self, strategy: Box<dyn ExtractionStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Appends several strategies, keeping their order.
    #[must_use]
    pub fn with_all(mut self, strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    /// Strategy names in priority order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs the strategies in order until one produces candidates.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::NoExtractionPossible`] if every strategy was
    /// skipped, failed, or came up empty.
    pub fn extract(
        &self,
        document: &RawDocument,
        hints: &ExtractionHints,
    ) -> Result<ChainOutput, ChainError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let name = strategy.name();

            if !strategy.accepts(document.kind) {
                attempts.push(StrategyAttempt {
                    strategy: name,
                    outcome: AttemptOutcome::Skipped,
                });
                continue;
            }

            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                strategy.extract(document, hints)
            }));

            let outcome = match result {
                Ok(Ok(candidates)) if !candidates.is_empty() => {
                    log::info!(
                        "Strategy {name} produced {} candidates from {}",
                        candidates.len(),
                        document.url
                    );
                    attempts.push(StrategyAttempt {
                        strategy: name,
                        outcome: AttemptOutcome::Produced(candidates.len()),
                    });
                    return Ok(ChainOutput {
                        strategy: name,
                        candidates,
                        attempts,
                    });
                }
                Ok(Ok(_)) => AttemptOutcome::Empty,
                Ok(Err(e)) => AttemptOutcome::Failed(e.to_string()),
                Err(panic) => AttemptOutcome::Failed(panic_message(panic.as_ref())),
            };

            log::debug!("Strategy {name} yielded nothing for {}: {outcome:?}", document.url);
            attempts.push(StrategyAttempt {
                strategy: name,
                outcome,
            });
        }

        log::warn!(
            "No strategy could extract candidates from {} ({})",
            document.url,
            describe_attempts(&attempts)
        );

        Err(ChainError::NoExtractionPossible {
            url: document.url.clone(),
            attempts,
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .map_or_else(|| "panicked".to_owned(), |msg| format!("panicked: {msg}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use regex::Regex;

    use super::*;
    use crate::{CandidateKind, Provenance};

    enum Behaviour {
        Empty,
        Fail,
        Panic,
        Produce(usize),
    }

    struct Fake {
        name: &'static str,
        behaviour: Behaviour,
        calls: Arc<AtomicUsize>,
    }

    impl Fake {
        fn boxed(name: &'static str, behaviour: Behaviour, calls: &Arc<AtomicUsize>) -> Box<Self> {
            Box::new(Self {
                name,
                behaviour,
                calls: Arc::clone(calls),
            })
        }
    }

    impl ExtractionStrategy for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn accepts(&self, kind: DocumentKind) -> bool {
            kind == DocumentKind::Pdf
        }

        fn extract(
            &self,
            _document: &RawDocument,
            _hints: &ExtractionHints,
        ) -> Result<Vec<ExtractionCandidate>, StrategyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Empty => Ok(Vec::new()),
                Behaviour::Fail => Err(StrategyError::Parse("broken".to_owned())),
                Behaviour::Panic => panic!("parser blew up"),
                Behaviour::Produce(n) => Ok((0..n)
                    .map(|row| ExtractionCandidate {
                        kind: CandidateKind::TextLine {
                            text: format!("row {row}"),
                        },
                        provenance: Provenance {
                            strategy: self.name,
                            page: None,
                            row,
                        },
                    })
                    .collect()),
            }
        }
    }

    fn pdf() -> RawDocument {
        RawDocument::from_bytes("mem://notice.pdf", None, b"%PDF-1.4".to_vec())
    }

    fn hints() -> ExtractionHints {
        ExtractionHints::new(Regex::new(r"\b\d{8}\b").unwrap())
    }

    #[test]
    fn falls_through_empty_and_failing_strategies() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = StrategyChain::new()
            .with(Fake::boxed("a", Behaviour::Empty, &calls))
            .with(Fake::boxed("b", Behaviour::Fail, &calls))
            .with(Fake::boxed("c", Behaviour::Produce(2), &calls));

        let output = chain.extract(&pdf(), &hints()).unwrap();
        assert_eq!(output.strategy, "c");
        assert_eq!(output.candidates.len(), 2);
        assert_eq!(output.attempts.len(), 3);
        assert_eq!(output.attempts[0].outcome, AttemptOutcome::Empty);
        assert!(matches!(output.attempts[1].outcome, AttemptOutcome::Failed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn stops_at_first_productive_strategy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = StrategyChain::new()
            .with(Fake::boxed("a", Behaviour::Produce(1), &calls))
            .with(Fake::boxed("b", Behaviour::Produce(5), &calls));

        let output = chain.extract(&pdf(), &hints()).unwrap();
        assert_eq!(output.strategy, "a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_strategy_does_not_block_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = StrategyChain::new()
            .with(Fake::boxed("a", Behaviour::Panic, &calls))
            .with(Fake::boxed("b", Behaviour::Produce(1), &calls));

        let output = chain.extract(&pdf(), &hints()).unwrap();
        assert_eq!(output.strategy, "b");
        match &output.attempts[0].outcome {
            AttemptOutcome::Failed(msg) => assert!(msg.contains("parser blew up")),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn exhausted_chain_reports_no_extraction_possible() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = StrategyChain::new()
            .with(Fake::boxed("a", Behaviour::Empty, &calls))
            .with(Fake::boxed("b", Behaviour::Fail, &calls));

        let err = chain.extract(&pdf(), &hints()).unwrap_err();
        let ChainError::NoExtractionPossible { attempts, .. } = err;
        assert_eq!(attempts.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn skips_strategies_for_other_document_kinds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = StrategyChain::new().with(Fake::boxed("a", Behaviour::Produce(1), &calls));
        let html = RawDocument::from_bytes("mem://x", Some("text/html".to_owned()), Vec::new());

        let err = chain.extract(&html, &hints()).unwrap_err();
        let ChainError::NoExtractionPossible { attempts, .. } = err;
        assert_eq!(attempts[0].outcome, AttemptOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
