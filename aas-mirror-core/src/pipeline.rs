//! Severity-tagged results and the step combinators built on top of them.
//!
//! Every fallible step in a reconciliation cycle is a plain closure returning a
//! [`PipelineResult`]. Steps never abort a whole batch: a failed element is
//! recorded with a [`Severity`] and the remaining elements keep flowing. The
//! combinators in this module ([`map_each`], [`map_values`], [`map_each_async`])
//! apply a step to every element of a collection, keep the payloads that are
//! still usable, and merge all child failures into one aggregate whose severity
//! is the worst seen.
//!
//! Panics escaping a step are caught at the step boundary and converted to a
//! FATAL failure carrying the panic message, so a misbehaving source can never
//! crash the scheduler loop.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::future::join_all;
use futures::FutureExt;
use tracing::error;

/// Failure severity, totally ordered: `INFO < WARNING < FATAL`.
///
/// Aggregation always keeps the maximum severity present, so the variant order
/// below is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational, e.g. elements filtered out by a predicate as expected.
    Info,
    /// One item failed; processing of the remaining items continues.
    Warning,
    /// Stop processing this unit and surface prominently.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// An ordered list of human-readable messages plus the severity they amount to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub severity: Severity,
    pub messages: Vec<String>,
}

impl PipelineFailure {
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Fatal,
            messages: vec![message.into()],
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            messages: vec![message.into()],
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            messages: vec![message.into()],
        }
    }

    /// Merge several failures into one: maximum severity, messages concatenated
    /// in input order.
    ///
    /// # Panics
    ///
    /// Panics when `failures` is empty — there is no maximum of nothing.
    /// Callers must check whether anything failed before aggregating.
    pub fn combine<'a>(failures: impl IntoIterator<Item = &'a PipelineFailure>) -> Self {
        let mut severity: Option<Severity> = None;
        let mut messages = Vec::new();
        for failure in failures {
            severity = Some(match severity {
                Some(s) => s.max(failure.severity),
                None => failure.severity,
            });
            messages.extend(failure.messages.iter().cloned());
        }
        let severity = severity
            .unwrap_or_else(|| panic!("PipelineFailure::combine called with no failures"));
        Self { severity, messages }
    }
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.messages.join("; "))
    }
}

/// Value-or-failure container used by every pipeline step.
///
/// `NegligibleFailure` carries both a payload and a failure: the batch is
/// "failed" for aggregation purposes, but downstream steps may still consume
/// the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult<T> {
    Success(T),
    Failure(PipelineFailure),
    NegligibleFailure(T, PipelineFailure),
}

impl<T> PipelineResult<T> {
    pub fn success(payload: T) -> Self {
        PipelineResult::Success(payload)
    }

    pub fn failure(failure: PipelineFailure) -> Self {
        PipelineResult::Failure(failure)
    }

    pub fn negligible_failure(payload: T, failure: PipelineFailure) -> Self {
        PipelineResult::NegligibleFailure(payload, failure)
    }

    /// True for both `Failure` and `NegligibleFailure`.
    pub fn is_failed(&self) -> bool {
        !matches!(self, PipelineResult::Success(_))
    }

    /// True only when processing must stop: the failure is FATAL and there is
    /// no negligible payload left to continue with.
    pub fn should_halt(&self) -> bool {
        matches!(self, PipelineResult::Failure(f) if f.severity == Severity::Fatal)
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            PipelineResult::Success(p) | PipelineResult::NegligibleFailure(p, _) => Some(p),
            PipelineResult::Failure(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            PipelineResult::Success(p) | PipelineResult::NegligibleFailure(p, _) => Some(p),
            PipelineResult::Failure(_) => None,
        }
    }

    pub fn failure_ref(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineResult::Success(_) => None,
            PipelineResult::Failure(f) | PipelineResult::NegligibleFailure(_, f) => Some(f),
        }
    }

    pub fn severity(&self) -> Option<Severity> {
        self.failure_ref().map(|f| f.severity)
    }

    /// Attach a further failure to an existing result, merging severities.
    pub fn merge_failure(self, failure: PipelineFailure) -> Self {
        match self {
            PipelineResult::Success(p) => PipelineResult::NegligibleFailure(p, failure),
            PipelineResult::Failure(f) => {
                PipelineResult::Failure(PipelineFailure::combine([&f, &failure]))
            }
            PipelineResult::NegligibleFailure(p, f) => {
                PipelineResult::NegligibleFailure(p, PipelineFailure::combine([&f, &failure]))
            }
        }
    }
}

/// Aggregate a batch of per-element results with an already-combined payload.
///
/// Returns `Success(combined)` when nothing failed; otherwise a negligible
/// failure carrying `combined`, whose severity is the maximum of all child
/// failures and whose messages concatenate in input order.
pub fn aggregate<T, R>(results: &[PipelineResult<T>], combined: R) -> PipelineResult<R> {
    let failures: Vec<&PipelineFailure> = results.iter().filter_map(|r| r.failure_ref()).collect();
    if failures.is_empty() {
        return PipelineResult::success(combined);
    }
    PipelineResult::negligible_failure(combined, PipelineFailure::combine(failures))
}

/// Run one step, converting an escaping panic into a FATAL failure.
pub fn run_step<U, F>(label: &str, step: F) -> PipelineResult<U>
where
    F: FnOnce() -> PipelineResult<U>,
{
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(step = label, message = %message, "pipeline step panicked");
            PipelineResult::failure(PipelineFailure::fatal(format!(
                "step '{label}' panicked: {message}"
            )))
        }
    }
}

/// Apply a step to every element of a collection independently.
///
/// Payloads of successes and negligible failures are kept (in input order);
/// payloads of fatal failures are dropped. All per-element results are
/// aggregated into the returned result's failure.
pub fn map_each<T, U, F>(label: &str, items: Vec<T>, step: F) -> PipelineResult<Vec<U>>
where
    F: Fn(T) -> PipelineResult<U>,
{
    let results: Vec<PipelineResult<U>> = items
        .into_iter()
        .map(|item| run_step(label, || step(item)))
        .collect();
    collect(results)
}

/// Keyed variant of [`map_each`]: produces an output map with the same keys,
/// dropping only keys whose step failed without a usable payload.
pub fn map_values<K, T, U, F>(label: &str, map: HashMap<K, T>, step: F) -> PipelineResult<HashMap<K, U>>
where
    K: Eq + Hash,
    F: Fn(&K, T) -> PipelineResult<U>,
{
    let mut out = HashMap::new();
    let mut failures: Vec<PipelineFailure> = Vec::new();
    for (key, value) in map {
        match run_step(label, || step(&key, value)) {
            PipelineResult::Success(payload) => {
                out.insert(key, payload);
            }
            PipelineResult::NegligibleFailure(payload, failure) => {
                out.insert(key, payload);
                failures.push(failure);
            }
            PipelineResult::Failure(failure) => failures.push(failure),
        }
    }
    if failures.is_empty() {
        PipelineResult::success(out)
    } else {
        PipelineResult::negligible_failure(out, PipelineFailure::combine(failures.iter()))
    }
}

/// Async variant of [`map_each`]; all element futures run concurrently and the
/// results (and therefore the aggregated messages) keep input order.
pub async fn map_each_async<T, U, F, Fut>(label: &str, items: Vec<T>, step: F) -> PipelineResult<Vec<U>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = PipelineResult<U>>,
{
    let futures: Vec<_> = items
        .into_iter()
        .map(|item| AssertUnwindSafe(step(item)).catch_unwind())
        .collect();
    let outcomes = join_all(futures).await;
    let results: Vec<PipelineResult<U>> = outcomes
        .into_iter()
        .map(|outcome| match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(step = label, message = %message, "pipeline step panicked");
                PipelineResult::failure(PipelineFailure::fatal(format!(
                    "step '{label}' panicked: {message}"
                )))
            }
        })
        .collect();
    collect(results)
}

fn collect<U>(results: Vec<PipelineResult<U>>) -> PipelineResult<Vec<U>> {
    let mut payloads = Vec::new();
    let mut failures = Vec::new();
    for result in results {
        match result {
            PipelineResult::Success(payload) => payloads.push(payload),
            PipelineResult::NegligibleFailure(payload, failure) => {
                payloads.push(payload);
                failures.push(failure);
            }
            PipelineResult::Failure(failure) => failures.push(failure),
        }
    }
    if failures.is_empty() {
        PipelineResult::success(payloads)
    } else {
        PipelineResult::negligible_failure(payloads, PipelineFailure::combine(failures.iter()))
    }
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
