//! Function call diagnostics
//!
//! [`FunctionDiagnostics`] counts invocations and wall time per function during
//! a calculation pass. At the end of the pass the engine flushes the totals to
//! a [`FormulaLogger`].

use ahash::AHashMap;
use std::error::Error as StdError;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Sink for engine diagnostics
pub trait FormulaLogger: Send + Sync {
    /// Free-form message about `context` (usually a cell or pass name)
    fn log(&self, context: &str, message: &str);

    /// An error scoped to `context`
    fn log_error(&self, context: &str, error: &dyn StdError);

    /// Number of times `function` was invoked during the pass
    fn log_function_count(&self, function: &str, count: u64);

    /// Cumulative time spent inside `function` during the pass
    fn log_function_time(&self, function: &str, elapsed: Duration);
}

/// [`FormulaLogger`] that forwards everything to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl FormulaLogger for TracingLogger {
    fn log(&self, context: &str, message: &str) {
        tracing::info!(target: "sheetcalc::diagnostics", context, "{message}");
    }

    fn log_error(&self, context: &str, error: &dyn StdError) {
        tracing::warn!(target: "sheetcalc::diagnostics", context, error = %error);
    }

    fn log_function_count(&self, function: &str, count: u64) {
        tracing::info!(target: "sheetcalc::diagnostics", function, count, "function calls");
    }

    fn log_function_time(&self, function: &str, elapsed: Duration) {
        tracing::info!(
            target: "sheetcalc::diagnostics",
            function,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "function time"
        );
    }
}

/// Totals for one function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionStats {
    pub count: u64,
    pub total: Duration,
}

/// Per-function invocation counts and cumulative time
#[derive(Debug, Default)]
pub struct FunctionDiagnostics {
    stats: Mutex<AHashMap<String, FunctionStats>>,
}

impl FunctionDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation of `function` taking `elapsed`
    pub fn record(&self, function: &str, elapsed: Duration) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        match stats.get_mut(function) {
            Some(entry) => {
                entry.count += 1;
                entry.total += elapsed;
            }
            None => {
                stats.insert(
                    function.to_string(),
                    FunctionStats {
                        count: 1,
                        total: elapsed,
                    },
                );
            }
        }
    }

    /// Current totals sorted by function name
    pub fn snapshot(&self) -> Vec<(String, FunctionStats)> {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = stats.iter().map(|(k, v)| (k.clone(), *v)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Send totals to `logger` and clear them
    pub fn flush(&self, logger: &dyn FormulaLogger) {
        for (function, stats) in self.snapshot() {
            logger.log_function_count(&function, stats.count);
            logger.log_function_time(&function, stats.total);
        }
        self.reset();
    }

    /// Forget all totals
    pub fn reset(&self) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn is_empty(&self) -> bool {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recorder {
        counts: Mutex<Vec<(String, u64)>>,
    }

    impl FormulaLogger for Recorder {
        fn log(&self, _context: &str, _message: &str) {}
        fn log_error(&self, _context: &str, _error: &dyn StdError) {}
        fn log_function_count(&self, function: &str, count: u64) {
            self.counts.lock().unwrap().push((function.to_string(), count));
        }
        fn log_function_time(&self, _function: &str, _elapsed: Duration) {}
    }

    #[test]
    fn test_record_and_flush() {
        let diagnostics = FunctionDiagnostics::new();
        diagnostics.record("SUM", Duration::from_millis(2));
        diagnostics.record("SUM", Duration::from_millis(3));
        diagnostics.record("ABS", Duration::from_millis(1));

        let snapshot = diagnostics.snapshot();
        assert_eq!(snapshot[1].0, "SUM");
        assert_eq!(snapshot[1].1.count, 2);
        assert_eq!(snapshot[1].1.total, Duration::from_millis(5));

        let recorder = Recorder::default();
        diagnostics.flush(&recorder);
        assert_eq!(
            *recorder.counts.lock().unwrap(),
            vec![("ABS".to_string(), 1), ("SUM".to_string(), 2)]
        );
        assert!(diagnostics.is_empty());
    }
}
