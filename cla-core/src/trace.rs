//! Optional trace output.
//!
//! A [`TraceSink`] receives free-form lines and vector/matrix dumps at fixed
//! points of both phases. Tracing never changes results; with no sink
//! installed every call is a no-op.

use std::fmt::Write as _;

use nalgebra::DMatrix;

/// Where in the algorithm a trace record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracePoint {
    /// Start of a simplex step (state dump)
    SimplexStep,
    /// Prices computed, before choosing the entering variable
    BeforeEnteringSelection,
    /// Profits computed and entering variable chosen
    AfterEnteringSelection,
    /// Ratio test done, leaving variable known
    AfterRatioTest,
    /// Basis inverse updated and reordered
    AfterInverseUpdate,
    /// A simplex phase finished
    PhaseEnd,
    /// Bordered inverse and bbar built
    ClaSetup,
    /// Pending add/delete of the previous iteration about to be applied
    BeforeStructuralChange,
    /// λA and the leaving candidate determined
    AfterLeavingSelection,
    /// λB and the entering candidate determined
    AfterEnteringCandidate,
    /// Corner portfolio computed
    CornerComputed,
}

impl TracePoint {
    /// True for points raised by the bounded simplex.
    pub fn is_simplex(&self) -> bool {
        matches!(
            self,
            TracePoint::SimplexStep
                | TracePoint::BeforeEnteringSelection
                | TracePoint::AfterEnteringSelection
                | TracePoint::AfterRatioTest
                | TracePoint::AfterInverseUpdate
                | TracePoint::PhaseEnd
        )
    }
}

/// Receiver of diagnostic output.
pub trait TraceSink {
    fn line(&mut self, point: TracePoint, text: &str);

    fn vector(&mut self, point: TracePoint, name: &str, values: &[f64]) {
        let mut s = String::with_capacity(name.len() + values.len() * 12);
        s.push_str(name);
        for v in values {
            let _ = write!(s, " {} ", v);
        }
        self.line(point, &s);
    }

    fn matrix(&mut self, point: TracePoint, name: &str, m: &DMatrix<f64>) {
        self.line(point, name);
        for r in 0..m.nrows() {
            let mut s = String::from("[ ");
            for c in 0..m.ncols() {
                let _ = write!(s, "{}     ", m[(r, c)]);
            }
            s.push_str(" ]");
            self.line(point, &s);
        }
    }
}

/// Writes every record to stderr, prefixed with its trace point.
#[derive(Debug, Default)]
pub struct StderrTrace;

impl TraceSink for StderrTrace {
    fn line(&mut self, point: TracePoint, text: &str) {
        eprintln!("[{:?}] {}", point, text);
    }
}

/// Handle threaded through the algorithm; wraps an optional sink.
pub struct Trace<'a> {
    sink: Option<&'a mut dyn TraceSink>,
}

impl<'a> Trace<'a> {
    pub fn new(sink: Option<&'a mut dyn TraceSink>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Emit a line; `text` is only evaluated when a sink is installed.
    #[inline]
    pub fn line(&mut self, point: TracePoint, text: impl FnOnce() -> String) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.line(point, &text());
        }
    }

    #[inline]
    pub fn vector(&mut self, point: TracePoint, name: &str, values: &[f64]) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.vector(point, name, values);
        }
    }

    #[inline]
    pub fn matrix(&mut self, point: TracePoint, name: &str, m: &DMatrix<f64>) {
        if let Some(sink) = self.sink.as_deref_mut() {
            sink.matrix(point, name, m);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<(TracePoint, String)>);

    impl TraceSink for Collect {
        fn line(&mut self, point: TracePoint, text: &str) {
            self.0.push((point, text.to_string()));
        }
    }

    #[test]
    fn test_dumps_are_formatted_into_lines() {
        let mut sink = Collect::default();
        {
            let mut trace = Trace::new(Some(&mut sink));
            trace.vector(TracePoint::SimplexStep, "x       ", &[1.0, 2.5]);
            trace.matrix(TracePoint::ClaSetup, "Mi", &DMatrix::from_row_slice(1, 2, &[1.0, 0.0]));
        }
        assert_eq!(sink.0[0].1, "x        1  2.5 ");
        assert_eq!(sink.0[1].1, "Mi");
        assert_eq!(sink.0[2].1, "[ 1     0      ]");
        assert!(sink.0[0].0.is_simplex());
        assert!(!sink.0[1].0.is_simplex());
    }

    #[test]
    fn test_disabled_trace_skips_formatting() {
        let mut trace = Trace::disabled();
        trace.line(TracePoint::PhaseEnd, || unreachable!("not evaluated"));
        assert!(!trace.enabled());
    }
}
