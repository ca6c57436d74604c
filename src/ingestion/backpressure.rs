//! Backpressure Controller - pauses the parser while a batch is in flight
//!
//! The controller is the only caller of `suspend` / `resume`. It is consulted
//! after every emitted element; once the open batch reaches capacity the
//! parser is suspended until the flush has resolved. Elements are delayed,
//! never dropped or reordered, and at most one full batch of records is
//! ever buffered without being persisted.

use crate::ingestion::accumulator::BatchAccumulator;
use crate::ingestion::parser::Suspendable;
use tracing::debug;

/// What the pipeline must do after an element was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep pulling from the parser
    Continue,
    /// The parser is suspended; flush the open batch, then call `release`
    Flush,
}

#[derive(Debug, Default)]
pub struct BackpressureController {
    peak_buffered: usize,
    suspensions: u64,
}

impl BackpressureController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult after the parser's latest element has been appended
    pub fn admit<P: Suspendable>(&mut self, parser: &mut P, accumulator: &BatchAccumulator) -> Flow {
        self.peak_buffered = self.peak_buffered.max(accumulator.len());

        if accumulator.is_full() {
            parser.suspend();
            self.suspensions += 1;
            debug!(buffered = accumulator.len(), "Parser suspended for flush");
            Flow::Flush
        } else {
            Flow::Continue
        }
    }

    /// The in-flight flush has resolved; let the parser continue
    pub fn release<P: Suspendable>(&mut self, parser: &mut P) {
        if parser.is_suspended() {
            parser.resume();
            debug!("Parser resumed");
        }
    }

    /// Largest number of records held unpersisted at any point
    pub fn peak_buffered(&self) -> usize {
        self.peak_buffered
    }

    pub fn suspensions(&self) -> u64 {
        self.suspensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::mapper::RecordMapper;
    use serde_json::json;

    #[derive(Default)]
    struct FakeParser {
        suspended: bool,
        transitions: Vec<bool>,
    }

    impl Suspendable for FakeParser {
        fn suspend(&mut self) {
            self.suspended = true;
            self.transitions.push(true);
        }

        fn resume(&mut self) {
            self.suspended = false;
            self.transitions.push(false);
        }

        fn is_suspended(&self) -> bool {
            self.suspended
        }
    }

    #[test]
    fn test_suspends_at_capacity_and_resumes_after_flush() {
        let mapper = RecordMapper::vehicle();
        let mut parser = FakeParser::default();
        let mut acc = BatchAccumulator::new(2);
        let mut controller = BackpressureController::new();

        acc.append(mapper.map(&json!({})));
        assert_eq!(controller.admit(&mut parser, &acc), Flow::Continue);
        assert!(!parser.is_suspended());

        acc.append(mapper.map(&json!({})));
        assert_eq!(controller.admit(&mut parser, &acc), Flow::Flush);
        assert!(parser.is_suspended());

        acc.drain();
        controller.release(&mut parser);
        assert!(!parser.is_suspended());
        assert_eq!(parser.transitions, vec![true, false]);
        assert_eq!(controller.peak_buffered(), 2);
        assert_eq!(controller.suspensions(), 1);
    }

    #[test]
    fn test_flushes_when_accumulator_is_full() {
        let mapper = RecordMapper::vehicle();
        let mut parser = FakeParser::default();
        let mut acc = BatchAccumulator::new(3);
        let mut controller = BackpressureController::new();

        let flows: Vec<Flow> = (0..3)
            .map(|_| {
                acc.append(mapper.map(&json!({})));
                controller.admit(&mut parser, &acc)
            })
            .collect();

        assert_eq!(flows, vec![Flow::Continue, Flow::Continue, Flow::Flush]);
        assert!(acc.is_full());
    }

    #[test]
    fn test_release_without_flush_is_noop() {
        let mut parser = FakeParser::default();
        let mut controller = BackpressureController::new();
        controller.release(&mut parser);
        assert!(parser.transitions.is_empty());
    }
}
