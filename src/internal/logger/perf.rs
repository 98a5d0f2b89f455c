// src/internal/logger/perf.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::handle::Logger;

type Clock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Times arbitrary events by name and logs how long they took.
///
/// ```ignore
/// let perf = ctx.perflog()?;
/// perf.start("provision");
/// // ...
/// let taken = perf.stop("provision");
/// ```
///
/// Starting an event that is already tracked resets its start time.
pub struct PerfLog {
    logger: Logger,
    events: Mutex<HashMap<String, Instant>>,
    clock: Clock,
}

impl PerfLog {
    pub fn new(logger: Logger) -> Self {
        Self::with_clock(logger, Arc::new(Instant::now))
    }

    pub fn with_clock(logger: Logger, clock: Clock) -> Self {
        Self {
            logger,
            events: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    #[track_caller]
    pub fn start(&self, event_name: &str) {
        let now = (self.clock)();
        let previous = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_name.to_string(), now);

        if previous.is_some() {
            self.logger.warning(format!(
                "\"{}\" event already started, resetting start time",
                event_name
            ));
        } else {
            self.logger
                .debug(format!("\"{}\" event tracking started", event_name));
        }
    }

    /// Time since the last `start`, or `None` if the event was never started.
    #[track_caller]
    pub fn stop(&self, event_name: &str) -> Option<Duration> {
        let started = self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(event_name);

        match started {
            Some(start) => {
                let taken = (self.clock)().saturating_duration_since(start);
                self.logger.info(format!(
                    "\"{}\" event took {:.6} seconds",
                    event_name,
                    taken.as_secs_f64()
                ));
                Some(taken)
            }
            None => {
                self.logger.error(format!(
                    "\"{}\" not being tracked, call .start first",
                    event_name
                ));
                None
            }
        }
    }

    pub fn is_tracking(&self, event_name: &str) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(event_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::logger::format::Formatter;
    use crate::internal::logger::handle::Pipeline;
    use crate::internal::logger::level::Level;
    use crate::internal::logger::mock::SharedBuffer;
    use crate::internal::logger::sinks::ConsoleSink;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }
    }

    fn perf_with_clock() -> (PerfLog, Arc<ManualClock>, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let sink = ConsoleSink::new(
            Arc::new(BoxMakeWriter::new(buffer.clone())),
            Formatter::new("[%(levelname)s] %(message)s"),
        )
        .with_threshold(Level::Trace);
        let logger = Logger::new("perf", Pipeline::new(Level::Trace).with_sink(sink));

        let clock = Arc::new(ManualClock {
            now: Mutex::new(Instant::now()),
        });
        let source = clock.clone();
        let perf = PerfLog::with_clock(logger, Arc::new(move || *source.now.lock().unwrap()));
        (perf, clock, buffer)
    }

    #[test]
    fn test_start_stop_reports_elapsed() {
        let (perf, clock, buffer) = perf_with_clock();

        perf.start("provision");
        clock.advance(Duration::from_millis(1500));
        let taken = perf.stop("provision");

        assert_eq!(taken, Some(Duration::from_millis(1500)));
        assert!(!perf.is_tracking("provision"));
        assert_eq!(
            buffer.lines(),
            vec![
                "[DEBUG] \"provision\" event tracking started".to_string(),
                "[INFO] \"provision\" event took 1.500000 seconds".to_string(),
            ]
        );
    }

    #[test]
    fn test_restart_resets_start_time() {
        let (perf, clock, buffer) = perf_with_clock();

        perf.start("e");
        clock.advance(Duration::from_secs(10));
        perf.start("e");
        clock.advance(Duration::from_secs(2));

        assert_eq!(perf.stop("e"), Some(Duration::from_secs(2)));
        assert_eq!(
            buffer.lines()[1],
            "[WARNING] \"e\" event already started, resetting start time"
        );
    }

    #[test]
    fn test_stop_without_start() {
        let (perf, _clock, buffer) = perf_with_clock();

        assert_eq!(perf.stop("never-started"), None);
        assert_eq!(
            buffer.lines(),
            vec!["[ERROR] \"never-started\" not being tracked, call .start first".to_string()]
        );
    }
}
