use std::{
    os::fd::RawFd,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use super::*;
use crate::input::{
    event::{ButtonCode, Event},
    multiplexer::MultiplexerConfig,
    Consumer, Producer,
};

type Log = Arc<Mutex<Vec<String>>>;

struct FakeProducer {
    name: &'static str,
    events: Vec<Event>,
    log: Log,
}

impl Producer for FakeProducer {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        self.log.lock().unwrap().push(format!("open {}", self.name));
        Ok(vec![])
    }

    fn produce(&mut self, _ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        Ok(std::mem::take(&mut self.events))
    }

    fn close(&mut self, exit: bool) -> bool {
        self.log
            .lock()
            .unwrap()
            .push(format!("close {} {exit}", self.name));
        true
    }
}

/// Records batches and stops the loop once it has seen any event
struct FakeConsumer {
    flags: LoopFlags,
    seen: Arc<Mutex<Vec<Event>>>,
}

impl Consumer for FakeConsumer {
    fn consume(&mut self, events: &[Event]) -> Result<(), DeviceError> {
        self.seen.lock().unwrap().extend_from_slice(events);
        if !events.is_empty() {
            self.flags.exit();
        }
        Ok(())
    }
}

struct Failing;

impl Producer for Failing {
    fn open(&mut self) -> Result<Vec<RawFd>, DeviceError> {
        Err(DeviceError::NotReady("missing".into()))
    }

    fn produce(&mut self, _ready: &[RawFd]) -> Result<Vec<Event>, DeviceError> {
        Ok(vec![])
    }

    fn close(&mut self, _exit: bool) -> bool {
        panic!("never opened");
    }
}

fn producer(name: &'static str, events: Vec<Event>, log: &Log) -> Component {
    Component::Producer(Box::new(FakeProducer {
        name,
        events,
        log: log.clone(),
    }))
}

#[test]
fn events_flow_in_producer_order() {
    let log: Log = Default::default();
    let seen = Arc::new(Mutex::new(vec![]));
    let flags = LoopFlags::new();

    let mut graph = DeviceGraph::new(Multiplexer::new(MultiplexerConfig::default(), None))
        .with(producer("a", vec![Event::button(ButtonCode::A, true)], &log))
        .with(producer("b", vec![Event::button(ButtonCode::B, true)], &log))
        .with(Component::Consumer(Box::new(FakeConsumer {
            flags: flags.clone(),
            seen: seen.clone(),
        })));

    graph.run(&flags).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            Event::button(ButtonCode::A, true),
            Event::button(ButtonCode::B, true)
        ]
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec!["open a", "open b", "close b true", "close a true"]
    );
}

#[test]
fn update_closes_without_exit() {
    let log: Log = Default::default();
    let flags = LoopFlags::new();
    flags.update();

    let mut graph = DeviceGraph::new(Multiplexer::new(MultiplexerConfig::default(), None))
        .with(producer("a", vec![], &log));
    graph.run(&flags).unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["open a", "close a false"]);
}

#[test]
fn failed_open_closes_opened_components() {
    let log: Log = Default::default();
    let flags = LoopFlags::new();

    let mut graph = DeviceGraph::new(Multiplexer::new(MultiplexerConfig::default(), None))
        .with(producer("a", vec![], &log))
        .with(Component::Producer(Box::new(Failing)))
        .with(producer("c", vec![], &log));

    let err = graph.run(&flags).unwrap_err();
    assert!(err.is_not_ready());
    assert_eq!(*log.lock().unwrap(), vec!["open a", "close a true"]);
}

#[test]
fn rates_are_capped() {
    let graph = DeviceGraph::new(Multiplexer::new(MultiplexerConfig::default(), None))
        .with_rates(25, 5000);
    assert_eq!(graph.min_delay(), Duration::from_millis(1));
    assert_eq!(graph.max_delay(), Duration::from_millis(40));

    let graph = DeviceGraph::new(Multiplexer::new(MultiplexerConfig::default(), None))
        .with_rates(500, 400);
    assert_eq!(graph.max_delay(), graph.min_delay());
}

#[test]
fn backoff_grows_on_fast_repeated_failures() {
    let mut backoff = Backoff::new();
    let now = Instant::now();
    backoff.started = now;

    // First fast failure still waits the short delay
    assert_eq!(backoff.failure(now + Duration::from_millis(100)), ERROR_DELAY);
    assert_eq!(
        backoff.failure(now + Duration::from_millis(200)),
        LONGER_ERROR_DELAY
    );

    // A loop that ran for a while resets the escalation
    backoff.started = now;
    assert_eq!(backoff.failure(now + Duration::from_secs(10)), ERROR_DELAY);
    backoff.started = now;
    assert_eq!(backoff.failure(now + Duration::from_millis(10)), ERROR_DELAY);
}

struct Missing {
    attempts: AtomicUsize,
    flags: LoopFlags,
}

impl Handheld for Missing {
    fn name(&self) -> &'static str {
        "Missing"
    }

    fn build(&self, _config: &Config, _emitter: &Emitter) -> Result<DeviceGraph, DeviceError> {
        if self.attempts.fetch_add(1, Ordering::Relaxed) >= 2 {
            self.flags.exit();
        }
        Err(DeviceError::NotReady("no controllers".into()))
    }
}

#[test]
fn loop_retries_missing_devices() {
    let flags = LoopFlags::new();
    let handheld = Missing {
        attempts: AtomicUsize::new(0),
        flags: flags.clone(),
    };
    let state = State::new(Config::default());

    run_loop(&handheld, &state, &Emitter::default(), &flags);
    assert_eq!(handheld.attempts.load(Ordering::Relaxed), 3);
}
