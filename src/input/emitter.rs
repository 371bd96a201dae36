//! Mailbox between the front-end and the device loops. Loops send control
//! events out through it and pick up events injected by the front-end.
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::UnboundedSender;

use super::event::{ControlEvent, Event, SpecialKind};

/// Opens the quick access menu of a front-end. The argument requests the
/// expanded menu; returns false if the menu could not be shown.
pub type QamHandler = Arc<dyn Fn(bool) -> bool + Send + Sync>;

#[derive(Default)]
struct Mailbox {
    injected: Vec<Event>,
    simple_qam: bool,
    qam: Option<QamHandler>,
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("injected", &self.injected)
            .field("simple_qam", &self.simple_qam)
            .field("qam", &self.qam.is_some())
            .finish()
    }
}

/// Cloneable handle shared by the daemon and every device loop
#[derive(Debug, Clone, Default)]
pub struct Emitter {
    mailbox: Arc<Mutex<Mailbox>>,
    tx: Option<UnboundedSender<ControlEvent>>,
}

impl Emitter {
    pub fn new(tx: UnboundedSender<ControlEvent>) -> Self {
        Self {
            mailbox: Default::default(),
            tx: Some(tx),
        }
    }

    fn mailbox(&self) -> MutexGuard<'_, Mailbox> {
        match self.mailbox.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Send a control event to the daemon
    pub fn emit(&self, event: ControlEvent) {
        let Some(tx) = self.tx.as_ref() else {
            log::trace!("No receiver for control event: {event:?}");
            return;
        };
        if let Err(e) = tx.send(event) {
            log::warn!("Failed to send control event: {e}");
        }
    }

    pub fn special(&self, event: SpecialKind) {
        log::debug!("Emitting special event: {event}");
        self.emit(ControlEvent::Special { event });
    }

    /// Queue events to be merged into the next batch of every loop
    pub fn inject(&self, events: impl IntoIterator<Item = Event>) {
        self.mailbox().injected.extend(events);
    }

    /// Take the injected events
    pub fn inject_recv(&self) -> Vec<Event> {
        std::mem::take(&mut self.mailbox().injected)
    }

    /// When set, the QAM button is sent as a chord instead of multi-tap
    /// specials
    pub fn set_simple_qam(&self, value: bool) {
        self.mailbox().simple_qam = value;
    }

    pub fn simple_qam(&self) -> bool {
        self.mailbox().simple_qam
    }

    pub fn register_qam(&self, handler: Option<QamHandler>) {
        self.mailbox().qam = handler;
    }

    /// Ask the registered front-end to open its quick access menu. Returns
    /// false when nobody handled it.
    pub fn send_qam(&self, expanded: bool) -> bool {
        let handler = self.mailbox().qam.clone();
        handler.is_some_and(|handler| handler(expanded))
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::input::event::ButtonCode;

    #[test]
    fn injected_events_are_drained_once() {
        let emitter = Emitter::default();
        let clone = emitter.clone();
        clone.inject([Event::button(ButtonCode::A, true)]);
        assert_eq!(emitter.inject_recv(), vec![Event::button(ButtonCode::A, true)]);
        assert!(emitter.inject_recv().is_empty());
    }

    #[test]
    fn specials_are_sent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let emitter = Emitter::new(tx);
        emitter.special(SpecialKind::QamDouble);
        assert_eq!(
            rx.try_recv().unwrap(),
            ControlEvent::Special {
                event: SpecialKind::QamDouble
            }
        );
        Emitter::default().special(SpecialKind::Guide);
    }

    #[test]
    fn qam_handler_reports_result() {
        let emitter = Emitter::default();
        assert!(!emitter.send_qam(false));

        emitter.register_qam(Some(Arc::new(|expanded| !expanded)));
        assert!(emitter.clone().send_qam(false));
        assert!(!emitter.send_qam(true));

        emitter.register_qam(None);
        assert!(!emitter.send_qam(false));
    }
}
