use bourse_broker::ExchangeListener;
use bourse_core::{OrderUpdate, Position};
use parking_lot::Mutex;

/// Event captured by [`RecordingListener`].
#[derive(Clone, Debug, PartialEq)]
pub enum RecordedEvent {
    Order(OrderUpdate),
    Position(Position),
}

/// Listener that keeps every event in arrival order.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingListener {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event received so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    #[must_use]
    pub fn order_updates(&self) -> Vec<OrderUpdate> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Order(update) => Some(update.clone()),
                RecordedEvent::Position(_) => None,
            })
            .collect()
    }

    #[must_use]
    pub fn position_updates(&self) -> Vec<Position> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                RecordedEvent::Position(position) => Some(position.clone()),
                RecordedEvent::Order(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ExchangeListener for RecordingListener {
    fn on_order_update(&self, update: &OrderUpdate) {
        self.events.lock().push(RecordedEvent::Order(update.clone()));
    }

    fn on_position_update(&self, position: &Position) {
        self.events
            .lock()
            .push(RecordedEvent::Position(position.clone()));
    }
}
