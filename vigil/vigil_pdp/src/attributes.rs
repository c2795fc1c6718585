//! In-memory attribute broker.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::debug;
use vigil_core::{just, AttributeResolver, EvaluationError, Val, ValStream};

/// Attribute source holding one current value per attribute name.
///
/// Every subscriber of an attribute receives its current value and then
/// each published change. Attributes are looked up by name only; the entity
/// an attribute is requested for does not select a different value.
#[derive(Debug, Default)]
pub struct AttributeBroker {
    attributes: DashMap<String, watch::Sender<Val>>,
}

impl AttributeBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value of `name`, notifying its subscribers.
    pub fn publish(&self, name: impl Into<String>, value: impl Into<Val>) {
        let name = name.into();
        let value = value.into();
        debug!("attribute '{}' is now {}", name, value);
        match self.attributes.entry(name) {
            Entry::Occupied(entry) => {
                entry.get().send_replace(value);
            }
            Entry::Vacant(entry) => {
                entry.insert(watch::channel(value).0);
            }
        }
    }

    /// Forget an attribute. Open subscriptions keep its last value.
    pub fn remove(&self, name: &str) -> bool {
        self.attributes.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Number of open subscriptions of `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.attributes
            .get(name)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl AttributeResolver for AttributeBroker {
    fn attribute(&self, name: &str, _entity: &Val) -> ValStream {
        match self.attributes.get(name) {
            Some(sender) => WatchStream::new(sender.subscribe()).boxed(),
            None => just(EvaluationError::UnknownAttribute(name.to_string()).into()),
        }
    }
}
