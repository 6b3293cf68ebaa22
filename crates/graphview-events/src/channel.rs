use crossbeam_channel::{Receiver, Sender, unbounded};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Handler<T> = Box<dyn FnMut(&T)>;

/// A named event channel with an ordered subscriber list.
///
/// `raise` calls every handler synchronously, in subscription order, before
/// returning. Streams created with [`EventChannel::stream`] receive a clone of
/// each event after the handlers ran, so a host loop can drain them later.
pub struct EventChannel<T> {
    name: &'static str,
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<T>)>,
    streams: Vec<Sender<T>>,
}

impl<T: Clone + 'static> EventChannel<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: 0,
            handlers: Vec::new(),
            streams: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns false when `id` was not subscribed (or already removed).
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        before != self.handlers.len()
    }

    /// Mirror every future event into a receiver.
    pub fn stream(&mut self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        self.streams.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len() + self.streams.len()
    }

    pub fn raise(&mut self, event: &T) {
        tracing::trace!(
            channel = self.name,
            handlers = self.handlers.len(),
            "raising event"
        );
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
        // Dropped receivers disconnect their sender; forget those streams.
        self.streams.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .field("streams", &self.streams.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_dispatch_in_subscription_order() {
        let mut channel = EventChannel::<i32>::new("numbers");
        let log = Rc::new(RefCell::new(Vec::new()));

        let first = log.clone();
        channel.subscribe(move |v| first.borrow_mut().push(("first", *v)));
        let second = log.clone();
        channel.subscribe(move |v| second.borrow_mut().push(("second", *v)));

        channel.raise(&1);
        channel.raise(&2);

        assert_eq!(
            *log.borrow(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut channel = EventChannel::<i32>::new("numbers");
        let seen = Rc::new(RefCell::new(0));
        let counter = seen.clone();
        let id = channel.subscribe(move |_| *counter.borrow_mut() += 1);

        channel.raise(&1);
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.raise(&2);

        assert_eq!(*seen.borrow(), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn test_stream_receives_clones() {
        let mut channel = EventChannel::<String>::new("text");
        let rx = channel.stream();

        channel.raise(&"a".to_string());
        channel.raise(&"b".to_string());

        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(rx.try_recv().unwrap(), "b");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_stream_is_forgotten() {
        let mut channel = EventChannel::<u8>::new("bytes");
        let rx = channel.stream();
        assert_eq!(channel.subscriber_count(), 1);
        drop(rx);

        channel.raise(&0);
        assert_eq!(channel.subscriber_count(), 0);
    }
}
