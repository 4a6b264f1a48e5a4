//! Change notification
//!
//! Observers subscribe to an address and receive a [`ChangeEvent`] on a
//! crossbeam channel each time a committed mutation touches it. With
//! `descendants`, a collection subscriber also hears about every row listed
//! in that collection (e.g. the root file collection hears `file/{id}`).

use crate::address::ResourceAddress;
use crossbeam::channel::{self, Receiver, Sender};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

/// A committed change at `address`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub address: ResourceAddress,
}

struct Subscriber {
    watch: ResourceAddress,
    descendants: bool,
    sender: Sender<ChangeEvent>,
}

impl Subscriber {
    fn wants(&self, changed: &ResourceAddress) -> bool {
        if self.watch.authority != changed.authority {
            return false;
        }
        if self.watch.resource == changed.resource {
            return true;
        }
        self.descendants && self.watch.resource.covers(&changed.resource)
    }
}

/// Fan-out of change signals. Cloning shares the subscriber list.
#[derive(Clone, Default)]
pub struct ChangeBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, watch: ResourceAddress, descendants: bool) -> Receiver<ChangeEvent> {
        let (sender, receiver) = channel::unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber {
                watch,
                descendants,
                sender,
            });
        receiver
    }

    /// Deliver a change to every interested subscriber. Subscribers whose
    /// receiver is gone are dropped.
    pub fn notify(&self, address: &ResourceAddress) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        trace!("Change at {}", address);
        subscribers.retain(|subscriber| {
            if !subscriber.wants(address) {
                return true;
            }
            let event = ChangeEvent {
                address: address.clone(),
            };
            match subscriber.sender.send(event) {
                Ok(()) => true,
                Err(_) => {
                    warn!("Dropping disconnected observer of {}", subscriber.watch);
                    false
                }
            }
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Resource, Router};

    #[test]
    fn test_exact_and_descendant_matching() {
        let router = Router::new("org.syncstore");
        let bus = ChangeBus::new();
        let exact = bus.subscribe(router.address(Resource::Root), false);
        let tree = bus.subscribe(router.address(Resource::Root), true);
        let uploads = bus.subscribe(router.address(Resource::Uploads(None)), true);

        bus.notify(&router.address(Resource::File(Some(4))));

        assert!(exact.try_recv().is_err());
        assert_eq!(
            tree.try_recv().unwrap().address,
            router.address(Resource::File(Some(4)))
        );
        assert!(uploads.try_recv().is_err());
    }

    #[test]
    fn test_disconnected_subscribers_dropped() {
        let router = Router::new("org.syncstore");
        let bus = ChangeBus::new();
        let rx = bus.subscribe(router.address(Resource::Shares(None)), true);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 1);

        bus.notify(&router.address(Resource::Shares(Some(1))));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_other_authority_ignored() {
        let bus = ChangeBus::new();
        let rx = bus.subscribe(Router::new("a").address(Resource::Root), true);
        bus.notify(&Router::new("b").address(Resource::File(Some(1))));
        assert!(rx.try_recv().is_err());
    }
}
