use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::limits::NOTIFY_CHANNEL_CAPACITY;
use crate::model::{Event, SpaceId};

/// Broadcast hub of committed events per space.
#[derive(Default)]
pub struct NotifyHub {
    channels: DashMap<SpaceId, broadcast::Sender<Event>>,
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a space's events. Creates the channel if needed.
    pub fn subscribe(&self, space_id: SpaceId) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(space_id)
            .or_insert_with(|| broadcast::channel(NOTIFY_CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, space_id: SpaceId, event: &Event) {
        if let Some(sender) = self.channels.get(&space_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop channels whose subscribers have all gone away.
    pub fn prune(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::model::ReservationId;

    fn cancelled(space_id: SpaceId) -> Event {
        Event::ReservationCancelled {
            id: ReservationId::new(),
            space_id,
            at: NaiveDate::from_ymd_opt(2030, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[tokio::test]
    async fn subscribe_and_receive() {
        let hub = NotifyHub::new();
        let space = SpaceId::new();
        let mut rx = hub.subscribe(space);

        let event = cancelled(space);
        hub.send(space, &event);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn send_without_subscribers_is_noop() {
        let hub = NotifyHub::new();
        let space = SpaceId::new();
        // nobody listening
        hub.send(space, &cancelled(space));
    }

    #[tokio::test]
    async fn other_spaces_are_not_delivered() {
        let hub = NotifyHub::new();
        let mine = SpaceId::new();
        let mut rx = hub.subscribe(mine);
        hub.send(SpaceId::new(), &cancelled(mine));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn prune_drops_abandoned_channels() {
        let hub = NotifyHub::new();
        let space = SpaceId::new();
        drop(hub.subscribe(space));
        let _kept = hub.subscribe(SpaceId::new());
        hub.prune();
        assert_eq!(hub.channels.len(), 1);
    }
}
