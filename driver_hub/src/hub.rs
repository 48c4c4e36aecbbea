use crate::{
    driver::{ConnectionId, Driver, Metadata, PositionUpdate},
    event::{ClientEvent, ServerEvent},
    state::State,
    transport::Transport,
};

/// Presence and position broadcast hub.
///
/// Handlers run to completion without suspending and never fail toward the
/// caller. Serializing calls is up to the owner (see [`crate::service`]).
#[derive(Debug)]
pub struct Hub<T> {
    state: State,
    transport: T,
}

impl<T: Transport> Hub<T> {
    pub fn new(transport: T) -> Self {
        Hub {
            state: State::new(),
            transport,
        }
    }

    pub fn on_connect(&mut self, id: &ConnectionId) {
        log::debug!("{}: connected", id);
    }

    pub fn on_join(&mut self, id: &ConnectionId, metadata: Metadata) {
        if self.state.join(id.clone(), metadata).is_some() {
            log::debug!("{}: re-joined, previous record replaced", id);
        }
        log::info!("{} joined ({} drivers)", id, self.state.len());
        let snapshot = self.state.snapshot();
        self.transport.send_to(id, ServerEvent::AllDrivers(snapshot));
    }

    pub fn on_update_position(&mut self, id: &ConnectionId, update: PositionUpdate) {
        let Some(driver) = self.state.update_position(id, &update) else {
            log::debug!("{}: position update before join, ignoring", id);
            return;
        };
        let event = ServerEvent::DriverMoved(driver.clone());
        self.transport.broadcast_except(id, event);
    }

    pub fn on_disconnect(&mut self, id: &ConnectionId) {
        match self.state.remove(id) {
            Some(_) => log::info!("{} left ({} drivers)", id, self.state.len()),
            None => log::debug!("{}: disconnected without joining", id),
        }
        self.transport.broadcast(ServerEvent::DriverLeft(id.clone()));
    }

    pub fn handle(&mut self, id: &ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::Join(metadata) => self.on_join(id, metadata),
            ClientEvent::UpdatePosition(update) => self.on_update_position(id, update),
        }
    }

    pub fn drivers(&self) -> Vec<Driver> {
        self.state.snapshot()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::transport::Fanout;

    /// Records one entry per recipient, expanding broadcasts over whoever is
    /// connected at the time.
    #[derive(Default)]
    struct RecordingTransport {
        connected: BTreeSet<ConnectionId>,
        delivered: Vec<(ConnectionId, ServerEvent)>,
    }

    impl RecordingTransport {
        fn take(&mut self, to: &str) -> Vec<ServerEvent> {
            let to = ConnectionId::from(to);
            let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.delivered)
                .into_iter()
                .partition(|(id, _)| *id == to);
            self.delivered = rest;
            mine.into_iter().map(|(_, event)| event).collect()
        }

        fn fan_out(&mut self, except: Option<&ConnectionId>, event: ServerEvent) -> Fanout {
            let mut fanout = Fanout::default();
            for id in &self.connected {
                if Some(id) != except {
                    self.delivered.push((id.clone(), event.clone()));
                    fanout.sent += 1;
                }
            }
            fanout
        }
    }

    impl Transport for RecordingTransport {
        fn send_to(&mut self, to: &ConnectionId, event: ServerEvent) -> Fanout {
            self.delivered.push((to.clone(), event));
            Fanout { sent: 1, dropped: 0 }
        }

        fn broadcast_except(&mut self, except: &ConnectionId, event: ServerEvent) -> Fanout {
            self.fan_out(Some(except), event)
        }

        fn broadcast(&mut self, event: ServerEvent) -> Fanout {
            self.fan_out(None, event)
        }
    }

    fn hub() -> Hub<RecordingTransport> {
        Hub::new(RecordingTransport::default())
    }

    fn connect(hub: &mut Hub<RecordingTransport>, id: &str) -> ConnectionId {
        let id = ConnectionId::from(id);
        hub.transport_mut().connected.insert(id.clone());
        hub.on_connect(&id);
        id
    }

    fn disconnect(hub: &mut Hub<RecordingTransport>, id: &ConnectionId) {
        hub.transport_mut().connected.remove(id);
        hub.on_disconnect(id);
    }

    fn meta(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    fn position(lat: f64, lon: f64, speed: f64) -> PositionUpdate {
        PositionUpdate { lat, lon, speed }
    }

    fn sorted(mut drivers: Vec<Driver>) -> Vec<Driver> {
        drivers.sort_by(|a, b| a.id.cmp(&b.id));
        drivers
    }

    #[test]
    fn connect_alone_creates_no_driver() {
        let mut hub = hub();
        connect(&mut hub, "A");
        assert!(hub.state().is_empty());
        assert!(hub.transport_mut().take("A").is_empty());
    }

    #[test]
    fn join_twice_keeps_one_record_with_latest_metadata() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        hub.on_join(&a, meta(json!({ "name": "Alice" })));
        hub.on_join(&a, meta(json!({ "name": "Alicia" })));

        assert_eq!(hub.state().len(), 1);
        assert_eq!(hub.state().get(&a).unwrap().metadata["name"], json!("Alicia"));
    }

    #[test]
    fn join_does_not_notify_peers() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        hub.on_join(&a, Metadata::new());
        let b = connect(&mut hub, "B");
        hub.on_join(&b, Metadata::new());

        assert_eq!(hub.transport_mut().take("A").len(), 1);
    }

    #[test]
    fn update_before_join_is_a_silent_no_op() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        let b = connect(&mut hub, "B");
        hub.on_join(&b, Metadata::new());
        hub.transport_mut().take("B");

        hub.on_update_position(&a, position(1.0, 2.0, 3.0));
        assert_eq!(hub.state().len(), 1);
        assert!(!hub.state().contains(&a));
        assert!(hub.transport().delivered.is_empty());
    }

    #[test]
    fn update_reaches_every_other_connection_once() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        let b = connect(&mut hub, "B");
        let c = connect(&mut hub, "C");
        hub.on_join(&a, meta(json!({ "name": "Alice" })));
        hub.on_join(&b, Metadata::new());
        hub.transport_mut().delivered.clear();

        hub.on_update_position(&a, position(10.0, 20.0, 5.0));

        let mut expected = Driver::new(a.clone(), meta(json!({ "name": "Alice" })));
        expected.apply(&position(10.0, 20.0, 5.0));
        let moved = ServerEvent::DriverMoved(expected);
        assert_eq!(hub.transport_mut().take("B"), vec![moved.clone()]);
        // C never joined but is connected, so it sees movement too.
        assert_eq!(hub.transport_mut().take(c.as_str()), vec![moved]);
        assert!(hub.transport_mut().take("A").is_empty());
    }

    #[test]
    fn disconnect_removes_and_announces_to_all_remaining() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        let b = connect(&mut hub, "B");
        let c = connect(&mut hub, "C");
        hub.on_join(&a, Metadata::new());
        hub.on_join(&b, Metadata::new());
        hub.transport_mut().delivered.clear();

        disconnect(&mut hub, &a);

        assert!(!hub.state().contains(&a));
        let left = ServerEvent::DriverLeft(a.clone());
        assert_eq!(hub.transport_mut().take("B"), vec![left.clone()]);
        assert_eq!(hub.transport_mut().take(c.as_str()), vec![left]);
        assert!(hub.transport_mut().take("A").is_empty());
    }

    #[test]
    fn disconnect_without_join_leaves_registry_intact() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        let b = connect(&mut hub, "B");
        hub.on_join(&b, Metadata::new());

        disconnect(&mut hub, &a);
        assert_eq!(hub.state().len(), 1);
        assert!(hub.state().contains(&b));
    }

    #[test]
    fn joiner_receives_snapshot_of_current_positions() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        let b = connect(&mut hub, "B");
        hub.on_join(&a, Metadata::new());
        hub.on_join(&b, Metadata::new());
        hub.on_update_position(&a, position(1.0, 1.0, 0.0));
        hub.on_update_position(&b, position(2.0, 2.0, 0.0));
        let d = connect(&mut hub, "D");
        hub.transport_mut().delivered.clear();

        hub.on_join(&d, Metadata::new());

        let events = hub.transport_mut().take("D");
        assert_eq!(events.len(), 1);
        let ServerEvent::AllDrivers(drivers) = events[0].clone() else {
            panic!("expected allDrivers, got {:?}", events[0]);
        };
        let drivers = sorted(drivers);
        let ids: Vec<_> = drivers.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["A", "B", "D"]);
        assert_eq!((drivers[0].lat, drivers[0].lon), (1.0, 1.0));
        assert_eq!((drivers[1].lat, drivers[1].lon), (2.0, 2.0));
        assert_eq!((drivers[2].lat, drivers[2].lon), (0.0, 0.0));
    }

    #[test]
    fn convoy_scenario() {
        let mut hub = hub();
        let a = connect(&mut hub, "A");
        hub.handle(&a, ClientEvent::Join(meta(json!({ "name": "Alice" }))));
        assert_eq!(
            serde_json::to_value(hub.drivers()).unwrap(),
            json!([{ "id": "A", "lat": 0.0, "lon": 0.0, "name": "Alice" }])
        );

        let b = connect(&mut hub, "B");
        hub.handle(&b, ClientEvent::Join(Metadata::new()));
        let ServerEvent::AllDrivers(snapshot) = hub.transport_mut().take("B").remove(0) else {
            panic!("expected allDrivers");
        };
        let ids: Vec<_> = sorted(snapshot).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![a.clone(), b.clone()]);

        hub.transport_mut().delivered.clear();
        hub.handle(&a, ClientEvent::UpdatePosition(position(-3.73, -38.52, 42.0)));
        let moved = hub.transport_mut().take("B");
        assert_eq!(moved.len(), 1);
        assert_eq!(
            serde_json::to_value(&moved[0]).unwrap(),
            json!({
                "event": "driverMoved",
                "data": { "id": "A", "lat": -3.73, "lon": -38.52, "speed": 42.0, "name": "Alice" }
            })
        );
        assert!(hub.transport_mut().take("A").is_empty());

        disconnect(&mut hub, &a);
        assert_eq!(hub.transport_mut().take("B"), vec![ServerEvent::DriverLeft(a)]);
        let remaining: Vec<_> = hub.drivers().into_iter().map(|d| d.id).collect();
        assert_eq!(remaining, vec![b]);
    }
}
