//! Relay: turn socket activity into bus events.
//!
//! Inbound text becomes a visible `NotifyEvent`; inbound binary becomes a
//! silent one. Open, close and error become `ConnectionEvent`s. Every event
//! carries the same `target`, usually the connection's id.

use crate::bus::EventBus;
use crate::event::{ConnectionEvent, Event, NotifyEvent, Target};
use crate::socket::{ConnectionState, Payload, WebSocketClient};

/// Register socket observers on `client` that publish to `bus`.
pub fn attach(client: &WebSocketClient, bus: &EventBus, target: impl Into<Target>) {
    let target = target.into();

    let (b, t) = (bus.clone(), target.clone());
    client.on_message(move |payload| {
        b.publish(&Event::from(notification(t.clone(), payload)));
    });

    let (b, t) = (bus.clone(), target.clone());
    client.on_open(move || {
        b.publish(&Event::from(ConnectionEvent::new(t.clone(), ConnectionState::Connected, None)));
    });

    let (b, t) = (bus.clone(), target.clone());
    client.on_close(move |info| {
        let detail = match info.code {
            Some(code) if info.reason.is_empty() => Some(code.to_string()),
            Some(code) => Some(format!("{code} {}", info.reason)),
            None => None,
        };
        b.publish(&Event::from(ConnectionEvent::new(t.clone(), ConnectionState::Closed, detail)));
    });

    let (b, t, states) = (bus.clone(), target, client.watch_state());
    client.on_error(move |err| {
        let state = *states.borrow();
        b.publish(&Event::from(ConnectionEvent::new(t.clone(), state, Some(err.to_string()))));
    });
}

fn notification(target: Target, payload: &Payload) -> NotifyEvent {
    match payload {
        Payload::Text(text) => NotifyEvent::create(target, text.as_str()),
        Payload::Binary(_) => NotifyEvent::silent(target),
    }
}

#[cfg(test)]
#[path = "relay_test.rs"]
mod tests;
