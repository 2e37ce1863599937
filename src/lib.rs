//! # eventwire
//!
//! Immutable notification events, a synchronous observer bus, and a
//! WebSocket client with an explicit connection state machine.
//!
//! The pieces compose through `relay`: socket activity becomes `Event`s
//! published on an `EventBus`, and observers react to them (the CLI's toast
//! logger is one such observer).

pub mod bus;
pub mod config;
pub mod event;
pub mod reconnect;
pub mod relay;
pub mod socket;

pub use bus::{EventBus, SubscriptionId};
pub use config::{ClientConfig, ConfigError};
pub use event::{ConnectionEvent, Event, EventKind, Named, NotifyEvent, Target};
pub use socket::{CloseInfo, ConnectionState, Payload, SocketError, WebSocketClient};
