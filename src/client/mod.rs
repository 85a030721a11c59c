//! Client side of a room: transports, the pure reconciler and the task that
//! keeps a player's snapshot of the room in step with the server.

mod api;
mod context;
mod feed;
mod http;
mod reconcile;
mod subscription;

pub use api::{ClientError, GameApi, InProcessGameApi};
pub use context::SessionContext;
pub use feed::{bus_feed, connect_event_feed, ChangeStream};
pub use http::HttpGameApi;
pub use reconcile::{Directive, Reconciler};
pub use subscription::{
    ClientSnapshot, Command, EndReason, RoomSubscription, Screen, SubscriptionHandle,
};
