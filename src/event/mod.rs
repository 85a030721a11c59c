// Room change notifications
//
// Mutations publish a RoomEvent on the bus after they commit. Subscribers
// (SSE connections, in-process clients) treat every event as a hint to
// re-fetch the room.

// Public API - what other modules can use
pub use bus::{EventBus, ROOM_CHANNEL_CAPACITY};
pub use events::RoomEvent;
pub use stream::to_sse_stream;

// Internal modules
mod bus;
mod events;
mod stream;
