use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::{convert::Infallible, time::Duration};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::events::RoomEvent;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Converts a room subscription into a server-sent-events response. Each
/// event is sent with its type as the SSE event name and its JSON as data.
/// The stream ends after `room_closed` or when the channel closes.
pub fn to_sse_stream(
    pin: String,
    mut receiver: broadcast::Receiver<RoomEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(room_event) => {
                            let terminal = room_event.is_terminal();
                            let event = match Event::default()
                                .event(room_event.event_type())
                                .json_data(&room_event)
                            {
                                Ok(event) => event,
                                Err(e) => {
                                    warn!(pin = %pin, error = %e, "Failed to encode room event");
                                    continue;
                                }
                            };

                            if tx.send(Ok(event)).await.is_err() || terminal {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Clients re-fetch on any event, so lost ones are harmless
                            debug!(pin = %pin, skipped, "Event stream lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(pin = %pin, "Room event stream disconnected");
    });

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
