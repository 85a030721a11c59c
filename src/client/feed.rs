use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::api::ClientError;
use super::context::SessionContext;
use crate::event::RoomEvent;

/// Push notifications that the room changed. Items carry no data; each one
/// only forces a re-fetch. The stream ends when the room closes or the
/// connection drops.
pub type ChangeStream = BoxStream<'static, ()>;

/// Change feed straight from the in-process event bus
pub fn bus_feed(receiver: broadcast::Receiver<RoomEvent>) -> ChangeStream {
    stream::unfold(Some(receiver), |state| async move {
        let mut receiver = state?;
        match receiver.recv().await {
            Ok(event) => {
                let next = (!event.is_terminal()).then_some(receiver);
                Some(((), next))
            }
            // Missed events still mean something changed
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Change feed lagged");
                Some(((), Some(receiver)))
            }
            Err(RecvError::Closed) => None,
        }
    })
    .boxed()
}

enum Block {
    Ignore,
    Change,
    Closed,
}

fn classify(block: &str) -> Block {
    let mut has_data = false;
    let mut closed = false;
    for line in block.lines() {
        if let Some(name) = line.strip_prefix("event:") {
            closed = name.trim() == "room_closed";
        } else if line.starts_with("data:") {
            has_data = true;
        }
    }

    match (has_data, closed) {
        (false, _) => Block::Ignore,
        (true, true) => Block::Closed,
        (true, false) => Block::Change,
    }
}

/// Splits the next complete event block off the front of the buffer.
/// Bytes are only decoded once a whole block has arrived, so a character
/// split across chunks survives.
fn next_block(buffer: &mut Vec<u8>) -> Option<String> {
    let lf = buffer
        .windows(2)
        .position(|pair| pair == b"\n\n")
        .map(|end| (end, end + 2));
    let crlf = buffer
        .windows(4)
        .position(|quad| quad == b"\r\n\r\n")
        .map(|end| (end, end + 4));
    let (_, len) = lf.into_iter().chain(crlf).min_by_key(|(end, _)| *end)?;
    let block: Vec<u8> = buffer.drain(..len).collect();
    Some(String::from_utf8_lossy(&block).replace("\r\n", "\n"))
}

/// Opens `GET /rooms/:pin/events` and turns the server-sent events into a
/// change stream. Keep-alive comments are skipped.
pub async fn connect_event_feed(
    context: &SessionContext,
    pin: &str,
) -> Result<ChangeStream, ClientError> {
    let response = context
        .get(&format!("/rooms/{}/events", pin))
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .map_err(|e| ClientError::Transport(e.to_string()))?;
    let response = ClientError::check(response).await?;

    let body = response.bytes_stream().boxed();
    let feed = stream::unfold(
        (body, Vec::new(), false),
        |(mut body, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                if let Some(block) = next_block(&mut buffer) {
                    match classify(&block) {
                        Block::Ignore => continue,
                        Block::Change => return Some(((), (body, buffer, false))),
                        Block::Closed => return Some(((), (body, buffer, true))),
                    }
                }

                match body.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!(error = %e, "Event stream interrupted");
                        return None;
                    }
                    None => return None,
                }
            }
        },
    );

    Ok(feed.boxed())
}
