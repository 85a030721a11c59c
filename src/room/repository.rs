use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use super::models::RoomModel;
use crate::shared::AppError;

/// A room behind its own lock. Holding the lock serializes every mutation of
/// that room; different rooms never contend.
pub type RoomHandle = Arc<Mutex<RoomModel>>;

/// Result of attempting to store a new room
#[derive(Debug, Clone)]
pub enum InsertRoomResult {
    /// Stored, returns the handle now owned by the repository
    Inserted(RoomHandle),
    /// Another room already uses this pin
    PinTaken,
}

/// Trait for room repository operations
#[async_trait]
pub trait RoomRepository {
    /// Atomically stores a room unless its pin is already in use
    async fn try_insert_room(&self, room: RoomModel) -> Result<InsertRoomResult, AppError>;
    async fn get_room(&self, pin: &str) -> Result<Option<RoomHandle>, AppError>;
    /// Returns whether a room was removed
    async fn delete_room(&self, pin: &str) -> Result<bool, AppError>;
    async fn list_rooms(&self) -> Result<Vec<RoomHandle>, AppError>;
}

/// In-memory implementation of RoomRepository
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room), fields(pin = %room.pin))]
    async fn try_insert_room(&self, room: RoomModel) -> Result<InsertRoomResult, AppError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&room.pin) {
            warn!("Pin already in use");
            return Ok(InsertRoomResult::PinTaken);
        }

        let pin = room.pin.clone();
        let handle = Arc::new(Mutex::new(room));
        rooms.insert(pin, Arc::clone(&handle));

        debug!(room_count = rooms.len(), "Room stored in memory");
        Ok(InsertRoomResult::Inserted(handle))
    }

    #[instrument(skip(self))]
    async fn get_room(&self, pin: &str) -> Result<Option<RoomHandle>, AppError> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(pin).cloned();

        if room.is_none() {
            debug!("Room not found in memory");
        }
        Ok(room)
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, pin: &str) -> Result<bool, AppError> {
        let removed = self.rooms.write().await.remove(pin).is_some();
        debug!(removed, "Deleted room from memory");
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn list_rooms(&self) -> Result<Vec<RoomHandle>, AppError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.values().cloned().collect())
    }
}
