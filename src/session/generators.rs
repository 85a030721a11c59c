use async_trait::async_trait;
use uuid::Uuid;

/// Trait for generating usernames
#[async_trait]
pub trait UsernameGenerator: Send + Sync {
    async fn generate(&self) -> String;
}

/// Pet name-based username generator
#[derive(Default)]
pub struct PetNameUsernameGenerator;

impl PetNameUsernameGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UsernameGenerator for PetNameUsernameGenerator {
    async fn generate(&self) -> String {
        petname::Petnames::default().generate_one(2, "-")
    }
}

pub fn generate_player_id() -> String {
    Uuid::new_v4().to_string()
}
