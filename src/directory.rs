//! Lookups served by the listing and identity services. The engine only ever
//! compares the ids these return; it never stores users or space metadata.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::{SpaceId, UserId};

/// The booking-relevant part of a space listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceInfo {
    pub id: SpaceId,
    pub host_id: UserId,
    /// Integral currency units per one-hour slot.
    pub price_per_hour: i64,
    pub max_capacity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    Host,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInfo {
    pub id: UserId,
    pub role: Role,
}

#[async_trait]
pub trait SpaceDirectory: Send + Sync {
    async fn find_space(&self, id: SpaceId) -> Option<SpaceInfo>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> Option<UserInfo>;
}

/// In-process directory, for tests and for embedders that mirror listings locally.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    spaces: DashMap<SpaceId, SpaceInfo>,
    users: DashMap<UserId, UserInfo>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_space(&self, space: SpaceInfo) {
        self.spaces.insert(space.id, space);
    }

    pub fn remove_space(&self, id: &SpaceId) {
        self.spaces.remove(id);
    }

    pub fn add_user(&self, id: UserId, role: Role) {
        self.users.insert(id, UserInfo { id, role });
    }
}

#[async_trait]
impl SpaceDirectory for StaticDirectory {
    async fn find_space(&self, id: SpaceId) -> Option<SpaceInfo> {
        self.spaces.get(&id).map(|e| *e.value())
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn find_user(&self, id: UserId) -> Option<UserInfo> {
        self.users.get(&id).map(|e| *e.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_directory_lookups() {
        let dir = StaticDirectory::new();
        let host = UserId::new();
        let space = SpaceInfo {
            id: SpaceId::new(),
            host_id: host,
            price_per_hour: 15_000,
            max_capacity: 4,
        };
        dir.add_space(space);
        dir.add_user(host, Role::Host);

        assert_eq!(dir.find_space(space.id).await, Some(space));
        assert_eq!(dir.find_user(host).await.map(|u| u.role), Some(Role::Host));
        assert!(dir.find_user(UserId::new()).await.is_none());

        dir.remove_space(&space.id);
        assert!(dir.find_space(space.id).await.is_none());
    }
}
