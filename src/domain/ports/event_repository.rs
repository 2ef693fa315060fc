//! Event repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Event, EventFilter};

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: &Event) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Event>>;

    /// `inbox`/`thread`/general log queries, ordered per `filter.direction`.
    async fn list(&self, filter: &EventFilter) -> DomainResult<Vec<Event>>;

    /// All direct replies and broadcast-descendants of `parent_message_id`.
    async fn list_thread(&self, parent_message_id: Uuid) -> DomainResult<Vec<Event>>;
}
