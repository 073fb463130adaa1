use async_trait::async_trait;
use diesel::result::DatabaseErrorKind;

use super::{
    models::{NewPost, NewReply, Post, Reply, ReplyView},
    tree::TreeError,
};

mod memory;
mod postgres;

pub use memory::MemoryThreadStore;
pub use postgres::PgThreadStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Could not reach the database: {0}")]
    Connection(String),

    #[error(transparent)]
    Query(#[from] diesel::result::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("Expected {expected} row(s) to be written, but {actual} were")]
    PartialWrite { expected: usize, actual: usize },

    #[error("{entity} `{id}` does not exist")]
    MissingReference { entity: &'static str, id: i32 },

    #[error("Reply `{parent_reply_id}` does not belong to post `{root_post_id}`")]
    CrossThreadParent {
        parent_reply_id: i32,
        root_post_id: i32,
    },
}

impl StoreError {
    /// Whether the failure happened while talking to the database rather
    /// than inside a query it accepted.
    pub fn is_network(&self) -> bool {
        match self {
            StoreError::Connection(_) => true,
            StoreError::Query(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::ClosedConnection,
                _,
            )) => true,
            StoreError::Query(diesel::result::Error::BrokenTransactionManager) => true,
            _ => false,
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(e: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        StoreError::Connection(e.to_string())
    }
}

/// Persistence of posts and their reply threads.
///
/// Implementations must guarantee that:
/// - a reply's parent, if any, exists and belongs to the same post
/// - creating a post together with its release association is atomic
/// - deleting a reply removes its whole subtree atomically, leaving no
///   reply whose parent is gone
#[async_trait]
pub trait ThreadStore: Send + Sync {
    async fn create_post(&self, post: NewPost, release_information_id: i32) -> StoreResult<i32>;

    async fn create_reply(&self, reply: NewReply) -> StoreResult<i32>;

    async fn get_post(&self, post_id: i32) -> StoreResult<Option<Post>>;

    async fn get_reply(&self, reply_id: i32) -> StoreResult<Option<Reply>>;

    /// Every reply of the post, in thread order. An empty thread is an
    /// empty vector, not an error.
    async fn get_all_by_post_id(&self, root_post_id: i32) -> StoreResult<Vec<ReplyView>>;

    /// Deletes the reply and all of its descendants. Returns `false` if
    /// the reply does not exist.
    async fn delete(&self, reply_id: i32) -> StoreResult<bool>;
}

#[async_trait]
impl<S: ThreadStore + ?Sized> ThreadStore for std::sync::Arc<S> {
    async fn create_post(&self, post: NewPost, release_information_id: i32) -> StoreResult<i32> {
        (**self).create_post(post, release_information_id).await
    }

    async fn create_reply(&self, reply: NewReply) -> StoreResult<i32> {
        (**self).create_reply(reply).await
    }

    async fn get_post(&self, post_id: i32) -> StoreResult<Option<Post>> {
        (**self).get_post(post_id).await
    }

    async fn get_reply(&self, reply_id: i32) -> StoreResult<Option<Reply>> {
        (**self).get_reply(reply_id).await
    }

    async fn get_all_by_post_id(&self, root_post_id: i32) -> StoreResult<Vec<ReplyView>> {
        (**self).get_all_by_post_id(root_post_id).await
    }

    async fn delete(&self, reply_id: i32) -> StoreResult<bool> {
        (**self).delete(reply_id).await
    }
}
