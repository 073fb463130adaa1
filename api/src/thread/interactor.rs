use axum::http::StatusCode;

use crate::error::ApiRequestError;

use super::{
    models::{NewPost, NewReply, Post, Reply, ReplyView},
    store::{StoreError, ThreadStore},
};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ThreadError {
    #[error("Network error, please check your connection and try again.")]
    Network,

    #[error("{0} does not exist.")]
    DoesNotExist(&'static str),

    #[error("Failed to post, please try again.")]
    PostFailed,

    #[error("Failed to retrieve replies.")]
    RetrievalFailed,

    #[error("Failed to delete reply.")]
    DeletionFailed,
}

impl ThreadError {
    pub fn code(&self) -> &'static str {
        match self {
            ThreadError::Network => "NETWORK_ERR",
            ThreadError::DoesNotExist(_) => "NOT_FOUND",
            ThreadError::PostFailed => "POST_FAILED",
            ThreadError::RetrievalFailed => "RETRIEVAL_FAILED",
            ThreadError::DeletionFailed => "DELETION_FAILED",
        }
    }
}

impl ApiRequestError for ThreadError {
    fn status_code(&self) -> StatusCode {
        match self {
            ThreadError::Network => StatusCode::SERVICE_UNAVAILABLE,
            ThreadError::DoesNotExist(_) => StatusCode::NOT_FOUND,
            ThreadError::PostFailed
            | ThreadError::RetrievalFailed
            | ThreadError::DeletionFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn translate(err: StoreError, otherwise: ThreadError) -> ThreadError {
    if err.is_network() {
        tracing::warn!(?err, "Database unreachable");
        ThreadError::Network
    } else {
        tracing::warn!(?err, kind = ?otherwise, "Thread operation failed");
        otherwise
    }
}

/// Entry point for everything the loaders do with posts and replies. Input is
/// expected to be validated already; only referential integrity is enforced,
/// by the store.
pub struct ReplyInteractor<S> {
    store: S,
}

impl<S: ThreadStore> ReplyInteractor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn post(
        &self,
        poster_id: i32,
        release_information_id: i32,
        content: String,
    ) -> Result<i32, ThreadError> {
        let id = self
            .store
            .create_post(NewPost { poster_id, content }, release_information_id)
            .await
            .map_err(|e| translate(e, ThreadError::PostFailed))?;

        tracing::info!(post_id = id, poster_id, "Created post");
        Ok(id)
    }

    pub async fn reply(
        &self,
        author_id: i32,
        root_post_id: i32,
        parent_reply_id: Option<i32>,
        content: String,
    ) -> Result<i32, ThreadError> {
        let id = self
            .store
            .create_reply(NewReply {
                author_id,
                root_post_id,
                parent_reply_id,
                content,
            })
            .await
            .map_err(|e| translate(e, ThreadError::PostFailed))?;

        tracing::info!(reply_id = id, root_post_id, ?parent_reply_id, "Created reply");
        Ok(id)
    }

    pub async fn fetch_all_by_post_id(&self, post_id: i32) -> Result<Vec<ReplyView>, ThreadError> {
        self.store
            .get_all_by_post_id(post_id)
            .await
            .map_err(|e| translate(e, ThreadError::RetrievalFailed))
    }

    pub async fn fetch_post(&self, post_id: i32) -> Result<Post, ThreadError> {
        self.store
            .get_post(post_id)
            .await
            .map_err(|e| translate(e, ThreadError::RetrievalFailed))?
            .ok_or(ThreadError::DoesNotExist("Post"))
    }

    pub async fn fetch_reply(&self, reply_id: i32) -> Result<Reply, ThreadError> {
        self.store
            .get_reply(reply_id)
            .await
            .map_err(|e| translate(e, ThreadError::RetrievalFailed))?
            .ok_or(ThreadError::DoesNotExist("Reply"))
    }

    pub async fn delete(&self, reply_id: i32) -> Result<bool, ThreadError> {
        let deleted = self
            .store
            .delete(reply_id)
            .await
            .map_err(|e| translate(e, ThreadError::DeletionFailed))?;

        if deleted {
            tracing::info!(reply_id, "Deleted reply and its descendants");
        }
        Ok(deleted)
    }
}
