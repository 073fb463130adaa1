use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{App, error::AppError, json::Submission};

use super::{
    author::AuthorId,
    models::{Post, Reply, ReplyView},
    store::ThreadStore,
};

const MAX_CONTENT_LENGTH: usize = 5000;

pub fn route<S: ThreadStore + 'static>() -> Router<App<S>> {
    Router::<App<S>>::new()
        .route("/posts", post(create_post::<S>))
        .route("/posts/{post_id}", get(get_post::<S>))
        .route(
            "/posts/{post_id}/replies",
            get(get_replies::<S>).post(create_reply::<S>),
        )
        .route(
            "/replies/{reply_id}",
            get(get_reply::<S>).delete(delete_reply::<S>),
        )
}

#[derive(Serialize, Deserialize)]
pub struct Created {
    pub id: i32,
}

#[derive(Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

#[derive(Deserialize)]
pub struct PostSubmission {
    release_information_id: i32,
    content: String,
}

#[derive(Deserialize)]
pub struct ReplySubmission {
    parent_reply_id: Option<i32>,
    content: String,
}

fn validate_content(content: String) -> Result<String, &'static str> {
    let content = content.trim().to_string();

    if content.is_empty() {
        return Err("No content provided");
    }

    if content.chars().count() > MAX_CONTENT_LENGTH {
        return Err("Content too long (max 5000 characters)");
    }

    Ok(content)
}

async fn create_post<S: ThreadStore + 'static>(
    State(ctx): State<App<S>>,
    AuthorId(poster_id): AuthorId,
    Submission(submission): Submission<PostSubmission>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let content =
        validate_content(submission.content).map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let id = ctx
        .threads
        .post(poster_id, submission.release_information_id, content)
        .await?;

    Ok((StatusCode::CREATED, Json(Created { id })))
}

async fn get_post<S: ThreadStore + 'static>(
    State(ctx): State<App<S>>,
    Path(post_id): Path<i32>,
) -> Result<Json<Post>, AppError> {
    Ok(Json(ctx.threads.fetch_post(post_id).await?))
}

async fn create_reply<S: ThreadStore + 'static>(
    State(ctx): State<App<S>>,
    Path(post_id): Path<i32>,
    AuthorId(author_id): AuthorId,
    Submission(submission): Submission<ReplySubmission>,
) -> Result<(StatusCode, Json<Created>), AppError> {
    let content =
        validate_content(submission.content).map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let id = ctx
        .threads
        .reply(author_id, post_id, submission.parent_reply_id, content)
        .await?;

    Ok((StatusCode::CREATED, Json(Created { id })))
}

async fn get_replies<S: ThreadStore + 'static>(
    State(ctx): State<App<S>>,
    Path(post_id): Path<i32>,
) -> Result<Json<Vec<ReplyView>>, AppError> {
    Ok(Json(ctx.threads.fetch_all_by_post_id(post_id).await?))
}

async fn get_reply<S: ThreadStore + 'static>(
    State(ctx): State<App<S>>,
    Path(reply_id): Path<i32>,
) -> Result<Json<Reply>, AppError> {
    Ok(Json(ctx.threads.fetch_reply(reply_id).await?))
}

async fn delete_reply<S: ThreadStore + 'static>(
    State(ctx): State<App<S>>,
    Path(reply_id): Path<i32>,
    AuthorId(_): AuthorId,
) -> Result<Json<Deleted>, AppError> {
    let deleted = ctx.threads.delete(reply_id).await?;

    Ok(Json(Deleted { deleted }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_content_trims() {
        assert_eq!(validate_content("  hi  ".into()), Ok("hi".to_string()));
    }

    #[test]
    fn test_validate_content_rejects_empty() {
        assert_eq!(validate_content(" \n ".into()), Err("No content provided"));
    }

    #[test]
    fn test_validate_content_rejects_long() {
        let long = "a".repeat(MAX_CONTENT_LENGTH + 1);
        assert_eq!(
            validate_content(long),
            Err("Content too long (max 5000 characters)")
        );
        assert!(validate_content("a".repeat(MAX_CONTENT_LENGTH)).is_ok());
    }
}
