use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A root post. `release_information_id` lives in its own association table
/// and is joined in when the post is loaded.
#[derive(Queryable, Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Post {
    pub id: i32,
    pub poster_id: i32,
    pub release_information_id: i32,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::posts)]
pub struct NewPost {
    pub poster_id: i32,
    pub content: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::post_release_informations)]
pub struct NewPostReleaseInformation {
    pub post_id: i32,
    pub release_information_id: i32,
}

#[derive(Queryable, Selectable, Debug, Serialize, Deserialize, Clone, PartialEq)]
#[diesel(table_name = crate::schema::replies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Reply {
    pub id: i32,
    pub author_id: i32,
    pub root_post_id: i32,
    pub parent_reply_id: Option<i32>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::replies)]
pub struct NewReply {
    pub author_id: i32,
    pub root_post_id: i32,
    pub parent_reply_id: Option<i32>,
    pub content: String,
}

// A reply as it comes out of the tree query, before it is placed in the tree
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyRow {
    pub reply: Reply,
    pub author_name: String,
    pub release_version: Option<String>,
}

// The model that will be returned to the client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReplyView {
    pub id: i32,
    pub author_id: i32,
    pub author_name: String,
    pub root_post_id: i32,
    pub parent_reply_id: Option<i32>,
    pub release_version: Option<String>,
    pub content: String,
    pub created_at: NaiveDateTime,
    pub nesting_level: usize,
    pub immediate_child_count: usize,
}

impl ReplyView {
    pub fn from_row(row: ReplyRow, nesting_level: usize, immediate_child_count: usize) -> Self {
        let ReplyRow {
            reply,
            author_name,
            release_version,
        } = row;

        ReplyView {
            id: reply.id,
            author_id: reply.author_id,
            author_name,
            root_post_id: reply.root_post_id,
            parent_reply_id: reply.parent_reply_id,
            release_version,
            content: reply.content,
            created_at: reply.created_at,
            nesting_level,
            immediate_child_count,
        }
    }
}
