use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use crate::thread::{
    models::{NewPost, NewReply, Post, Reply, ReplyRow, ReplyView},
    tree::{self, ReplyTree},
};

use super::{StoreError, StoreResult, ThreadStore};

#[derive(Default)]
struct Tables {
    users: HashMap<i32, String>,
    release_informations: HashMap<i32, String>,
    posts: BTreeMap<i32, Post>,
    replies: BTreeMap<i32, Reply>,
    next_id: i32,
    last_created_at: Option<NaiveDateTime>,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    /// Creation time for a new row. Never earlier than the previous one, so a
    /// wall clock stepping backwards cannot make a newer reply sort as older.
    fn timestamp(&mut self) -> NaiveDateTime {
        let now = chrono::Utc::now().naive_utc();
        let created_at = self.last_created_at.map_or(now, |last| last.max(now));
        self.last_created_at = Some(created_at);
        created_at
    }

    fn thread(&self, root_post_id: i32) -> Vec<Reply> {
        self.replies
            .values()
            .filter(|r| r.root_post_id == root_post_id)
            .cloned()
            .collect()
    }
}

/// A store that keeps everything in process memory, with the same
/// guarantees as [`super::PgThreadStore`]. Each operation holds the lock for
/// its whole duration, which makes it atomic.
#[derive(Default)]
pub struct MemoryThreadStore {
    tables: Mutex<Tables>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, display_name: impl Into<String>) -> i32 {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.users.insert(id, display_name.into());
        id
    }

    pub async fn insert_release_information(&self, version: impl Into<String>) -> i32 {
        let mut tables = self.tables.lock().await;
        let id = tables.next_id();
        tables.release_informations.insert(id, version.into());
        id
    }

    /// Snapshot of every stored reply, ordered by id
    pub async fn replies(&self) -> Vec<Reply> {
        self.tables.lock().await.replies.values().cloned().collect()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn create_post(&self, post: NewPost, release_information_id: i32) -> StoreResult<i32> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&post.poster_id) {
            return Err(StoreError::MissingReference {
                entity: "User",
                id: post.poster_id,
            });
        }
        if !tables
            .release_informations
            .contains_key(&release_information_id)
        {
            return Err(StoreError::MissingReference {
                entity: "Release information",
                id: release_information_id,
            });
        }

        let id = tables.next_id();
        let created_at = tables.timestamp();
        tables.posts.insert(
            id,
            Post {
                id,
                poster_id: post.poster_id,
                release_information_id,
                content: post.content,
                created_at,
            },
        );

        Ok(id)
    }

    async fn create_reply(&self, reply: NewReply) -> StoreResult<i32> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&reply.author_id) {
            return Err(StoreError::MissingReference {
                entity: "User",
                id: reply.author_id,
            });
        }
        if !tables.posts.contains_key(&reply.root_post_id) {
            return Err(StoreError::MissingReference {
                entity: "Post",
                id: reply.root_post_id,
            });
        }
        if let Some(parent_reply_id) = reply.parent_reply_id {
            match tables.replies.get(&parent_reply_id) {
                None => {
                    return Err(StoreError::MissingReference {
                        entity: "Reply",
                        id: parent_reply_id,
                    });
                }
                Some(parent) if parent.root_post_id != reply.root_post_id => {
                    return Err(StoreError::CrossThreadParent {
                        parent_reply_id,
                        root_post_id: reply.root_post_id,
                    });
                }
                Some(_) => {}
            }
        }

        let id = tables.next_id();
        let created_at = tables.timestamp();
        tables.replies.insert(
            id,
            Reply {
                id,
                author_id: reply.author_id,
                root_post_id: reply.root_post_id,
                parent_reply_id: reply.parent_reply_id,
                content: reply.content,
                created_at,
            },
        );

        Ok(id)
    }

    async fn get_post(&self, post_id: i32) -> StoreResult<Option<Post>> {
        Ok(self.tables.lock().await.posts.get(&post_id).cloned())
    }

    async fn get_reply(&self, reply_id: i32) -> StoreResult<Option<Reply>> {
        Ok(self.tables.lock().await.replies.get(&reply_id).cloned())
    }

    async fn get_all_by_post_id(&self, root_post_id: i32) -> StoreResult<Vec<ReplyView>> {
        let tables = self.tables.lock().await;

        let release_version = tables
            .posts
            .get(&root_post_id)
            .and_then(|p| tables.release_informations.get(&p.release_information_id))
            .cloned();

        let rows = tables
            .thread(root_post_id)
            .into_iter()
            .map(|reply| {
                let author_name = tables
                    .users
                    .get(&reply.author_id)
                    .cloned()
                    .ok_or(StoreError::MissingReference {
                        entity: "User",
                        id: reply.author_id,
                    })?;

                Ok(ReplyRow {
                    reply,
                    author_name,
                    release_version: release_version.clone(),
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(tree::linearize(rows)?)
    }

    async fn delete(&self, reply_id: i32) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;

        let Some(root_post_id) = tables.replies.get(&reply_id).map(|r| r.root_post_id) else {
            return Ok(false);
        };

        let Some(ids) =
            ReplyTree::from_rows(tables.thread(root_post_id))?.descendants_of(reply_id)
        else {
            return Ok(false);
        };

        for id in ids {
            tables.replies.remove(&id);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Fixture {
        store: MemoryThreadStore,
        author_id: i32,
        post_id: i32,
    }

    async fn fixture() -> Fixture {
        let store = MemoryThreadStore::new();
        let author_id = store.insert_user("Alice").await;
        let release_id = store.insert_release_information("1.4.0").await;
        let post_id = store
            .create_post(
                NewPost {
                    poster_id: author_id,
                    content: "Hello".into(),
                },
                release_id,
            )
            .await
            .unwrap();

        Fixture {
            store,
            author_id,
            post_id,
        }
    }

    impl Fixture {
        async fn reply(&self, parent_reply_id: Option<i32>) -> i32 {
            self.store
                .create_reply(NewReply {
                    author_id: self.author_id,
                    root_post_id: self.post_id,
                    parent_reply_id,
                    content: "reply".into(),
                })
                .await
                .unwrap()
        }
    }

    fn assert_no_orphans(replies: &[Reply]) {
        for reply in replies {
            if let Some(parent) = reply.parent_reply_id {
                assert!(
                    replies.iter().any(|r| r.id == parent),
                    "reply {} lost its parent {}",
                    reply.id,
                    parent
                );
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_thread() {
        let f = fixture().await;
        let views = f.store.get_all_by_post_id(f.post_id).await.unwrap();
        assert!(views.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_denormalizes_display_fields() {
        let f = fixture().await;
        let r1 = f.reply(None).await;
        let r2 = f.reply(Some(r1)).await;

        let views = f.store.get_all_by_post_id(f.post_id).await.unwrap();

        assert_eq!(views.iter().map(|v| v.id).collect::<Vec<_>>(), vec![r1, r2]);
        assert!(views.iter().all(|v| v.author_name == "Alice"));
        assert!(
            views
                .iter()
                .all(|v| v.release_version.as_deref() == Some("1.4.0"))
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_to_descendants() {
        let f = fixture().await;
        let r1 = f.reply(None).await;
        let r2 = f.reply(Some(r1)).await;
        let r3 = f.reply(Some(r2)).await;
        let r4 = f.reply(Some(r1)).await;
        let r5 = f.reply(None).await;

        assert!(f.store.delete(r2).await.unwrap());

        let remaining: Vec<i32> = f.store.replies().await.iter().map(|r| r.id).collect();
        assert_eq!(remaining, vec![r1, r4, r5]);
        assert!(!remaining.contains(&r3));
        assert_no_orphans(&f.store.replies().await);
    }

    #[tokio::test]
    async fn test_delete_missing_reply_has_no_side_effects() {
        let f = fixture().await;
        f.reply(None).await;
        let before = f.store.replies().await;

        assert!(!f.store.delete(9999).await.unwrap());
        assert_eq!(f.store.replies().await, before);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_of_one_reply() {
        let f = fixture().await;
        let r1 = f.reply(None).await;
        let r2 = f.reply(Some(r1)).await;
        f.reply(Some(r2)).await;

        let (first, second) = tokio::join!(f.store.delete(r1), f.store.delete(r1));

        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort();
        assert_eq!(outcomes, vec![false, true]);
        assert!(f.store.replies().await.is_empty());
    }

    #[tokio::test]
    async fn test_created_at_never_goes_backwards() {
        let f = fixture().await;
        let ahead = chrono::Utc::now().naive_utc() + chrono::Duration::hours(1);
        f.store.tables.lock().await.last_created_at = Some(ahead);

        let r1 = f.reply(None).await;
        let r2 = f.reply(None).await;

        let r1 = f.store.get_reply(r1).await.unwrap().unwrap();
        let r2 = f.store.get_reply(r2).await.unwrap().unwrap();
        assert_eq!(r1.created_at, ahead);
        assert!(r2.created_at >= r1.created_at);

        // The later reply still comes first
        let views = f.store.get_all_by_post_id(f.post_id).await.unwrap();
        assert_eq!(views.iter().map(|v| v.id).collect::<Vec<_>>(), vec![r2.id, r1.id]);
    }

    #[tokio::test]
    async fn test_no_orphans_after_mixed_operations() {
        let f = fixture().await;
        let a = f.reply(None).await;
        let b = f.reply(Some(a)).await;
        let c = f.reply(Some(b)).await;
        let d = f.reply(Some(c)).await;
        let e = f.reply(Some(a)).await;
        f.reply(Some(e)).await;

        assert!(f.store.delete(c).await.unwrap());
        assert!(!f.store.delete(d).await.unwrap());
        f.reply(Some(b)).await;
        assert!(f.store.delete(a).await.unwrap());

        let replies = f.store.replies().await;
        assert!(replies.is_empty());
        assert_no_orphans(&replies);
    }

    #[tokio::test]
    async fn test_reply_to_another_thread_is_rejected() {
        let f = fixture().await;
        let other_release = f.store.insert_release_information("2.0.0").await;
        let other_post = f
            .store
            .create_post(
                NewPost {
                    poster_id: f.author_id,
                    content: "Other".into(),
                },
                other_release,
            )
            .await
            .unwrap();
        let foreign_parent = f
            .store
            .create_reply(NewReply {
                author_id: f.author_id,
                root_post_id: other_post,
                parent_reply_id: None,
                content: "elsewhere".into(),
            })
            .await
            .unwrap();

        let result = f
            .store
            .create_reply(NewReply {
                author_id: f.author_id,
                root_post_id: f.post_id,
                parent_reply_id: Some(foreign_parent),
                content: "cross".into(),
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::CrossThreadParent { .. })
        ));
    }

    #[tokio::test]
    async fn test_reply_to_missing_parent_is_rejected() {
        let f = fixture().await;

        let result = f
            .store
            .create_reply(NewReply {
                author_id: f.author_id,
                root_post_id: f.post_id,
                parent_reply_id: Some(4242),
                content: "nobody home".into(),
            })
            .await;

        assert!(matches!(
            result,
            Err(StoreError::MissingReference { entity: "Reply", id: 4242 })
        ));
    }
}
