use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};

use crate::{
    db::DbPool,
    schema::{post_release_informations, posts, release_informations, replies, users},
    thread::{
        models::{NewPost, NewPostReleaseInformation, NewReply, Post, Reply, ReplyRow, ReplyView},
        tree::{self, ReplyTree},
    },
};

use super::{StoreError, StoreResult, ThreadStore};

/// Postgres-backed store. Connections are checked out per operation and go
/// back to the pool when dropped, on every path.
#[derive(Clone)]
pub struct PgThreadStore {
    pool: DbPool,
}

impl PgThreadStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

async fn root_post_of(conn: &mut AsyncPgConnection, reply_id: i32) -> QueryResult<Option<i32>> {
    replies::table
        .filter(replies::id.eq(reply_id))
        .select(replies::root_post_id)
        .first::<i32>(conn)
        .await
        .optional()
}

#[async_trait]
impl ThreadStore for PgThreadStore {
    #[tracing::instrument(skip(self, post))]
    async fn create_post(&self, post: NewPost, release_information_id: i32) -> StoreResult<i32> {
        let mut conn = self.pool.get().await?;

        conn.transaction(|conn| {
            Box::pin(async move {
                let post_id = diesel::insert_into(posts::table)
                    .values(&post)
                    .returning(posts::id)
                    .get_result::<i32>(conn)
                    .await?;

                let linked = diesel::insert_into(post_release_informations::table)
                    .values(&NewPostReleaseInformation {
                        post_id,
                        release_information_id,
                    })
                    .execute(conn)
                    .await?;

                if linked != 1 {
                    return Err(StoreError::PartialWrite {
                        expected: 1,
                        actual: linked,
                    });
                }

                Ok::<_, StoreError>(post_id)
            })
        })
        .await
        .inspect_err(|err| tracing::error!(?err, "Failed to create post"))
    }

    #[tracing::instrument(skip(self, reply), fields(root_post_id = reply.root_post_id))]
    async fn create_reply(&self, reply: NewReply) -> StoreResult<i32> {
        let mut conn = self.pool.get().await?;

        conn.transaction(|conn| {
            Box::pin(async move {
                // check if the parent reply actually belongs to the post
                if let Some(parent_reply_id) = reply.parent_reply_id {
                    match root_post_of(conn, parent_reply_id).await? {
                        None => {
                            return Err(StoreError::MissingReference {
                                entity: "Reply",
                                id: parent_reply_id,
                            });
                        }
                        Some(root_post_id) if root_post_id != reply.root_post_id => {
                            return Err(StoreError::CrossThreadParent {
                                parent_reply_id,
                                root_post_id: reply.root_post_id,
                            });
                        }
                        Some(_) => {}
                    }
                }

                let reply_id = diesel::insert_into(replies::table)
                    .values(&reply)
                    .returning(replies::id)
                    .get_result::<i32>(conn)
                    .await?;

                Ok::<_, StoreError>(reply_id)
            })
        })
        .await
        .inspect_err(|err| tracing::error!(?err, "Failed to create reply"))
    }

    async fn get_post(&self, post_id: i32) -> StoreResult<Option<Post>> {
        let mut conn = self.pool.get().await?;

        Ok(posts::table
            .inner_join(post_release_informations::table)
            .filter(posts::id.eq(post_id))
            .select((
                posts::id,
                posts::poster_id,
                post_release_informations::release_information_id,
                posts::content,
                posts::created_at,
            ))
            .first::<Post>(&mut conn)
            .await
            .optional()
            .inspect_err(|err| tracing::error!(?err, post_id, "Failed to fetch post"))?)
    }

    async fn get_reply(&self, reply_id: i32) -> StoreResult<Option<Reply>> {
        let mut conn = self.pool.get().await?;

        Ok(replies::table
            .filter(replies::id.eq(reply_id))
            .select(Reply::as_select())
            .first(&mut conn)
            .await
            .optional()
            .inspect_err(|err| tracing::error!(?err, reply_id, "Failed to fetch reply"))?)
    }

    #[tracing::instrument(skip(self))]
    async fn get_all_by_post_id(&self, root_post_id: i32) -> StoreResult<Vec<ReplyView>> {
        let mut conn = self.pool.get().await?;

        let release_version = post_release_informations::table
            .inner_join(release_informations::table)
            .filter(post_release_informations::post_id.eq(root_post_id))
            .select(release_informations::version)
            .first::<String>(&mut conn)
            .await
            .optional()
            .inspect_err(|err| tracing::error!(?err, "Failed to fetch release version"))?;

        let rows = replies::table
            .inner_join(users::table)
            .filter(replies::root_post_id.eq(root_post_id))
            .select((Reply::as_select(), users::display_name))
            .load::<(Reply, String)>(&mut conn)
            .await
            .inspect_err(|err| tracing::error!(?err, "Failed to fetch replies"))?;

        // The connection is not needed for the in-memory part
        drop(conn);

        let rows = rows
            .into_iter()
            .map(|(reply, author_name)| ReplyRow {
                reply,
                author_name,
                release_version: release_version.clone(),
            })
            .collect();

        Ok(tree::linearize(rows)
            .inspect_err(|err| tracing::error!(?err, "Reply thread is inconsistent"))?)
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, reply_id: i32) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;

        conn.transaction(|conn| {
            Box::pin(async move {
                let Some(root_post_id) = root_post_of(conn, reply_id).await? else {
                    return Ok::<_, StoreError>(false);
                };

                // Rows are locked in id order so two deletes in one thread
                // wait on each other instead of deadlocking
                let thread = replies::table
                    .filter(replies::root_post_id.eq(root_post_id))
                    .order(replies::id)
                    .select(Reply::as_select())
                    .for_update()
                    .load::<Reply>(conn)
                    .await?;

                // A concurrent delete may have removed the reply after the
                // lookup above, in which case the locked rows no longer hold it
                let Some(ids) = ReplyTree::from_rows(thread)?.descendants_of(reply_id) else {
                    return Ok(false);
                };

                let deleted = diesel::delete(replies::table.filter(replies::id.eq_any(&ids)))
                    .execute(conn)
                    .await?;

                if deleted != ids.len() {
                    return Err(StoreError::PartialWrite {
                        expected: ids.len(),
                        actual: deleted,
                    });
                }

                tracing::debug!(deleted, "Deleted reply subtree");

                Ok(true)
            })
        })
        .await
        .inspect_err(|err| tracing::error!(?err, "Failed to delete reply"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::ServerConfig;

    // These run against a migrated database:
    // DATABASE_URL=postgres://... cargo test -- --ignored
    struct Fixture {
        store: PgThreadStore,
        author_id: i32,
        post_id: i32,
    }

    async fn fixture() -> Fixture {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = crate::db::build_pool(&ServerConfig::with_database_url(url)).unwrap();
        let store = PgThreadStore::new(pool);

        let release_information_id = insert_release_information(&store).await;
        let author_id = insert_user(&store, "Dana").await;
        let post_id = store
            .create_post(
                NewPost {
                    poster_id: author_id,
                    content: "Hello".into(),
                },
                release_information_id,
            )
            .await
            .unwrap();

        Fixture {
            store,
            author_id,
            post_id,
        }
    }

    async fn insert_user(store: &PgThreadStore, display_name: &str) -> i32 {
        let mut conn = store.pool.get().await.unwrap();
        diesel::insert_into(users::table)
            .values(users::display_name.eq(display_name))
            .returning(users::id)
            .get_result(&mut conn)
            .await
            .unwrap()
    }

    async fn insert_release_information(store: &PgThreadStore) -> i32 {
        let mut conn = store.pool.get().await.unwrap();
        diesel::insert_into(release_informations::table)
            .values(release_informations::version.eq(format!("test-{}", rand::random::<u64>())))
            .returning(release_informations::id)
            .get_result(&mut conn)
            .await
            .unwrap()
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

        async fn stored_ids(&self) -> Vec<i32> {
            let mut conn = self.store.pool.get().await.unwrap();
            replies::table
                .filter(replies::root_post_id.eq(self.post_id))
                .order(replies::id)
                .select(replies::id)
                .load(&mut conn)
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database"]
    async fn test_fetch_thread_in_recency_first_order() {
        let f = fixture().await;

        // The ten reply fixture, created in id order
        let mut ids = vec![0];
        for parent in [None, None, Some(2), None, Some(3), Some(4), Some(5), Some(4), Some(6), Some(5)] {
            let id = f.reply(parent.map(|p: usize| ids[p])).await;
            ids.push(id);
        }

        let views = f.store.get_all_by_post_id(f.post_id).await.unwrap();

        let expected: Vec<i32> = [4, 8, 6, 9, 2, 3, 5, 10, 7, 1].iter().map(|i| ids[*i]).collect();
        assert_eq!(views.iter().map(|v| v.id).collect::<Vec<_>>(), expected);
        assert_eq!(
            views.iter().map(|v| v.nesting_level).collect::<Vec<_>>(),
            vec![0, 1, 1, 2, 0, 1, 2, 3, 3, 0]
        );
        assert!(views.iter().all(|v| v.author_name == "Dana"));
        assert!(
            views
                .iter()
                .all(|v| v.release_version.as_deref().is_some_and(|r| r.starts_with("test-")))
        );
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database"]
    async fn test_delete_cascades_to_descendants() {
        let f = fixture().await;
        let r1 = f.reply(None).await;
        let r2 = f.reply(Some(r1)).await;
        let r3 = f.reply(Some(r2)).await;
        f.reply(Some(r3)).await;
        let r5 = f.reply(Some(r1)).await;
        let r6 = f.reply(None).await;

        assert!(f.store.delete(r2).await.unwrap());
        assert_eq!(f.stored_ids().await, vec![r1, r5, r6]);

        assert!(f.store.delete(r1).await.unwrap());
        assert_eq!(f.stored_ids().await, vec![r6]);
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database"]
    async fn test_delete_missing_reply_has_no_side_effects() {
        let f = fixture().await;
        f.reply(None).await;
        let before = f.stored_ids().await;

        assert!(!f.store.delete(i32::MAX).await.unwrap());
        assert_eq!(f.stored_ids().await, before);
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database"]
    async fn test_concurrent_deletes_of_one_reply() {
        let f = fixture().await;
        let r1 = f.reply(None).await;
        let r2 = f.reply(Some(r1)).await;
        f.reply(Some(r2)).await;

        // Clones share the pool, so each delete runs on its own connection
        let other = f.store.clone();
        let (first, second) = tokio::join!(f.store.delete(r1), other.delete(r1));

        let mut outcomes = vec![first.unwrap(), second.unwrap()];
        outcomes.sort();
        assert_eq!(outcomes, vec![false, true]);
        assert!(f.stored_ids().await.is_empty());
    }

    #[tokio::test]
    #[ignore = "needs a Postgres database"]
    async fn test_reply_to_another_thread_is_rejected() {
        let f = fixture().await;
        let other = fixture().await;
        let foreign_parent = other.reply(None).await;

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
        assert!(f.stored_ids().await.is_empty());
    }
}
