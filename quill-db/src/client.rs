use crate::{
    record::{CredentialsRecord, LikeRecord, PostRecord, PostSummaryRecord, UserRecord},
    store::{BlogStore, DbError, Result, UniqueField},
};
use async_trait::async_trait;
use quill_common::model::{
    Id,
    like::{Like, LikeOutcome, LikeToggle},
    post::{CreatePost, Post, PostChanges, PostCounts, PostDetail, PostMarker, PostSummary},
    user::{CreateUser, Email, User, UserCredentials, UserMarker, UserName},
};
use sqlx::{
    PgConnection, PgPool, error::ErrorKind, migrate::Migrator, postgres::PgPoolOptions, query,
    query_as, query_scalar,
};
use tracing::{debug, instrument};

pub use sqlx::migrate::MigrateError;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const POST_SUMMARY_SELECT: &str = "
    SELECT
        posts.post_id,
        posts.title,
        posts.content,
        posts.featured_img,
        posts.author_id,
        posts.created_at,
        posts.updated_at,
        users.email,
        users.user_name,
        users.full_name,
        users.profile_pic,
        users.created_at AS user_created_at,
        (
            SELECT COUNT(*)
            FROM blog.likes
            WHERE likes.post_id = posts.post_id
        ) AS like_count
    FROM
        blog.posts JOIN users.users ON users.user_id = posts.author_id
    ";

const LIKES_POST_FKEY: &str = "likes_post_id_fkey";

/// Translates constraint violations into their domain meaning.
fn classify(err: sqlx::Error) -> DbError {
    if let sqlx::Error::Database(db_err) = &err {
        match (db_err.kind(), db_err.constraint()) {
            (ErrorKind::UniqueViolation, Some("users_email_key")) => {
                return DbError::Duplicate(UniqueField::Email);
            }
            (ErrorKind::UniqueViolation, Some("users_user_name_key")) => {
                return DbError::Duplicate(UniqueField::UserName);
            }
            (ErrorKind::ForeignKeyViolation, _) => return DbError::MissingReference,
            _ => {}
        }
    }

    DbError::Sqlx(err)
}

#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    async fn count_likes(conn: &mut PgConnection, post_id: Id<PostMarker>) -> Result<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM blog.likes WHERE post_id = $1")
            .bind(post_id.uuid())
            .fetch_one(conn)
            .await?;

        Ok(count.unsigned_abs())
    }

    async fn delete_like(
        conn: &mut PgConnection,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<bool> {
        let deleted = query("DELETE FROM blog.likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id.uuid())
            .bind(post_id.uuid())
            .execute(conn)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }
}

#[async_trait]
impl BlogStore for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT user_id, email, user_name, full_name, profile_pic, created_at
            FROM users.users
            WHERE user_id = $1
            ",
        )
        .bind(user_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_credentials(&self, email: &Email) -> Result<Option<UserCredentials>> {
        let record = query_as::<_, CredentialsRecord>(
            "
            SELECT user_id, email, user_name, full_name, profile_pic, created_at, password_hash
            FROM users.users
            WHERE email = $1
            ",
        )
        .bind(email.get())
        .fetch_optional(&self.pool)
        .await?;

        let credentials = record.map(UserCredentials::try_from).transpose()?;
        Ok(credentials)
    }

    async fn email_exists(&self, email: &Email) -> Result<bool> {
        let exists = query_scalar("SELECT EXISTS (SELECT 1 FROM users.users WHERE email = $1)")
            .bind(email.get())
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn user_name_exists(&self, user_name: &UserName) -> Result<bool> {
        let exists =
            query_scalar("SELECT EXISTS (SELECT 1 FROM users.users WHERE user_name = $1)")
                .bind(user_name.get())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    #[instrument(skip_all, fields(user_name = user.user_name.get()))]
    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = Id::<UserMarker>::generate();

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (user_id, email, user_name, full_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING user_id, email, user_name, full_name, profile_pic, created_at
            ",
        )
        .bind(user_id.uuid())
        .bind(user.email.get())
        .bind(user.user_name.get())
        .bind(&user.full_name)
        .bind(user.password_hash.as_phc_str())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        debug!(%user_id, "Inserted user");
        Ok(record.try_into()?)
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT post_id, title, content, featured_img, author_id, created_at, updated_at
            FROM blog.posts
            WHERE post_id = $1
            ",
        )
        .bind(post_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_post_summaries(&self) -> Result<Vec<PostSummary>> {
        let records = query_as::<_, PostSummaryRecord>(&format!(
            "{POST_SUMMARY_SELECT} ORDER BY posts.created_at DESC, posts.post_id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let summaries = records
            .into_iter()
            .map(PostSummary::try_from)
            .collect::<Result<_, _>>()?;
        Ok(summaries)
    }

    async fn fetch_post_detail(&self, post_id: Id<PostMarker>) -> Result<Option<PostDetail>> {
        let mut tx = self.pool.begin().await?;

        let Some(record) = query_as::<_, PostSummaryRecord>(&format!(
            "{POST_SUMMARY_SELECT} WHERE posts.post_id = $1"
        ))
        .bind(post_id.uuid())
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let likes = query_as::<_, LikeRecord>(
            "
            SELECT user_id, post_id, created_at
            FROM blog.likes
            WHERE post_id = $1
            ORDER BY created_at, user_id
            ",
        )
        .bind(post_id.uuid())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let summary = PostSummary::try_from(record)?;
        let likes: Vec<Like> = likes.into_iter().map(Like::from).collect();

        Ok(Some(PostDetail {
            post: summary.post,
            author: summary.author,
            count: PostCounts {
                likes: likes.len() as u64,
            },
            likes,
        }))
    }

    #[instrument(skip_all, fields(author_id = %post.author_id))]
    async fn create_post(&self, post: &CreatePost) -> Result<Post> {
        let post_id = Id::<PostMarker>::generate();

        let record = query_as::<_, PostRecord>(
            "
            INSERT INTO blog.posts (post_id, title, content, featured_img, author_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING post_id, title, content, featured_img, author_id, created_at, updated_at
            ",
        )
        .bind(post_id.uuid())
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.featured_img.as_ref().map(|url| url.get()))
        .bind(post.author_id.uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        debug!(%post_id, "Inserted post");
        Ok(record.try_into()?)
    }

    async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        changes: &PostChanges,
    ) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            UPDATE blog.posts
            SET
                title = COALESCE($2, title),
                content = COALESCE($3, content),
                featured_img = COALESCE($4, featured_img),
                updated_at = now()
            WHERE post_id = $1
            RETURNING post_id, title, content, featured_img, author_id, created_at, updated_at
            ",
        )
        .bind(post_id.uuid())
        .bind(changes.title.as_deref())
        .bind(changes.content.as_deref())
        .bind(changes.featured_img.as_ref().map(|url| url.get()))
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(
            "
            DELETE FROM blog.posts
            WHERE post_id = $1
            RETURNING post_id, title, content, featured_img, author_id, created_at, updated_at
            ",
        )
        .bind(post_id.uuid())
        .fetch_optional(&self.pool)
        .await?;

        let post = record.map(Post::try_from).transpose()?;
        Ok(post)
    }

    #[instrument(skip(self))]
    async fn toggle_like(
        &self,
        user_id: Id<UserMarker>,
        post_id: Id<PostMarker>,
    ) -> Result<Option<LikeOutcome>> {
        let mut tx = self.pool.begin().await?;

        let post_exists: bool =
            query_scalar("SELECT EXISTS (SELECT 1 FROM blog.posts WHERE post_id = $1)")
                .bind(post_id.uuid())
                .fetch_one(&mut *tx)
                .await?;
        if !post_exists {
            return Ok(None);
        }

        let toggle = if Self::delete_like(&mut *tx, user_id, post_id).await? {
            LikeToggle::Unliked
        } else {
            // A concurrent toggle may insert between our delete and insert.
            // The insert then waits for it and does nothing, and we finish
            // as an unlike of the row it committed.
            let inserted = query_as::<_, LikeRecord>(
                "
                INSERT INTO blog.likes (user_id, post_id)
                VALUES ($1, $2)
                ON CONFLICT ON CONSTRAINT likes_pkey DO NOTHING
                RETURNING user_id, post_id, created_at
                ",
            )
            .bind(user_id.uuid())
            .bind(post_id.uuid())
            .fetch_optional(&mut *tx)
            .await;

            match inserted {
                Ok(Some(record)) => LikeToggle::Liked(record.into()),
                Ok(None) => {
                    Self::delete_like(&mut *tx, user_id, post_id).await?;
                    LikeToggle::Unliked
                }
                // The post was deleted after our existence check.
                Err(sqlx::Error::Database(db_err))
                    if db_err.constraint() == Some(LIKES_POST_FKEY) =>
                {
                    return Ok(None);
                }
                Err(err) => return Err(classify(err)),
            }
        };

        let likes = Self::count_likes(&mut *tx, post_id).await?;
        tx.commit().await?;

        Ok(Some(LikeOutcome { toggle, likes }))
    }
}
