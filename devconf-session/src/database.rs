use crate::{
    CreateRequest, FeedbackRecord, FeedbackRequest, FeedbackStore, FeedbackType, GetRequest,
    ListRequest, SessionStore,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use devconf_core::{Conversation, DevconfError, Message, Result, Role};
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use std::str::FromStr;
use uuid::Uuid;

/// SQLite-backed store. Message order is the autoincrement `seq` column, so
/// reads return messages exactly in append order.
pub struct DatabaseSessionStore {
    pool: SqlitePool,
}

fn db_err(context: &str) -> impl FnOnce(sqlx::Error) -> DevconfError + '_ {
    move |e| DevconfError::Session(format!("{}: {}", context, e))
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DevconfError::Session(format!("invalid timestamp {:?}: {}", value, e)))
}

impl DatabaseSessionStore {
    /// Connect to `database_url` (`sqlite://path.db`, `sqlite::memory:` or `:memory:`).
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err("invalid database url"))?
            .create_if_missing(true);

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            // Every connection to an in-memory database would otherwise see its own copy.
            SqlitePoolOptions::new().max_connections(1).idle_timeout(None).max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(db_err("database connection failed"))?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                app_name TEXT NOT NULL,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err("migration failed"))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_owner \
             ON conversations (app_name, user_id, updated_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err("migration failed"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                role TEXT NOT NULL,
                author TEXT NOT NULL,
                content TEXT NOT NULL,
                thinking TEXT,
                streamed INTEGER NOT NULL DEFAULT 0,
                timestamp TEXT NOT NULL,
                FOREIGN KEY (conversation_id) REFERENCES conversations(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err("migration failed"))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation \
             ON messages (conversation_id, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err("migration failed"))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                feedback_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                conversation_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                feedback_type TEXT NOT NULL,
                comment TEXT,
                predefined_response TEXT,
                source_agent TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, message_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err("migration failed"))?;

        Ok(())
    }

    async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT message_id, role, author, content, thinking, streamed, timestamp \
             FROM messages WHERE conversation_id = ? ORDER BY seq",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("query failed"))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn conversation_from_row(&self, row: &SqliteRow) -> Result<Conversation> {
        let id: String = row.try_get("id").map_err(db_err("decode failed"))?;
        let created_at: String = row.try_get("created_at").map_err(db_err("decode failed"))?;
        let updated_at: String = row.try_get("updated_at").map_err(db_err("decode failed"))?;
        let messages = self.load_messages(&id).await?;

        Ok(Conversation {
            app_name: row.try_get("app_name").map_err(db_err("decode failed"))?,
            user_id: row.try_get("user_id").map_err(db_err("decode failed"))?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            messages,
            id,
        })
    }

    async fn conversation_exists(&self, conversation_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM conversations WHERE id = ?")
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("query failed"))?;
        Ok(row.is_some())
    }
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    let role: String = row.try_get("role").map_err(db_err("decode failed"))?;
    let ts: String = row.try_get("timestamp").map_err(db_err("decode failed"))?;
    Ok(Message {
        role: Role::from_str(&role)?,
        content: row.try_get("content").map_err(db_err("decode failed"))?,
        author: row.try_get("author").map_err(db_err("decode failed"))?,
        message_id: row.try_get("message_id").map_err(db_err("decode failed"))?,
        thinking: row.try_get("thinking").map_err(db_err("decode failed"))?,
        streamed: row.try_get("streamed").map_err(db_err("decode failed"))?,
        timestamp: parse_timestamp(&ts)?,
    })
}

fn feedback_from_row(row: &SqliteRow) -> Result<FeedbackRecord> {
    let feedback_type: String = row.try_get("feedback_type").map_err(db_err("decode failed"))?;
    let created_at: String = row.try_get("created_at").map_err(db_err("decode failed"))?;
    let updated_at: String = row.try_get("updated_at").map_err(db_err("decode failed"))?;
    Ok(FeedbackRecord {
        feedback_id: row.try_get("feedback_id").map_err(db_err("decode failed"))?,
        user_id: row.try_get("user_id").map_err(db_err("decode failed"))?,
        conversation_id: row.try_get("conversation_id").map_err(db_err("decode failed"))?,
        message_id: row.try_get("message_id").map_err(db_err("decode failed"))?,
        feedback_type: FeedbackType::from_str(&feedback_type)?,
        comment: row.try_get("comment").map_err(db_err("decode failed"))?,
        predefined_response: row
            .try_get("predefined_response")
            .map_err(db_err("decode failed"))?,
        source_agent: row.try_get("source_agent").map_err(db_err("decode failed"))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

#[async_trait]
impl SessionStore for DatabaseSessionStore {
    async fn create(&self, req: CreateRequest) -> Result<Conversation> {
        let id = req.conversation_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let conversation = Conversation::new(id, req.app_name, req.user_id);

        let result = sqlx::query(
            "INSERT INTO conversations (id, app_name, user_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(&conversation.app_name)
        .bind(&conversation.user_id)
        .bind(timestamp(conversation.created_at))
        .bind(timestamp(conversation.updated_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(conversation),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                DevconfError::Validation(format!("conversation already exists: {}", conversation.id)),
            ),
            Err(e) => Err(DevconfError::Session(format!("insert failed: {}", e))),
        }
    }

    async fn get(&self, req: GetRequest) -> Result<Conversation> {
        let row = sqlx::query(
            "SELECT id, app_name, user_id, created_at, updated_at FROM conversations \
             WHERE id = ? AND app_name = ? AND user_id = ?",
        )
        .bind(&req.conversation_id)
        .bind(&req.app_name)
        .bind(&req.user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("query failed"))?
        .ok_or_else(|| DevconfError::not_found(format!("conversation {}", req.conversation_id)))?;

        self.conversation_from_row(&row).await
    }

    async fn list(&self, req: ListRequest) -> Result<Vec<Conversation>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = req.limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            "SELECT id, app_name, user_id, created_at, updated_at FROM conversations \
             WHERE app_name = ? AND user_id = ? ORDER BY updated_at DESC LIMIT ?",
        )
        .bind(&req.app_name)
        .bind(&req.user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("query failed"))?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in &rows {
            conversations.push(self.conversation_from_row(row).await?);
        }
        Ok(conversations)
    }

    async fn append(&self, conversation_id: &str, message: Message) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(db_err("transaction failed"))?;

        let updated = sqlx::query(
            "UPDATE conversations SET updated_at = MAX(updated_at, ?) WHERE id = ?",
        )
        .bind(timestamp(message.timestamp))
        .bind(conversation_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err("update failed"))?;

        if updated.rows_affected() == 0 {
            return Err(DevconfError::not_found(format!("conversation {}", conversation_id)));
        }

        sqlx::query(
            "INSERT INTO messages \
             (conversation_id, message_id, role, author, content, thinking, streamed, timestamp) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(&message.message_id)
        .bind(message.role.as_str())
        .bind(&message.author)
        .bind(&message.content)
        .bind(&message.thinking)
        .bind(message.streamed)
        .bind(timestamp(message.timestamp))
        .execute(&mut *tx)
        .await
        .map_err(db_err("insert failed"))?;

        tx.commit().await.map_err(db_err("commit failed"))?;
        Ok(())
    }

    async fn read(&self, conversation_id: &str) -> Result<Vec<Message>> {
        if !self.conversation_exists(conversation_id).await? {
            return Err(DevconfError::not_found(format!("conversation {}", conversation_id)));
        }
        self.load_messages(conversation_id).await
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err("health check failed"))?;
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

#[async_trait]
impl FeedbackStore for DatabaseSessionStore {
    async fn upsert_feedback(&self, req: FeedbackRequest) -> Result<FeedbackRecord> {
        let now = timestamp(Utc::now());

        sqlx::query(
            r#"
            INSERT INTO feedback (
                feedback_id, user_id, conversation_id, message_id, feedback_type,
                comment, predefined_response, source_agent, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (user_id, message_id) DO UPDATE SET
                conversation_id = excluded.conversation_id,
                feedback_type = excluded.feedback_type,
                comment = excluded.comment,
                predefined_response = excluded.predefined_response,
                source_agent = excluded.source_agent,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&req.user_id)
        .bind(&req.conversation_id)
        .bind(&req.message_id)
        .bind(req.feedback_type.as_str())
        .bind(&req.comment)
        .bind(&req.predefined_response)
        .bind(&req.source_agent)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(db_err("feedback upsert failed"))?;

        self.get_feedback(&req.user_id, &req.message_id).await?.ok_or_else(|| {
            DevconfError::Session(format!("feedback for message {} vanished", req.message_id))
        })
    }

    async fn get_feedback(
        &self,
        user_id: &str,
        message_id: &str,
    ) -> Result<Option<FeedbackRecord>> {
        let row = sqlx::query("SELECT * FROM feedback WHERE user_id = ? AND message_id = ?")
            .bind(user_id)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("query failed"))?;

        row.as_ref().map(feedback_from_row).transpose()
    }
}
