use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;

/// Represents a task entity as stored in the database and returned by the API.
/// Every task belongs to exactly one user; the `author` reference is set at
/// creation and never changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    /// What there is to do. Stored trimmed of surrounding whitespace.
    pub description: String,
    /// Whether the task is done. Defaults to `false`.
    pub completed: bool,
    /// Identifier of the owning user.
    pub author: Uuid,
    /// Timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the task.
    pub updated_at: DateTime<Utc>,
}

/// Input structure for creating a task.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TaskInput {
    #[validate(custom = "crate::models::validate_not_blank")]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

/// PATCH payload for a task. Only `description` and `completed` may change;
/// any other field fails deserialization.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TaskUpdate {
    #[validate(custom = "crate::models::validate_not_blank")]
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Query parameters for listing tasks. Ownership scoping is not part of this
/// struct on purpose: the author always comes from the authenticated session
/// and cannot be overridden by the query string.
#[derive(Debug, Deserialize, Validate)]
pub struct TaskFilter {
    /// Keep only tasks with this completion state.
    pub completed: Option<bool>,
    /// `field:asc` or `field:desc` over the fields named in [`SortSpec`].
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    /// Maximum number of tasks to return.
    #[validate(range(min = 0))]
    pub limit: Option<i64>,
    /// Number of tasks to skip, after filtering and sorting.
    #[validate(range(min = 0))]
    pub skip: Option<i64>,
}

lazy_static! {
    static ref SORT_RE: regex::Regex =
        regex::Regex::new(r"^([A-Za-z]+):(asc|desc)$").unwrap();
}

/// A parsed, whitelisted `sortBy` expression. Parsing maps the wire field
/// names onto column names; anything not in the whitelist is rejected rather
/// than ignored, so a typo never silently changes the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    column: &'static str,
    descending: bool,
}

impl Default for SortSpec {
    /// Insertion order: oldest first.
    fn default() -> Self {
        SortSpec {
            column: "created_at",
            descending: false,
        }
    }
}

impl SortSpec {
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let raw = match raw {
            None => return Ok(Self::default()),
            Some(raw) => raw,
        };

        let caps = SORT_RE
            .captures(raw)
            .ok_or_else(|| sort_error("expected field:asc or field:desc"))?;

        let column = match &caps[1] {
            "description" => "description",
            "completed" => "completed",
            "createdAt" => "created_at",
            "updatedAt" => "updated_at",
            _ => return Err(sort_error("unsupported sort field")),
        };

        Ok(SortSpec {
            column,
            descending: &caps[2] == "desc",
        })
    }

    fn order_clause(&self) -> String {
        format!(
            "{} {}",
            self.column,
            if self.descending { "DESC" } else { "ASC" }
        )
    }
}

fn sort_error(message: &'static str) -> AppError {
    let mut errors = ValidationErrors::new();
    let mut error = ValidationError::new("sort");
    error.message = Some(message.into());
    errors.add("sortBy", error);
    AppError::Validation(errors)
}

const TASK_COLUMNS: &str = "id, description, completed, author, created_at, updated_at";

impl Task {
    /// Creates a new `Task` value from `TaskInput` and the author's id,
    /// trimming the description and stamping both timestamps.
    pub fn new(input: TaskInput, author: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            description: input.description.trim().to_string(),
            completed: input.completed,
            author,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validates and persists a task for `author`.
    pub async fn create(pool: &PgPool, author: Uuid, input: TaskInput) -> Result<Task, AppError> {
        input.validate()?;
        let task = Task::new(input, author);

        let sql = format!(
            "INSERT INTO tasks (id, description, completed, author, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(task.id)
            .bind(&task.description)
            .bind(task.completed)
            .bind(task.author)
            .bind(task.created_at)
            .bind(task.updated_at)
            .fetch_one(pool)
            .await?;

        Ok(task)
    }

    /// Fetches a task by id, but only if `author` owns it. A task owned by
    /// someone else and a task that does not exist are the same `NotFound`.
    pub async fn find_owned(pool: &PgPool, author: Uuid, id: Uuid) -> Result<Task, AppError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE id = $1 AND author = $2",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(author)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))
    }

    /// Builds the ownership-scoped list view: filter, then sort, then
    /// paginate. The `author = $1` predicate is part of the base query and
    /// no query parameter can widen it.
    pub async fn list(
        pool: &PgPool,
        author: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, AppError> {
        filter.validate()?;
        let sort = SortSpec::parse(filter.sort_by.as_deref())?;

        let mut sql = format!(
            "SELECT {} FROM tasks WHERE author = $1",
            TASK_COLUMNS
        );
        let mut param = 1;

        if filter.completed.is_some() {
            param += 1;
            sql.push_str(&format!(" AND completed = ${}", param));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(&sort.order_clause());

        if filter.limit.is_some() {
            param += 1;
            sql.push_str(&format!(" LIMIT ${}", param));
        }
        if filter.skip.is_some() {
            param += 1;
            sql.push_str(&format!(" OFFSET ${}", param));
        }

        let mut query = sqlx::query_as::<_, Task>(&sql).bind(author);
        if let Some(completed) = filter.completed {
            query = query.bind(completed);
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit);
        }
        if let Some(skip) = filter.skip {
            query = query.bind(skip);
        }

        Ok(query.fetch_all(pool).await?)
    }

    /// Applies a patch to this task and persists it, refreshing `updated_at`.
    pub async fn apply_update(
        &mut self,
        pool: &PgPool,
        update: TaskUpdate,
    ) -> Result<(), AppError> {
        update.validate()?;

        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        self.updated_at = Utc::now();

        sqlx::query(
            "UPDATE tasks SET description = $1, completed = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(&self.description)
        .bind(self.completed)
        .bind(self.updated_at)
        .bind(self.id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Deletes a task by id under the same ownership rule as `find_owned`,
    /// returning the deleted row.
    pub async fn delete_owned(pool: &PgPool, author: Uuid, id: Uuid) -> Result<Task, AppError> {
        let sql = format!(
            "DELETE FROM tasks WHERE id = $1 AND author = $2 RETURNING {}",
            TASK_COLUMNS
        );
        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(author)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Task not found".into()))
    }
}
