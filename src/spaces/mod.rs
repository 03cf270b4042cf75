//! Space directory
//!
//! Stores spaces, the element catalog and static element placement. Serves
//! as the presence engine's [`SpaceDirectory`].

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sqlx::sqlite::SqlitePool;
use thiserror::Error;
use tracing::info;

use crate::presence::{
    Bounds, Element, PlacedElement, Position, PresenceError, SpaceDirectory, SpaceLayout,
};

/// Largest accepted width or height
pub const MAX_DIMENSION: i64 = 10_000;

static DIMENSIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,9})x(\d{1,9})$").expect("valid dimensions regex"));

#[derive(Debug, Error)]
pub enum SpaceError {
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("space not found")]
    SpaceNotFound,

    #[error("element not found")]
    ElementNotFound,

    #[error("element does not fit inside the space")]
    OutOfBounds,

    #[error("not the owner of this space")]
    Forbidden,

    #[error("invalid element: {0}")]
    InvalidElement(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Parse a `"<width>x<height>"` dimension string
pub fn parse_dimensions(s: &str) -> Result<Bounds, SpaceError> {
    let caps = DIMENSIONS_RE
        .captures(s.trim())
        .ok_or_else(|| SpaceError::InvalidDimensions(s.to_string()))?;

    let width: i64 = caps[1]
        .parse()
        .map_err(|_| SpaceError::InvalidDimensions(s.to_string()))?;
    let height: i64 = caps[2]
        .parse()
        .map_err(|_| SpaceError::InvalidDimensions(s.to_string()))?;

    if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
        return Err(SpaceError::InvalidDimensions(s.to_string()));
    }
    Ok(Bounds::new(width, height))
}

/// A stored space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Space {
    pub id: String,
    pub name: String,
    pub bounds: Bounds,
    pub owner_id: String,
    pub created_at: String,
}

impl Space {
    /// Dimension string in `"<width>x<height>"` form
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.bounds.width, self.bounds.height)
    }
}

type SpaceRow = (String, String, i64, i64, String, String);

fn space_from_row((id, name, width, height, owner_id, created_at): SpaceRow) -> Space {
    Space {
        id,
        name,
        bounds: Bounds::new(width, height),
        owner_id,
        created_at,
    }
}

/// SQLite-backed store for spaces and elements
#[derive(Clone)]
pub struct SpaceStore {
    pool: SqlitePool,
}

impl SpaceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_space(
        &self,
        owner_id: &str,
        name: &str,
        dimensions: &str,
    ) -> Result<Space, SpaceError> {
        let bounds = parse_dimensions(dimensions)?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO spaces (id, name, width, height, owner_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(bounds.width)
        .bind(bounds.height)
        .bind(owner_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        info!("Created space {} ({}x{})", id, bounds.width, bounds.height);

        Ok(Space {
            id,
            name: name.to_string(),
            bounds,
            owner_id: owner_id.to_string(),
            created_at: now,
        })
    }

    pub async fn get_space(&self, id: &str) -> Result<Option<Space>, SpaceError> {
        let row: Option<SpaceRow> = sqlx::query_as(
            "SELECT id, name, width, height, owner_id, created_at FROM spaces WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(space_from_row))
    }

    /// Spaces owned by an account, oldest first
    pub async fn list_spaces(&self, owner_id: &str) -> Result<Vec<Space>, SpaceError> {
        let rows: Vec<SpaceRow> = sqlx::query_as(
            "SELECT id, name, width, height, owner_id, created_at FROM spaces
             WHERE owner_id = ? ORDER BY created_at, id",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(space_from_row).collect())
    }

    /// Delete a space and its placed elements. Only the owner may do this.
    pub async fn delete_space(&self, id: &str, requester_id: &str) -> Result<(), SpaceError> {
        let space = self.get_space(id).await?.ok_or(SpaceError::SpaceNotFound)?;
        if space.owner_id != requester_id {
            return Err(SpaceError::Forbidden);
        }

        sqlx::query("DELETE FROM spaces WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!("Deleted space {}", id);
        Ok(())
    }

    /// Add an element to the catalog
    pub async fn create_element(
        &self,
        image_url: &str,
        width: i64,
        height: i64,
        is_static: bool,
    ) -> Result<Element, SpaceError> {
        if image_url.trim().is_empty() {
            return Err(SpaceError::InvalidElement("imageUrl is required".into()));
        }
        if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
            return Err(SpaceError::InvalidElement(format!(
                "width and height must be between 1 and {}",
                MAX_DIMENSION
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO elements (id, image_url, width, height, static) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(image_url)
        .bind(width)
        .bind(height)
        .bind(is_static)
        .execute(&self.pool)
        .await?;

        Ok(Element {
            id,
            image_url: image_url.to_string(),
            width,
            height,
            is_static,
        })
    }

    pub async fn get_element(&self, id: &str) -> Result<Option<Element>, SpaceError> {
        let row: Option<(String, String, i64, i64, bool)> = sqlx::query_as(
            "SELECT id, image_url, width, height, static FROM elements WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, image_url, width, height, is_static)| Element {
            id,
            image_url,
            width,
            height,
            is_static,
        }))
    }

    /// Place a catalog element in a space. The whole footprint must fit.
    pub async fn place_element(
        &self,
        requester_id: &str,
        space_id: &str,
        element_id: &str,
        position: Position,
    ) -> Result<PlacedElement, SpaceError> {
        let space = self
            .get_space(space_id)
            .await?
            .ok_or(SpaceError::SpaceNotFound)?;
        if space.owner_id != requester_id {
            return Err(SpaceError::Forbidden);
        }

        let element = self
            .get_element(element_id)
            .await?
            .ok_or(SpaceError::ElementNotFound)?;

        if !space.bounds.contains(position) {
            return Err(SpaceError::OutOfBounds);
        }
        let far_corner = position
            .x
            .checked_add(element.width - 1)
            .zip(position.y.checked_add(element.height - 1))
            .map(|(x, y)| Position::new(x, y))
            .ok_or(SpaceError::OutOfBounds)?;
        if !space.bounds.contains(far_corner) {
            return Err(SpaceError::OutOfBounds);
        }

        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO space_elements (id, space_id, element_id, x, y) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(space_id)
        .bind(element_id)
        .bind(position.x)
        .bind(position.y)
        .execute(&self.pool)
        .await?;

        Ok(PlacedElement {
            id,
            element,
            position,
        })
    }

    pub async fn space_elements(&self, space_id: &str) -> Result<Vec<PlacedElement>, SpaceError> {
        let rows: Vec<(String, i64, i64, String, String, i64, i64, bool)> = sqlx::query_as(
            "SELECT se.id, se.x, se.y, e.id, e.image_url, e.width, e.height, e.static
             FROM space_elements se JOIN elements e ON e.id = se.element_id
             WHERE se.space_id = ? ORDER BY se.rowid",
        )
        .bind(space_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, x, y, element_id, image_url, width, height, is_static)| PlacedElement {
                    id,
                    element: Element {
                        id: element_id,
                        image_url,
                        width,
                        height,
                        is_static,
                    },
                    position: Position::new(x, y),
                },
            )
            .collect())
    }

    /// Geometry and static layout of a space
    pub async fn layout(&self, space_id: &str) -> Result<Option<SpaceLayout>, SpaceError> {
        let Some(space) = self.get_space(space_id).await? else {
            return Ok(None);
        };
        let elements = self.space_elements(space_id).await?;
        Ok(Some(SpaceLayout {
            bounds: space.bounds,
            elements,
        }))
    }
}

#[async_trait]
impl SpaceDirectory for SpaceStore {
    async fn get_space(&self, space_id: &str) -> Result<Option<SpaceLayout>, PresenceError> {
        self.layout(space_id)
            .await
            .map_err(|e| PresenceError::Backend(e.to_string()))
    }
}
