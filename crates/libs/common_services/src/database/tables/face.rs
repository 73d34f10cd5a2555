use crate::database::DbError;
use crate::database::person::Person;
use chrono::{DateTime, Utc};
use common_types::{BoundingBox, Embedding};
use pgvector::Vector;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// Raw shape of a row in the 'face' table.
#[derive(Debug, FromRow, Clone)]
pub struct FaceRow {
    pub id: i64,
    pub photo_id: i64,
    pub person_id: Option<i64>,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub embedding: Vector,
    pub created_at: DateTime<Utc>,
}

/// One detected face instance inside exactly one photo.
#[derive(Debug, Serialize, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Face {
    pub id: i64,
    pub photo_id: i64,
    pub person_id: Option<i64>,
    pub bounding_box: BoundingBox,
    pub confidence: f32,
    #[serde(skip)]
    pub embedding: Embedding,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<FaceRow> for Face {
    type Error = DbError;

    fn try_from(row: FaceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            photo_id: row.photo_id,
            person_id: row.person_id,
            bounding_box: BoundingBox {
                x1: row.x1,
                y1: row.y1,
                x2: row.x2,
                y2: row.y2,
            },
            confidence: row.confidence,
            embedding: Embedding::from_unit(row.embedding.to_vec())?,
            created_at: row.created_at,
        })
    }
}

/// A face that has not been written yet. Its photo id is assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFace {
    pub person_id: Option<i64>,
    pub bounding_box: BoundingBox,
    pub embedding: Embedding,
    pub confidence: f32,
}

/// The nearest known person for an embedding, and how far away they are.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonMatch {
    pub person: Person,
    pub distance: f32,
}
