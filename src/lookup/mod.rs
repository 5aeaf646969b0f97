//! Crew lookup read path.
//!
//! Stateless read API beside the routing pipeline: returns the crew records
//! for a movie, optionally narrowed to one role. It shares nothing with the
//! router beyond the crate's error and logging conventions.
//!
//! | Request                         | Status | Body                         |
//! |---------------------------------|--------|------------------------------|
//! | missing / non-numeric movie id  | 400    | `{"message": ...}`           |
//! | no role filter                  | 200    | array of all crew records    |
//! | role filter, one match          | 200    | single object                |
//! | role filter, several matches    | 200    | array                        |
//! | role filter, no match           | 404    | `{"message": ...}`           |
//! | store failure                   | 500    | `{"message": ...}`           |
//!
//! Role comparison is case-insensitive.

use std::collections::HashMap;

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error};

/// Errors from the crew store collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Crew store unavailable: {0}")]
    Unavailable(String),
}

/// One crew record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrewMember {
    pub movie_id: u64,
    pub role: String,
    pub names: String,
}

/// Storage collaborator for crew records.
#[async_trait]
pub trait CrewStore: Send + Sync {
    async fn crew_for_movie(&self, movie_id: u64) -> Result<Vec<CrewMember>, StoreError>;
}

/// In-memory crew store.
#[derive(Default)]
pub struct MemoryCrewStore {
    crew: RwLock<HashMap<u64, Vec<CrewMember>>>,
}

impl MemoryCrewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store.
    pub async fn insert(&self, member: CrewMember) {
        self.crew
            .write()
            .await
            .entry(member.movie_id)
            .or_default()
            .push(member);
    }
}

#[async_trait]
impl CrewStore for MemoryCrewStore {
    async fn crew_for_movie(&self, movie_id: u64) -> Result<Vec<CrewMember>, StoreError> {
        Ok(self
            .crew
            .read()
            .await
            .get(&movie_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Raw request parameters, as extracted from the path and query string.
#[derive(Debug, Clone, Default)]
pub struct LookupRequest {
    pub movie_id: Option<String>,
    pub role: Option<String>,
}

impl LookupRequest {
    pub fn movie(movie_id: impl Into<String>) -> Self {
        Self {
            movie_id: Some(movie_id.into()),
            role: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl LookupResponse {
    fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }
}

/// Look up crew for a movie, optionally filtered by role.
pub async fn lookup_crew(store: &dyn CrewStore, request: &LookupRequest) -> LookupResponse {
    let Some(raw_id) = request.movie_id.as_deref().filter(|id| !id.is_empty()) else {
        return LookupResponse::message(
            StatusCode::BAD_REQUEST,
            "movieId path parameter is required",
        );
    };
    let Ok(movie_id) = raw_id.parse::<u64>() else {
        return LookupResponse::message(StatusCode::BAD_REQUEST, "movieId must be a number");
    };

    let crew = match store.crew_for_movie(movie_id).await {
        Ok(crew) => crew,
        Err(e) => {
            error!(movie_id, error = %e, "Crew lookup failed");
            return LookupResponse::message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let role = request.role.as_deref().filter(|r| !r.is_empty());
    let Some(role) = role else {
        debug!(movie_id, count = crew.len(), "Crew lookup");
        return LookupResponse::ok(json!(crew));
    };

    let mut matches: Vec<CrewMember> = crew
        .into_iter()
        .filter(|m| m.role.eq_ignore_ascii_case(role))
        .collect();
    debug!(movie_id, role, count = matches.len(), "Crew lookup by role");

    match matches.len() {
        0 => LookupResponse::message(
            StatusCode::NOT_FOUND,
            format!("No {} found for movie {}", role, movie_id),
        ),
        1 => LookupResponse::ok(json!(matches.remove(0))),
        _ => LookupResponse::ok(json!(matches)),
    }
}
