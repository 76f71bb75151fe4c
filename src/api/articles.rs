//! Articles API.
//!
//! Reads of published articles are public. Everything else needs a signed-in
//! caller, and changes to an existing article need its author or an admin.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{MessageResponse, PageParams};
use super::error::{ApiError, ResultExt};
use super::validation;
use crate::auth::{Auth, AuthenticatedIdentity, OptionalAuth, policy};
use crate::db::{Article, ArticleChanges, Database, NewArticle};

#[derive(Clone)]
pub struct ArticlesState {
    pub db: Database,
}

pub fn router(state: ArticlesState) -> Router {
    Router::new()
        .route("/", get(list_published).post(create_article))
        .route("/search", get(search_articles))
        .route("/mine", get(list_mine))
        .route(
            "/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/{id}/publish", patch(toggle_publish))
        .with_state(state)
}

// --- Request types ---

#[derive(Deserialize, Validate)]
struct ArticleRequest {
    #[serde(deserialize_with = "validation::trimmed")]
    #[validate(
        custom(function = "validation::not_blank"),
        length(max = 255, message = "must be at most 255 characters")
    )]
    title: String,
    #[validate(custom(function = "validation::not_blank"))]
    content: String,
    #[serde(default)]
    published: bool,
    #[validate(custom(function = "validation::tags"))]
    tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    keyword: String,
    page: Option<u32>,
    size: Option<u32>,
}

// --- Helpers ---

fn trimmed_tags(tags: &[String]) -> Vec<String> {
    tags.iter().map(|tag| tag.trim().to_string()).collect()
}

async fn load_article(db: &Database, id: i64) -> Result<Article, ApiError> {
    db.articles()
        .get_by_id(id)
        .await
        .db_err("Failed to get article")?
        .ok_or_else(|| ApiError::not_found(format!("Article {id} not found")))
}

/// Load an article and check the caller may change it.
async fn load_for_change(
    db: &Database,
    id: i64,
    identity: &AuthenticatedIdentity,
) -> Result<Article, ApiError> {
    let article = load_article(db, id).await?;
    policy::require_owner_or_admin(Some(identity), article.author_id)?;
    Ok(article)
}

// --- Handlers ---

async fn create_article(
    State(state): State<ArticlesState>,
    Auth(identity): Auth,
    Json(payload): Json<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let tags = trimmed_tags(payload.tags.as_deref().unwrap_or_default());

    let id = state
        .db
        .articles()
        .create(&NewArticle {
            author_id: identity.id,
            title: &payload.title,
            content: &payload.content,
            published: payload.published,
            tags: &tags,
        })
        .await
        .db_err("Failed to create article")?;

    info!(article_id = id, author = %identity.username, "Article created");

    let article = load_article(&state.db, id).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

async fn list_published(
    State(state): State<ArticlesState>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .articles()
        .list_published(params.into())
        .await
        .db_err("Failed to list articles")?;
    Ok(Json(page))
}

async fn search_articles(
    State(state): State<ArticlesState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .articles()
        .search_published(
            params.keyword.trim(),
            PageParams {
                page: params.page,
                size: params.size,
            }
            .into(),
        )
        .await
        .db_err("Failed to search articles")?;
    Ok(Json(page))
}

async fn list_mine(
    State(state): State<ArticlesState>,
    Auth(identity): Auth,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .articles()
        .list_by_author(identity.id, params.into())
        .await
        .db_err("Failed to list articles")?;
    Ok(Json(page))
}

/// Unpublished articles are only visible to their author and admins; for
/// anyone else they do not exist.
async fn get_article(
    State(state): State<ArticlesState>,
    OptionalAuth(identity): OptionalAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let article = load_article(&state.db, id).await?;
    if !article.published && !policy::is_owner_or_admin(identity.as_ref(), article.author_id) {
        return Err(ApiError::not_found(format!("Article {id} not found")));
    }
    Ok(Json(article))
}

async fn update_article(
    State(state): State<ArticlesState>,
    Auth(identity): Auth,
    Path(id): Path<i64>,
    Json(payload): Json<ArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    load_for_change(&state.db, id, &identity).await?;
    let tags = payload.tags.as_deref().map(trimmed_tags);

    let changes = ArticleChanges {
        title: &payload.title,
        content: &payload.content,
        published: payload.published,
        tags: tags.as_deref(),
    };
    let updated = state
        .db
        .articles()
        .update(id, &changes)
        .await
        .db_err("Failed to update article")?;
    if !updated {
        return Err(ApiError::not_found(format!("Article {id} not found")));
    }

    info!(article_id = id, by = %identity.username, "Article updated");

    Ok(Json(load_article(&state.db, id).await?))
}

async fn toggle_publish(
    State(state): State<ArticlesState>,
    Auth(identity): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    load_for_change(&state.db, id, &identity).await?;

    let toggled = state
        .db
        .articles()
        .toggle_published(id)
        .await
        .db_err("Failed to toggle article")?;
    if !toggled {
        return Err(ApiError::not_found(format!("Article {id} not found")));
    }

    let article = load_article(&state.db, id).await?;
    info!(
        article_id = id,
        published = article.published,
        by = %identity.username,
        "Article publish state changed"
    );
    Ok(Json(article))
}

async fn delete_article(
    State(state): State<ArticlesState>,
    Auth(identity): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    load_for_change(&state.db, id, &identity).await?;

    let deleted = state
        .db
        .articles()
        .delete(id)
        .await
        .db_err("Failed to delete article")?;
    if !deleted {
        return Err(ApiError::not_found(format!("Article {id} not found")));
    }

    info!(article_id = id, by = %identity.username, "Article deleted");
    Ok(Json(MessageResponse::new("Article deleted")))
}
