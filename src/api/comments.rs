//! Comments API.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::error::{ApiError, ResultExt};
use super::validation;
use super::{MessageResponse, PageParams};
use crate::auth::{Auth, AuthenticatedIdentity, OptionalAuth, policy};
use crate::db::{Article, Comment, Database};

#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
}

pub fn router(state: CommentsState) -> Router {
    Router::new()
        .route("/", post(create_comment))
        .route("/article/{article_id}", get(list_for_article))
        .route("/mine", get(list_mine))
        .route(
            "/{id}",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
        .with_state(state)
}

#[derive(Deserialize, Validate)]
struct CreateCommentRequest {
    #[validate(
        custom(function = "validation::not_blank"),
        length(max = 1000, message = "must be at most 1000 characters")
    )]
    content: String,
    article_id: i64,
    parent_id: Option<i64>,
}

#[derive(Deserialize, Validate)]
struct UpdateCommentRequest {
    #[validate(
        custom(function = "validation::not_blank"),
        length(max = 1000, message = "must be at most 1000 characters")
    )]
    content: String,
}

async fn load_comment(db: &Database, id: i64) -> Result<Comment, ApiError> {
    db.comments()
        .get_by_id(id)
        .await
        .db_err("Failed to get comment")?
        .ok_or_else(|| ApiError::not_found(format!("Comment {id} not found")))
}

/// The article a comment hangs off, as seen by `identity`. Drafts read as
/// missing to everyone but their author and admins.
async fn visible_article(
    db: &Database,
    id: i64,
    identity: Option<&AuthenticatedIdentity>,
) -> Result<Article, ApiError> {
    let article = db
        .articles()
        .get_by_id(id)
        .await
        .db_err("Failed to get article")?
        .filter(|article| article.published || policy::is_owner_or_admin(identity, article.author_id))
        .ok_or_else(|| ApiError::not_found(format!("Article {id} not found")))?;
    Ok(article)
}

async fn create_comment(
    State(state): State<CommentsState>,
    Auth(identity): Auth,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;

    // Drafts cannot be commented on, not even by their author.
    let article = state
        .db
        .articles()
        .get_by_id(payload.article_id)
        .await
        .db_err("Failed to get article")?
        .filter(|article| article.published)
        .ok_or_else(|| {
            ApiError::not_found(format!("Article {} not found", payload.article_id))
        })?;

    if let Some(parent_id) = payload.parent_id {
        let parent = state
            .db
            .comments()
            .get_by_id(parent_id)
            .await
            .db_err("Failed to get parent comment")?;
        if parent.is_none_or(|parent| parent.article_id != article.id) {
            return Err(ApiError::not_found(format!(
                "Parent comment {parent_id} not found"
            )));
        }
    }

    let id = state
        .db
        .comments()
        .create(article.id, identity.id, payload.parent_id, &payload.content)
        .await
        .db_err("Failed to create comment")?;

    info!(comment_id = id, article_id = article.id, author = %identity.username, "Comment created");

    Ok((StatusCode::CREATED, Json(load_comment(&state.db, id).await?)))
}

async fn list_for_article(
    State(state): State<CommentsState>,
    OptionalAuth(identity): OptionalAuth,
    Path(article_id): Path<i64>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    visible_article(&state.db, article_id, identity.as_ref()).await?;

    let page = state
        .db
        .comments()
        .list_by_article(article_id, params.into())
        .await
        .db_err("Failed to list comments")?;
    Ok(Json(page))
}

async fn list_mine(
    State(state): State<CommentsState>,
    Auth(identity): Auth,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .db
        .comments()
        .list_by_author(identity.id, params.into())
        .await
        .db_err("Failed to list comments")?;
    Ok(Json(page))
}

async fn get_comment(
    State(state): State<CommentsState>,
    OptionalAuth(identity): OptionalAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = load_comment(&state.db, id).await?;
    visible_article(&state.db, comment.article_id, identity.as_ref())
        .await
        .map_err(|_| ApiError::not_found(format!("Comment {id} not found")))?;
    Ok(Json(comment))
}

async fn update_comment(
    State(state): State<CommentsState>,
    Auth(identity): Auth,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate()?;
    let comment = load_comment(&state.db, id).await?;
    policy::require_owner_or_admin(Some(&identity), comment.author_id)?;

    let updated = state
        .db
        .comments()
        .update_content(id, &payload.content)
        .await
        .db_err("Failed to update comment")?;
    if !updated {
        return Err(ApiError::not_found(format!("Comment {id} not found")));
    }

    Ok(Json(load_comment(&state.db, id).await?))
}

async fn delete_comment(
    State(state): State<CommentsState>,
    Auth(identity): Auth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let comment = load_comment(&state.db, id).await?;
    policy::require_owner_or_admin(Some(&identity), comment.author_id)?;

    let deleted = state
        .db
        .comments()
        .delete(id)
        .await
        .db_err("Failed to delete comment")?;
    if !deleted {
        return Err(ApiError::not_found(format!("Comment {id} not found")));
    }

    info!(comment_id = id, by = %identity.username, "Comment deleted");
    Ok(Json(MessageResponse::new("Comment deleted")))
}
