//! Demo admin write routes, each wrapped with an invalidation.
//!
//! An in-memory [`AdminStore`] stands in for the site's database.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, post, put};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tagcast_core::Tag;
use tagcast_core::tag::kinds;
use tagcast_server::{Broadcaster, with_invalidation};

/// Toast shown after a category is created.
pub const CATEGORY_CREATED: &str = "Категория создана";
/// Toast shown after a hero slide is edited.
pub const HERO_UPDATED: &str = "Слайд обновлён";

/// A news category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NewsCategory {
    /// Sequential id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A landing-page hero slide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroSlide {
    /// Headline.
    pub title: String,
    /// Optional second line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
}

/// `POST /api/admin/news-categories` body.
#[derive(Debug, Deserialize)]
pub struct NewCategory {
    /// Category name. Must not be blank.
    #[serde(default)]
    pub name: String,
}

/// In-memory admin data.
#[derive(Default)]
pub struct AdminStore {
    categories: RwLock<Vec<NewsCategory>>,
    heroes: RwLock<BTreeMap<String, HeroSlide>>,
    quotes: RwLock<BTreeMap<String, String>>,
}

impl AdminStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with two hero slides (`h1`, `h2`) and two quotes (`q1`, `q2`).
    pub fn seeded() -> Self {
        let store = Self::new();
        for (id, title) in [("h1", "Весенняя коллекция"), ("h2", "Новые рецепты")] {
            let _ = store.heroes.write().insert(
                id.to_owned(),
                HeroSlide {
                    title: title.to_owned(),
                    subtitle: None,
                },
            );
        }
        for (id, company) in [("q1", "ООО Ромашка"), ("q2", "ИП Сидоров")] {
            let _ = store.quotes.write().insert(id.to_owned(), company.to_owned());
        }
        store
    }

    /// All categories in creation order.
    pub fn categories(&self) -> Vec<NewsCategory> {
        self.categories.read().clone()
    }

    /// Hero slide by id.
    pub fn hero(&self, id: &str) -> Option<HeroSlide> {
        self.heroes.read().get(id).cloned()
    }

    /// Whether a quote exists.
    pub fn has_quote(&self, id: &str) -> bool {
        self.quotes.read().contains_key(id)
    }
}

/// Create a category. 400 on a blank name.
pub async fn create_category(input: NewCategory, store: Arc<AdminStore>) -> Response {
    let name = input.name.trim();
    if name.is_empty() {
        return error(StatusCode::BAD_REQUEST, "name is required");
    }
    let category = {
        let mut categories = store.categories.write();
        let category = NewsCategory {
            id: (categories.len() + 1).to_string(),
            name: name.to_owned(),
        };
        categories.push(category.clone());
        category
    };
    (StatusCode::CREATED, Json(category)).into_response()
}

/// Replace a hero slide. 404 if the id is unknown.
pub async fn update_hero(input: HeroSlide, (store, id): (Arc<AdminStore>, String)) -> Response {
    let mut heroes = store.heroes.write();
    let Some(slide) = heroes.get_mut(&id) else {
        return error(StatusCode::NOT_FOUND, "hero slide not found");
    };
    *slide = input;
    Json(slide.clone()).into_response()
}

/// Delete a quote. 404 if the id is unknown.
pub async fn delete_quote(id: String, store: Arc<AdminStore>) -> StatusCode {
    if store.quotes.write().remove(&id).is_some() {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

#[derive(Clone)]
struct AdminState {
    store: Arc<AdminStore>,
    broadcaster: Arc<dyn Broadcaster>,
}

/// Admin routes over `store`, publishing through `broadcaster`.
pub fn admin_router(store: Arc<AdminStore>, broadcaster: Arc<dyn Broadcaster>) -> Router {
    Router::new()
        .route("/api/admin/news-categories", post(post_category))
        .route("/api/admin/hero/{id}", put(put_hero))
        .route("/api/admin/quotes/{id}", delete(delete_quote_route))
        .with_state(AdminState { store, broadcaster })
}

async fn post_category(State(state): State<AdminState>, Json(input): Json<NewCategory>) -> Response {
    with_invalidation(vec![Tag::list(kinds::NEWS_CATEGORY)], Some(CATEGORY_CREATED))
        .wrap_with(create_category, state.broadcaster)
        .call(input, state.store)
        .await
}

async fn put_hero(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(input): Json<HeroSlide>,
) -> Response {
    let tags = vec![Tag::list(kinds::HERO), Tag::new(kinds::HERO, id.as_str())];
    with_invalidation(tags, Some(HERO_UPDATED))
        .wrap_with(update_hero, state.broadcaster)
        .call(input, (state.store, id))
        .await
}

async fn delete_quote_route(State(state): State<AdminState>, Path(id): Path<String>) -> StatusCode {
    with_invalidation(vec![Tag::list(kinds::ADMIN_QUOTE)], None)
        .wrap_with(delete_quote, state.broadcaster)
        .call(id, state.store)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_category_trims_and_numbers() {
        let store = Arc::new(AdminStore::new());
        let resp = create_category(
            NewCategory {
                name: "  Рецепты ".into(),
            },
            store.clone(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            store.categories(),
            vec![NewsCategory {
                id: "1".into(),
                name: "Рецепты".into()
            }]
        );
    }

    #[tokio::test]
    async fn blank_category_is_rejected() {
        let store = Arc::new(AdminStore::new());
        let resp = create_category(NewCategory { name: " ".into() }, store.clone()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(store.categories().is_empty());
    }

    #[tokio::test]
    async fn update_unknown_hero_is_404() {
        let store = Arc::new(AdminStore::seeded());
        let slide = HeroSlide {
            title: "x".into(),
            subtitle: None,
        };
        let resp = update_hero(slide, (store, "h9".into())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_quote_once() {
        let store = Arc::new(AdminStore::seeded());
        assert_eq!(delete_quote("q1".into(), store.clone()).await, StatusCode::NO_CONTENT);
        assert_eq!(delete_quote("q1".into(), store.clone()).await, StatusCode::NOT_FOUND);
        assert!(!store.has_quote("q1"));
        assert!(store.has_quote("q2"));
    }
}
