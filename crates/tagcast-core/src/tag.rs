//! Invalidation tags.
//!
//! A [`Tag`] names a cached query target as an `(entity type, id)` pair.
//! The id is either a concrete entity identifier or the literal [`LIST`],
//! which by convention means "any list view over this entity type".
//!
//! `LIST` is only a convention. Tags compare by plain structural equality,
//! so an entity whose real id happens to be `"LIST"` is indistinguishable
//! from the sentinel. Matching is left to the client cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel id meaning "every list view of this entity type".
pub const LIST: &str = "LIST";

/// Entity type names used by the site's write routes.
///
/// Tags accept any string as a type; these exist so callers don't misspell
/// the common ones.
pub mod kinds {
    /// Hero slides on the landing page.
    pub const HERO: &str = "Hero";
    /// News articles.
    pub const NEWS: &str = "News";
    /// News categories.
    pub const NEWS_CATEGORY: &str = "NewsCategory";
    /// Recipes.
    pub const RECIPE: &str = "Recipe";
    /// Recipe categories.
    pub const RECIPE_CATEGORY: &str = "RecipeCategory";
    /// Catalog products.
    pub const PRODUCT: &str = "Product";
    /// Site themes.
    pub const THEME: &str = "Theme";
    /// Newsletter subscribers.
    pub const SUBSCRIBER: &str = "Subscriber";
    /// B2B quote requests shown in the admin panel.
    pub const ADMIN_QUOTE: &str = "AdminQuote";
}

/// An invalidation target: entity type plus id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    /// Entity category, e.g. `"Hero"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Concrete entity id or [`LIST`].
    pub id: String,
}

impl Tag {
    /// Build a tag from a type and id.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Build the list tag for an entity type.
    pub fn list(kind: impl Into<String>) -> Self {
        Self::new(kind, LIST)
    }

    /// Whether the id is the `LIST` sentinel.
    pub fn is_list(&self) -> bool {
        self.id == LIST
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_tag_uses_sentinel() {
        let tag = Tag::list(kinds::HERO);
        assert_eq!(tag.kind, "Hero");
        assert_eq!(tag.id, "LIST");
        assert!(tag.is_list());
    }

    #[test]
    fn concrete_tag_is_not_list() {
        let tag = Tag::new(kinds::ADMIN_QUOTE, "q1");
        assert!(!tag.is_list());
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Tag::new("Hero", "1"), Tag::new("Hero", "1"));
        assert_ne!(Tag::new("Hero", "1"), Tag::new("Hero", "2"));
        assert_ne!(Tag::new("Hero", "1"), Tag::new("News", "1"));
    }

    #[test]
    fn entity_named_list_collides_with_sentinel() {
        // Real id "LIST" is indistinguishable from the sentinel.
        assert_eq!(Tag::new("Product", "LIST"), Tag::list("Product"));
    }

    #[test]
    fn serializes_with_type_key() {
        let json = serde_json::to_value(Tag::list("NewsCategory")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "NewsCategory", "id": "LIST"}));
    }

    #[test]
    fn deserializes_from_wire_shape() {
        let tag: Tag = serde_json::from_str(r#"{"type":"AdminQuote","id":"q1"}"#).unwrap();
        assert_eq!(tag, Tag::new("AdminQuote", "q1"));
    }

    #[test]
    fn display_joins_with_slash() {
        assert_eq!(Tag::list("Theme").to_string(), "Theme/LIST");
    }
}
