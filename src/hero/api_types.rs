//! Serde-deserializable types matching the heroes API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;

use super::types::Hero;

// ============================================================================
// Hero payload
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiHero {
  pub id: i64,
  pub name: String,
  #[serde(default)]
  pub image: String,
  #[serde(default)]
  pub about: String,
  #[serde(default)]
  pub rating: f64,
  #[serde(default)]
  pub power: i64,
  #[serde(default)]
  pub month: String,
  #[serde(default)]
  pub day: String,
  #[serde(default)]
  pub family: Vec<String>,
  #[serde(default)]
  pub abilities: Vec<String>,
  #[serde(rename = "natureTypes", default)]
  pub nature_types: Vec<String>,
}

// ============================================================================
// List and search endpoints share one envelope
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiHeroesResponse {
  pub success: bool,
  pub message: Option<String>,
  #[serde(rename = "prevPage")]
  pub prev_page: Option<u32>,
  #[serde(rename = "nextPage")]
  pub next_page: Option<u32>,
  #[serde(default)]
  pub heroes: Vec<ApiHero>,
  #[serde(rename = "lastUpdated")]
  pub last_updated: Option<i64>,
}

impl ApiHeroesResponse {
  /// The server reports the final page by omitting `nextPage`.
  pub fn is_last(&self) -> bool {
    self.next_page.is_none()
  }
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiHero> for Hero {
  fn from(h: ApiHero) -> Self {
    Hero {
      id: h.id,
      name: h.name,
      image: h.image,
      about: h.about,
      rating: h.rating,
      power: h.power,
      month: h.month,
      day: h.day,
      family: h.family,
      abilities: h.abilities,
      nature_types: h.nature_types,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PAGE: &str = r#"{
    "success": true,
    "message": "ok",
    "prevPage": null,
    "nextPage": 2,
    "heroes": [
      {
        "id": 1,
        "name": "Sasuke",
        "image": "/images/sasuke.jpg",
        "about": "Sasuke Uchiha is one of the last surviving members",
        "rating": 5.0,
        "power": 98,
        "month": "July",
        "day": "23rd",
        "family": ["Fugaku", "Mikoto", "Itachi"],
        "abilities": ["Sharingan", "Rinnegan"],
        "natureTypes": ["Lightning", "Fire"]
      }
    ],
    "lastUpdated": 1640995200000
  }"#;

  #[test]
  fn test_decode_page() {
    let resp: ApiHeroesResponse = serde_json::from_str(PAGE).unwrap();
    assert!(resp.success);
    assert!(!resp.is_last());
    assert_eq!(resp.prev_page, None);

    let hero: Hero = resp.heroes.into_iter().next().unwrap().into();
    assert_eq!(hero.id, 1);
    assert_eq!(hero.name, "Sasuke");
    assert_eq!(hero.nature_types, vec!["Lightning", "Fire"]);
    assert_eq!(hero.family.len(), 3);
  }

  #[test]
  fn test_missing_next_page_is_last() {
    let resp: ApiHeroesResponse =
      serde_json::from_str(r#"{"success": true, "prevPage": 4, "heroes": []}"#).unwrap();
    assert!(resp.is_last());
    assert!(resp.heroes.is_empty());
  }

  #[test]
  fn test_optional_hero_fields_default() {
    let hero: ApiHero = serde_json::from_str(r#"{"id": 9, "name": "Boruto"}"#).unwrap();
    let hero = Hero::from(hero);
    assert_eq!(hero.rating, 0.0);
    assert!(hero.abilities.is_empty());
  }
}
