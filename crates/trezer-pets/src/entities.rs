//! Domain entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pet race.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    /// Race identifier.
    pub id: Uuid,
    /// Race name, empty when only the id is known.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// A pet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    /// Pet identifier (UUID v7 when generated).
    pub id: Uuid,
    /// Pet name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Race of the pet.
    #[serde(default)]
    pub race: Race,
}

impl Pet {
    /// A pet of a race known by id only.
    pub fn new(id: Uuid, name: impl Into<String>, race_id: Uuid) -> Self {
        Self {
            id,
            name: name.into(),
            race: Race {
                id: race_id,
                name: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pet_json_shape() {
        let pet = Pet {
            id: Uuid::parse_str("752cd6644267493eb8311d4587abf5b3").unwrap(),
            name: "bang".to_string(),
            race: Race {
                id: Uuid::parse_str("752cd6644267493eb8311d4587abf000").unwrap(),
                name: "hbzf".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_string(&pet).unwrap(),
            r#"{"id":"752cd664-4267-493e-b831-1d4587abf5b3","name":"bang","race":{"id":"752cd664-4267-493e-b831-1d4587abf000","name":"hbzf"}}"#
        );
    }

    #[test]
    fn test_pet_without_race_decodes() {
        let pet: Pet =
            serde_json::from_value(json!({"id": "752cd664-4267-493e-b831-1d4587abf5b3", "name": "bang"}))
                .unwrap();
        assert_eq!(pet.race, Race::default());
    }
}
