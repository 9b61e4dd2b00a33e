//! The Christmas dossier: the structured record the remote peer fills in
//! one `update_wishlist` tool invocation at a time.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One partial update delivered by a tool invocation. Every field is
/// optional; absent fields leave the record untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WishlistUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoe_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shirt_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pant_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_snack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_drink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perfume_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hobby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessory_preference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub something_needed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general_interests: Option<String>,
}

impl WishlistUpdate {
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.is_none())
    }

    /// Field label/value pairs in schema order.
    pub fn fields(&self) -> [(&'static str, &Option<String>); 12] {
        [
            ("shoe size", &self.shoe_size),
            ("shirt size", &self.shirt_size),
            ("pant size", &self.pant_size),
            ("favorite color", &self.favorite_color),
            ("favorite snack", &self.favorite_snack),
            ("favorite drink", &self.favorite_drink),
            ("perfume style", &self.perfume_style),
            ("hobby", &self.hobby),
            ("content preference", &self.content_preference),
            ("accessory preference", &self.accessory_preference),
            ("something needed", &self.something_needed),
            ("general interests", &self.general_interests),
        ]
    }
}

/// The accumulated dossier on the caller side. The session core only ever
/// produces partial updates; merging them is the consumer's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WishlistRecord(WishlistUpdate);

impl WishlistRecord {
    /// Fold a partial update into the record, last write wins per field.
    pub fn merge(&mut self, update: WishlistUpdate) {
        macro_rules! take {
            ($($field:ident),+) => {
                $(if update.$field.is_some() { self.0.$field = update.$field; })+
            };
        }
        take!(
            shoe_size,
            shirt_size,
            pant_size,
            favorite_color,
            favorite_snack,
            favorite_drink,
            perfume_style,
            hobby,
            content_preference,
            accessory_preference,
            something_needed,
            general_interests
        );
    }

    /// Collected fields as label/value pairs, skipping empty ones.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        self.0
            .fields()
            .iter()
            .filter_map(|(label, v)| v.as_ref().map(|v| (*label, v.clone())))
            .collect()
    }
}

/// The `update_wishlist` tool declaration sent with the session setup.
pub fn tool_declaration() -> Value {
    json!({
        "name": "update_wishlist",
        "description": "Update the caller's gift dossier. Call whenever the caller mentions a preference.",
        "parameters": {
            "type": "OBJECT",
            "properties": {
                "shoeSize": { "type": "STRING", "description": "Shoe size." },
                "shirtSize": { "type": "STRING", "description": "Shirt or blouse size." },
                "pantSize": { "type": "STRING", "description": "Pant or shorts size." },
                "favoriteColor": { "type": "STRING", "description": "Favorite color." },
                "favoriteSnack": { "type": "STRING", "description": "Favorite snack, sweet, or chocolate." },
                "favoriteDrink": { "type": "STRING", "description": "Favorite drink." },
                "perfumeStyle": { "type": "STRING", "description": "Perfume style or brand." },
                "hobby": { "type": "STRING", "description": "Main hobby." },
                "contentPreference": { "type": "STRING", "description": "Favorite genre of films, books, or games." },
                "accessoryPreference": { "type": "STRING", "description": "Accessories worn (cap, earrings, socks, etc)." },
                "somethingNeeded": { "type": "STRING", "description": "Something useful the caller needs." },
                "generalInterests": { "type": "STRING", "description": "Summary of interests to guide the gift choice." }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names_are_camel_case() {
        let update: WishlistUpdate =
            serde_json::from_value(json!({ "shoeSize": "42", "favoriteColor": "red" })).unwrap();
        assert_eq!(update.shoe_size.as_deref(), Some("42"));
        assert_eq!(update.favorite_color.as_deref(), Some("red"));
        let back = serde_json::to_value(&update).unwrap();
        assert_eq!(back, json!({ "shoeSize": "42", "favoriteColor": "red" }));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let update: WishlistUpdate =
            serde_json::from_value(json!({ "hobby": "fishing", "sleighModel": "X1" })).unwrap();
        assert_eq!(update.hobby.as_deref(), Some("fishing"));
    }

    #[test]
    fn merge_is_last_write_wins_per_field() {
        let mut record = WishlistRecord::default();
        record.merge(WishlistUpdate {
            shoe_size: Some("42".into()),
            hobby: Some("chess".into()),
            ..Default::default()
        });
        record.merge(WishlistUpdate {
            shoe_size: Some("43".into()),
            ..Default::default()
        });
        let entries = record.entries();
        assert_eq!(
            entries,
            vec![("shoe size", "43".to_string()), ("hobby", "chess".to_string())]
        );
    }

    #[test]
    fn schema_declares_all_twelve_fields() {
        let decl = tool_declaration();
        assert_eq!(decl["name"], "update_wishlist");
        let props = decl["parameters"]["properties"].as_object().unwrap();
        assert_eq!(props.len(), 12);
        assert!(props.contains_key("generalInterests"));
    }

    #[test]
    fn empty_update_detection() {
        assert!(WishlistUpdate::default().is_empty());
        let update = WishlistUpdate {
            favorite_drink: Some("cocoa".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
