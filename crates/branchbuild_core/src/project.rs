//! # Project Schema
//!
//! The designer-authored document the engine runs against:
//!
//! ```text
//! Project
//! ├── points[]            currencies with starting balances
//! └── pages[]
//!     └── layout[]        mixed elements, tagged by "type"
//!         ├── group       rules + member items
//!         └── item        standalone item
//! ```
//!
//! Display fields the engine never reads (coordinates, images, styling) are
//! kept in each node's `extra` map so a load/save round trip is lossless.

use std::path::Path;

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::effect::EffectDeclaration;
use crate::error::{ModelError, ModelResult};
use crate::lenient;

/// Unique identifier for an item.
pub type ItemId = String;

/// Unique identifier for a group.
pub type GroupId = String;

/// Unique identifier for a currency ("point" type).
pub type CurrencyId = String;

/// A complete project: currencies plus the page tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Title and authoring metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ProjectMeta>,
    /// Currencies, in display order.
    #[serde(default)]
    pub points: Vec<Currency>,
    /// Pages, in display order.
    #[serde(default)]
    pub pages: Vec<Page>,
    /// Page-less groups from single-page (v1) projects.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Project {
    /// Parses a project from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if the document is malformed.
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds a project from an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if the value does not match the schema.
    pub fn from_json_value(value: Value) -> ModelResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reads and parses a project file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Io`] if the file cannot be read, or
    /// [`ModelError::Json`] if it is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> ModelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    /// Serializes the project as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The project title, if one was set.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.title.as_deref())
    }
}

/// Authoring metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    /// Human-readable project title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A currency the player spends or earns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    /// Unique identifier referenced by costs and formulas.
    pub id: CurrencyId,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Balance before any selection.
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub start: Option<f64>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Currency {
    /// Creates a currency with a starting balance.
    #[must_use]
    pub fn new(id: impl Into<CurrencyId>, start: i64) -> Self {
        Self {
            id: id.into(),
            name: None,
            #[allow(clippy::cast_precision_loss)]
            start: Some(start as f64),
            extra: Map::new(),
        }
    }

    /// Starting balance rounded to a whole amount.
    #[must_use]
    pub fn start_value(&self) -> i64 {
        crate::round_half_up(self.start.unwrap_or(0.0))
    }
}

/// One page of the layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page identifier (optional in older projects).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Groups and standalone items, in layout order.
    #[serde(default)]
    pub layout: Vec<LayoutElement>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An element placed on a page, discriminated by its `"type"` field.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutElement {
    /// A group of items sharing rules.
    Group(Group),
    /// An item outside any group.
    Item(Item),
    /// Text blocks, images and anything else with no selection semantics,
    /// kept verbatim.
    Decoration(Map<String, Value>),
}

impl<'de> Deserialize<'de> for LayoutElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut raw = Map::<String, Value>::deserialize(deserializer)?;
        let kind = raw.get("type").and_then(Value::as_str).map(str::to_string);
        match kind.as_deref() {
            Some("group") => {
                raw.remove("type");
                serde_json::from_value(Value::Object(raw))
                    .map(Self::Group)
                    .map_err(D::Error::custom)
            }
            Some("item") => {
                raw.remove("type");
                serde_json::from_value(Value::Object(raw))
                    .map(Self::Item)
                    .map_err(D::Error::custom)
            }
            _ => Ok(Self::Decoration(raw)),
        }
    }
}

impl Serialize for LayoutElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (tag, body) = match self {
            Self::Group(group) => ("group", serde_json::to_value(group)),
            Self::Item(item) => ("item", serde_json::to_value(item)),
            Self::Decoration(raw) => return raw.serialize(serializer),
        };
        let mut map = match body.map_err(S::Error::custom)? {
            Value::Object(map) => map,
            other => return other.serialize(serializer),
        };
        map.insert("type".to_string(), Value::String(tag.to_string()));
        map.serialize(serializer)
    }
}

/// A named collection of items sharing selection-count and budget rules.
///
/// The same group id may appear as several layout fragments; the index
/// merges them into one logical group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Unique identifier (shared by all fragments of the group).
    pub id: GroupId,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Selection rules; absent means unconstrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<GroupRules>,
    /// Member items of this fragment.
    #[serde(default)]
    pub items: Vec<Item>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Rules applied to a group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupRules {
    /// Cap on the summed quantity of member items. `1` gives radio behaviour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_choices: Option<i64>,
    /// Free allowance absorbing spend before it reaches the balance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<Budget>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A per-group allowance in one currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    /// Currency the allowance covers.
    pub currency: CurrencyId,
    /// Amount of spend covered.
    #[serde(default)]
    pub amount: i64,
    /// Sibling groups drawing from the same pool.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applies_to: Vec<GroupId>,
}

/// A selectable (or display-only) unit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique, stable identifier.
    pub id: ItemId,
    /// Display title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Requirement expressions or simple item references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    /// Items that block this one while selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub incompatible: Vec<String>,
    /// Cost entries, one per currency touched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cost: Vec<CostEntry>,
    /// Effects applied while selected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<EffectDeclaration>,
    /// Free-form tags used by formulas and cost modifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,
    /// Lowest allowed quantity; negative values allow "selling".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<i64>,
    /// Highest allowed quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_quantity: Option<i64>,
    /// `false` marks a display-only anchor that is never chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selectable: Option<bool>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Creates a plain selectable item with default bounds.
    #[must_use]
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Lowest allowed quantity (default 0).
    #[must_use]
    pub fn min_quantity(&self) -> i64 {
        self.min_quantity.unwrap_or(0)
    }

    /// Highest allowed quantity (default 1; an authored `0` also means 1).
    #[must_use]
    pub fn max_quantity(&self) -> i64 {
        match self.max_quantity {
            Some(max) if max != 0 => max,
            _ => 1,
        }
    }

    /// Whether the player may ever choose this item.
    #[must_use]
    pub fn is_selectable(&self) -> bool {
        self.selectable != Some(false)
    }

    /// Whether the item carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Display name, falling back to the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// One currency cost of an item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    /// Currency charged or granted.
    pub currency: CurrencyId,
    /// Static amount (negative = spend).
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub value: Option<f64>,
    /// Alternative spelling of `value` used by older projects.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub base: Option<f64>,
    /// Expression adding a computed delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    /// Expression adding a conditional delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl CostEntry {
    /// Creates a static cost.
    #[must_use]
    pub fn fixed(currency: impl Into<CurrencyId>, value: f64) -> Self {
        Self {
            currency: currency.into(),
            value: Some(value),
            ..Self::default()
        }
    }

    /// The static part of the cost: `value`, else `base`, else 0.
    ///
    /// A zero `value` defers to `base`.
    #[must_use]
    pub fn static_value(&self) -> f64 {
        match (self.value, self.base) {
            (Some(v), _) if v != 0.0 => v,
            (_, Some(b)) => b,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_defaults() {
        let item: Item = serde_json::from_value(json!({"id": "a"})).unwrap();
        assert_eq!(item.min_quantity(), 0);
        assert_eq!(item.max_quantity(), 1);
        assert!(item.is_selectable());
        assert!(item.requirements.is_empty());
        assert!(item.cost.is_empty());
    }

    #[test]
    fn test_layout_elements_by_type() {
        let page: Page = serde_json::from_value(json!({
            "id": "p1",
            "layout": [
                {"type": "group", "id": "g", "items": [{"id": "a"}]},
                {"type": "item", "id": "b", "x": 10},
                {"type": "text", "content": "flavour"}
            ]
        }))
        .unwrap();

        assert!(matches!(page.layout[0], LayoutElement::Group(_)));
        assert!(matches!(page.layout[1], LayoutElement::Item(_)));
        assert!(matches!(&page.layout[2], LayoutElement::Decoration(raw) if raw["content"] == json!("flavour")));
        if let LayoutElement::Item(item) = &page.layout[1] {
            assert_eq!(item.extra.get("x"), Some(&json!(10)));
        }
    }

    #[test]
    fn test_cost_static_value_fallbacks() {
        let both = CostEntry { value: Some(0.0), base: Some(-5.0), ..CostEntry::fixed("pts", 0.0) };
        assert!((both.static_value() + 5.0).abs() < f64::EPSILON);
        assert!((CostEntry::fixed("pts", -3.0).static_value() + 3.0).abs() < f64::EPSILON);
        let empty = CostEntry { currency: "pts".into(), ..CostEntry::default() };
        assert!(empty.static_value().abs() < f64::EPSILON);
    }

    #[test]
    fn test_round_trip_preserves_display_fields() {
        let doc = json!({
            "meta": {"title": "Demo", "app_version": "1.2.0"},
            "points": [{"id": "pts", "name": "Points", "start": 30}],
            "pages": [{"id": "p1", "image": "bg.png", "layout": [
                {"type": "item", "id": "a", "coords": {"x": 1, "y": 2}}
            ]}]
        });
        let project = Project::from_json_value(doc).unwrap();
        assert_eq!(project.title(), Some("Demo"));
        assert_eq!(project.points[0].start_value(), 30);

        let text = project.to_json_pretty().unwrap();
        let again = Project::from_json_str(&text).unwrap();
        assert_eq!(project, again);
        assert!(text.contains("bg.png"));
        assert!(text.contains("\"type\": \"item\""));
    }

    #[test]
    fn test_malformed_document_is_error() {
        let err = Project::from_json_str("{\"pages\": 4}").unwrap_err();
        assert!(matches!(err, ModelError::Json(_)));
    }
}
