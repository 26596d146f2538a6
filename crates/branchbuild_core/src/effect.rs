//! # Effect Declarations
//!
//! Effects are stored as authored (a flat record with a `type` tag and a
//! handful of optional fields) so unknown types survive a round trip.
//! [`EffectDeclaration::parse`] turns a record into a typed [`Effect`]
//! when the engine needs to act on it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EffectParseError;
use crate::lenient;

/// An effect as written in the project file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectDeclaration {
    /// Effect kind (`modify_group_limit`, `force_selection`, ...).
    #[serde(rename = "type")]
    pub effect_type: String,
    /// Optional expression gating the effect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Target group (`modify_group_limit`) or group filter (`modify_cost`).
    #[serde(default, alias = "groupId", skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    /// Target item for `force_selection`.
    #[serde(default, alias = "targetId", skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Currency affected or filtered on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Tag filter for `modify_cost`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Modifier mode for `modify_cost`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Magnitude of the effect.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub value: Option<f64>,
    /// Apply once regardless of the source item's quantity.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub once: bool,
    /// Lower die bound for `roll_dice`.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub min: Option<f64>,
    /// Upper die bound for `roll_dice`.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_number")]
    pub max: Option<f64>,
    /// Fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How a cost modifier combines with the running cost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModifierMode {
    /// Adds a flat amount.
    Add,
    /// Scales the running value.
    Multiply,
    /// Replaces the running value.
    Set,
}

impl ModifierMode {
    /// Parses an authored mode; a missing mode means `Add`.
    ///
    /// # Errors
    ///
    /// Returns [`EffectParseError::UnknownMode`] for anything else.
    pub fn parse(mode: Option<&str>) -> Result<Self, EffectParseError> {
        match mode.map(str::trim) {
            None | Some("" | "add") => Ok(Self::Add),
            Some("multiply") => Ok(Self::Multiply),
            Some("set") => Ok(Self::Set),
            Some(other) => Err(EffectParseError::UnknownMode(other.to_string())),
        }
    }
}

/// A typed view over an [`EffectDeclaration`].
#[derive(Clone, Debug, PartialEq)]
pub enum Effect<'a> {
    /// Adjusts a group's `max_choices`.
    ModifyGroupLimit {
        /// Group whose limit changes.
        group_id: &'a str,
        /// Delta per unit of source quantity.
        delta: f64,
        /// Ignore the source quantity.
        once: bool,
    },
    /// Auto-selects a target item at quantity 1.
    ForceSelection {
        /// Item to select.
        target_id: &'a str,
    },
    /// Hard-assigns a currency balance.
    SetValue {
        /// Currency to assign.
        currency: &'a str,
        /// New balance.
        value: f64,
    },
    /// Queues cost modifiers for the pricing stage.
    ModifyCost {
        /// Only items carrying this tag.
        tag: Option<&'a str>,
        /// Only items in this group.
        group_id: Option<&'a str>,
        /// Only costs in this currency.
        currency: Option<&'a str>,
        /// Combination mode.
        mode: ModifierMode,
        /// Modifier magnitude.
        value: f64,
        /// Push one record instead of one per unit.
        once: bool,
    },
    /// Pays a persisted die roll into a currency.
    RollDice {
        /// Currency receiving the payout.
        currency: &'a str,
        /// Declared lower bound, if any.
        min: Option<f64>,
        /// Declared upper bound, if any.
        max: Option<f64>,
    },
}

impl EffectDeclaration {
    /// Creates a declaration with only the type tag set.
    #[must_use]
    pub fn new(effect_type: impl Into<String>) -> Self {
        Self {
            effect_type: effect_type.into(),
            ..Self::default()
        }
    }

    /// Interprets the record.
    ///
    /// # Errors
    ///
    /// Returns an [`EffectParseError`] when the type is unknown, a required
    /// field is missing, or a `modify_cost` mode is unsupported.
    pub fn parse(&self) -> Result<Effect<'_>, EffectParseError> {
        let missing = |field: &'static str| EffectParseError::MissingField {
            effect_type: self.effect_type.clone(),
            field,
        };

        match self.effect_type.as_str() {
            "modify_group_limit" => Ok(Effect::ModifyGroupLimit {
                group_id: self.group_id.as_deref().ok_or_else(|| missing("group_id"))?,
                delta: self.value.unwrap_or(0.0),
                once: self.once,
            }),
            "force_selection" => Ok(Effect::ForceSelection {
                target_id: self.target_id.as_deref().ok_or_else(|| missing("target_id"))?,
            }),
            "set_value" => Ok(Effect::SetValue {
                currency: self.currency.as_deref().ok_or_else(|| missing("currency"))?,
                value: self.value.ok_or_else(|| missing("value"))?,
            }),
            "modify_cost" => Ok(Effect::ModifyCost {
                tag: self.tag.as_deref(),
                group_id: self.group_id.as_deref(),
                currency: self.currency.as_deref(),
                mode: ModifierMode::parse(self.mode.as_deref())?,
                value: self.value.unwrap_or(0.0),
                once: self.once,
            }),
            "roll_dice" => Ok(Effect::RollDice {
                currency: self.currency.as_deref().ok_or_else(|| missing("currency"))?,
                min: self.min,
                max: self.max,
            }),
            other => Err(EffectParseError::UnknownType(other.to_string())),
        }
    }

    /// Whether this is a `roll_dice` declaration.
    #[must_use]
    pub fn is_roll_dice(&self) -> bool {
        self.effect_type == "roll_dice"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(value: Value) -> EffectDeclaration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_group_limit() {
        let d = decl(json!({"type": "modify_group_limit", "group_id": "g", "value": 2}));
        assert_eq!(
            d.parse().unwrap(),
            Effect::ModifyGroupLimit { group_id: "g", delta: 2.0, once: false }
        );
    }

    #[test]
    fn test_parse_modify_cost_defaults_to_add() {
        let d = decl(json!({"type": "modify_cost", "groupId": "g", "value": -5}));
        match d.parse().unwrap() {
            Effect::ModifyCost { mode, group_id, tag, .. } => {
                assert_eq!(mode, ModifierMode::Add);
                assert_eq!(group_id, Some("g"));
                assert_eq!(tag, None);
            }
            other => panic!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let d = decl(json!({"type": "modify_cost", "mode": "divide", "value": 2}));
        assert_eq!(d.parse().unwrap_err(), EffectParseError::UnknownMode("divide".into()));
    }

    #[test]
    fn test_missing_target() {
        let d = decl(json!({"type": "force_selection"}));
        assert!(matches!(
            d.parse().unwrap_err(),
            EffectParseError::MissingField { field: "target_id", .. }
        ));
    }

    #[test]
    fn test_unknown_type_preserved() {
        let d = decl(json!({"type": "teleport", "destination": "moon"}));
        assert_eq!(d.parse().unwrap_err(), EffectParseError::UnknownType("teleport".into()));
        let back = serde_json::to_value(&d).unwrap();
        assert_eq!(back["destination"], json!("moon"));
    }

    #[test]
    fn test_dice_bounds_from_strings() {
        let d = decl(json!({"type": "roll_dice", "currency": "gold", "min": "2", "max": "12"}));
        assert!(d.is_roll_dice());
        assert_eq!(
            d.parse().unwrap(),
            Effect::RollDice { currency: "gold", min: Some(2.0), max: Some(12.0) }
        );
    }
}
