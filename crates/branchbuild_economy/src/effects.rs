//! # Effects
//!
//! Effects are replayed from a clean baseline on every recalculation:
//! [`derive_effects`] is a pure function of the selection, the starting
//! balances and the persisted rolls. Nothing here accumulates across
//! passes, so deselecting an item removes its influence on the next pass.
//!
//! Items are visited in selection order. Items added by `force_selection`
//! join the end of that order and have their own effects applied in the
//! same pass.

use std::collections::{BTreeMap, HashSet};

use branchbuild_core::{round_half_up, Catalog, Effect, GroupEntry, Item};
use tracing::{debug, warn};

use crate::expr::ExpressionCache;
use crate::rules::{CostModifier, RuleContext};
use crate::state::SelectionSet;

/// Everything the current selection's effects produce.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectOutputs {
    /// `max_choices` deltas by group id.
    pub group_limit_deltas: BTreeMap<String, i64>,
    /// Items auto-selected at quantity 1, in the order they were forced.
    pub forced: Vec<String>,
    /// Balances after `set_value` and dice payouts, before any cost.
    pub currencies: BTreeMap<String, i64>,
    /// Cost modifiers for the pricing stage.
    pub cost_modifiers: Vec<CostModifier>,
}

impl EffectOutputs {
    /// A group's current limit: authored `max_choices` plus effect deltas.
    ///
    /// `None` when the group declares no limit.
    #[must_use]
    pub fn effective_limit(&self, group: &GroupEntry) -> Option<i64> {
        group
            .max_choices()
            .map(|base| base.saturating_add(self.group_limit_deltas.get(&group.id).copied().unwrap_or(0)))
    }
}

/// Which `force_selection` targets a replay may add.
#[derive(Clone, Copy, Debug)]
pub enum Forcing<'a> {
    /// Any target except these ids (items cleanup already removed this run).
    Except(&'a HashSet<String>),
    /// None; the selection is replayed as it stands.
    Disabled,
}

impl Forcing<'_> {
    fn allows(self, id: &str) -> bool {
        match self {
            Self::Except(removed) => !removed.contains(id),
            Self::Disabled => false,
        }
    }
}

/// Replays every selected item's effects.
///
/// A forced target is only added when `forcing` allows it and it passes
/// its own requirement and incompatibility checks against the working set.
#[must_use]
pub fn derive_effects(
    catalog: &Catalog,
    selected: &SelectionSet,
    base_currencies: &BTreeMap<String, i64>,
    rolls: &BTreeMap<String, i64>,
    forcing: Forcing<'_>,
    cache: &ExpressionCache,
) -> EffectOutputs {
    let mut replay = Replay {
        catalog,
        rolls,
        forcing,
        cache,
        working: selected.clone(),
        out: EffectOutputs {
            currencies: base_currencies.clone(),
            ..EffectOutputs::default()
        },
    };

    let mut index = 0;
    while let Some((id, quantity)) = replay.working.entry_at(index).map(|(id, q)| (id.to_string(), q)) {
        index += 1;
        let Some(item) = catalog.item(&id) else {
            continue;
        };
        let group = catalog.group_for_item(&id);

        for declaration in &item.effects {
            if let Some(condition) = declaration.condition.as_deref() {
                if !replay.context().evaluate_condition(condition, item, group) {
                    continue;
                }
            }
            match declaration.parse() {
                Ok(effect) => replay.apply(effect, item, quantity),
                Err(err) => warn!(item = %item.id, error = %err, "skipping effect"),
            }
        }
    }

    replay.out
}

struct Replay<'a> {
    catalog: &'a Catalog,
    rolls: &'a BTreeMap<String, i64>,
    forcing: Forcing<'a>,
    cache: &'a ExpressionCache,
    working: SelectionSet,
    out: EffectOutputs,
}

impl Replay<'_> {
    fn context(&self) -> RuleContext<'_> {
        RuleContext {
            catalog: self.catalog,
            selected: &self.working,
            currencies: &self.out.currencies,
            modifiers: &self.out.cost_modifiers,
            cache: self.cache,
        }
    }

    fn apply(&mut self, effect: Effect<'_>, source: &Item, quantity: i64) {
        #[allow(clippy::cast_precision_loss)]
        let scaled = |value: f64, once: bool| if once { value } else { value * quantity as f64 };

        match effect {
            Effect::ModifyGroupLimit { group_id, delta, once } => {
                match self.catalog.group(group_id) {
                    Some(group) if group.max_choices().is_some() => {
                        let total = self.out.group_limit_deltas.entry(group_id.to_string()).or_insert(0);
                        *total = total.saturating_add(round_half_up(scaled(delta, once)));
                    }
                    Some(_) => debug!(group = group_id, "group has no max_choices, limit effect ignored"),
                    None => warn!(item = %source.id, group = group_id, "limit effect targets unknown group"),
                }
            }
            Effect::ForceSelection { target_id } => self.force(source, target_id),
            Effect::SetValue { currency, value } => match self.out.currencies.get_mut(currency) {
                Some(balance) => *balance = round_half_up(value),
                None => warn!(item = %source.id, currency, "set_value targets unknown currency"),
            },
            Effect::ModifyCost { tag, group_id, currency, mode, value, once } => {
                let copies = match (quantity, once) {
                    (q, _) if q <= 0 => 0,
                    (_, true) => 1,
                    (q, false) => q,
                };
                for _ in 0..copies {
                    self.out.cost_modifiers.push(CostModifier {
                        tag: tag.map(str::to_string),
                        group_id: group_id.map(str::to_string),
                        currency: currency.map(str::to_string),
                        mode,
                        value,
                    });
                }
            }
            Effect::RollDice { currency, .. } => {
                let Some(&rolled) = self.rolls.get(&source.id) else {
                    return;
                };
                match self.out.currencies.get_mut(currency) {
                    Some(balance) => *balance = balance.saturating_add(rolled.saturating_mul(quantity)),
                    None => warn!(item = %source.id, currency, "roll_dice pays into unknown currency"),
                }
            }
        }
    }

    fn force(&mut self, source: &Item, target_id: &str) {
        let Some(target) = self.catalog.item(target_id) else {
            warn!(item = %source.id, target = target_id, "force_selection targets unknown item");
            return;
        };
        if self.working.get(target_id) != 0 {
            return;
        }
        if !self.forcing.allows(target_id) {
            debug!(item = %source.id, target = target_id, "forced target was removed earlier this run");
            return;
        }
        if let Err(reason) = self.context().can_select(target) {
            debug!(item = %source.id, target = target_id, %reason, "forced target is not selectable");
            return;
        }
        self.working.set(target_id, 1);
        self.out.forced.push(target_id.to_string());
        debug!(item = %source.id, target = target_id, "effect forced selection");
    }
}
