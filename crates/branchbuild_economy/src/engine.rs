//! # Selection Engine
//!
//! Owns the indexed project and the [`SelectionState`], and is the only
//! thing allowed to mutate either. Every public mutation runs the whole
//! pipeline before returning:
//!
//! ```text
//! ┌───────────────────────── cleanup to fixpoint ─────────────────────────┐
//! │ replay effects -> apply forced items -> drop invalid / trim groups    │
//! │ (repeat until nothing is dropped, at most `cleanup_iteration_cap`)    │
//! └───────────────────────────────────────────────────────────────────────┘
//!        -> reset balances (start + set_value + dice payouts)
//!        -> price selections into per-group deltas
//!        -> apply budgets
//!        -> commit deltas for known currencies
//!        -> emit `recalculate`
//! ```
//!
//! Listeners receive owned payloads and cannot reach back into the
//! engine while it is mid-call; a collaborator that wants to react with
//! another mutation reads it off the facade crate's event channel and
//! applies it after the call returns.

use std::collections::{BTreeMap, HashSet};

use branchbuild_core::{Catalog, GroupEntry, Item, Page, Project};
use tracing::{debug, info, warn};

use crate::budget::{apply_budgets, DeltaTable};
use crate::dice::Dice;
use crate::effects::{derive_effects, EffectOutputs, Forcing};
use crate::error::{EconomyResult, SelectionRejected, SelectionResult};
use crate::events::{EngineEvent, EventKind, Listeners, RecalcReport};
use crate::expr::ExpressionCache;
use crate::rules::{CostBreakdown, CostModifier, RuleContext};
use crate::settings::EngineSettings;
use crate::state::{SelectionState, StateSnapshot};

/// The selection and economy engine for one loaded project.
#[derive(Debug)]
pub struct Engine {
    catalog: Catalog,
    state: SelectionState,
    effects: EffectOutputs,
    cache: ExpressionCache,
    dice: Dice,
    settings: EngineSettings,
    listeners: Listeners,
    last_report: RecalcReport,
}

impl Engine {
    /// Creates an engine with default settings.
    #[must_use]
    pub fn new(project: Project) -> Self {
        Self::with_settings(project, EngineSettings::default())
    }

    /// Creates an engine with explicit settings.
    #[must_use]
    pub fn with_settings(project: Project, settings: EngineSettings) -> Self {
        let mut engine = Self {
            catalog: Catalog::new(project),
            state: SelectionState::default(),
            effects: EffectOutputs::default(),
            cache: ExpressionCache::new(),
            dice: Dice::new(settings.rng_seed),
            settings,
            listeners: Listeners::default(),
            last_report: RecalcReport::default(),
        };
        engine.report_config_issues();
        engine.run_pipeline();
        engine
    }

    /// Parses a JSON project and creates an engine for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a valid project.
    pub fn from_json_str(json: &str, settings: EngineSettings) -> EconomyResult<Self> {
        Ok(Self::with_settings(Project::from_json_str(json)?, settings))
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Registers a listener for one event kind.
    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&EngineEvent) + Send + 'static) {
        self.listeners.on(kind, Box::new(listener));
    }

    fn emit(&mut self, event: &EngineEvent) {
        self.listeners.emit(event);
    }

    fn emit_recalculate(&mut self) {
        if self.listeners.has_listeners(EventKind::Recalculate) {
            let event = EngineEvent::Recalculate {
                state: self.state.clone(),
                report: self.last_report.clone(),
            };
            self.emit(&event);
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Whether [`select`](Self::select) would succeed, without changing anything.
    ///
    /// # Errors
    ///
    /// Returns the reason the selection would be refused.
    pub fn check_select(&self, item_id: &str) -> Result<(), SelectionRejected> {
        let item = self
            .catalog
            .item(item_id)
            .ok_or_else(|| SelectionRejected::UnknownItem(item_id.to_string()))?;
        if !item.is_selectable() {
            return Err(SelectionRejected::NotSelectable(item_id.to_string()));
        }
        self.rules().can_select(item)?;

        let current = self.state.selected.get(item_id);
        let max = item.max_quantity();
        if current >= max {
            return Err(SelectionRejected::AtMaxQuantity { item: item_id.to_string(), max });
        }

        if let Some(group) = self.catalog.group_for_item(item_id) {
            if let Some(limit) = self.effects.effective_limit(group) {
                let radio = limit == 1 && current == 0;
                if !radio && self.group_qty(group) >= limit {
                    return Err(SelectionRejected::GroupFull { group: group.id.clone(), limit });
                }
            }
        }
        Ok(())
    }

    /// Adds one unit of an item.
    ///
    /// In a group whose current limit is 1, selecting an unselected item
    /// replaces the other members instead of failing.
    ///
    /// # Errors
    ///
    /// Returns why the selection was refused; the state is unchanged.
    pub fn select(&mut self, item_id: &str) -> SelectionResult {
        self.check_select(item_id)?;
        let current = self.state.selected.get(item_id);

        if let Some(group) = self.catalog.group_for_item(item_id) {
            if current == 0 && self.effects.effective_limit(group) == Some(1) {
                for member in &group.members {
                    if member != item_id && self.state.selected.remove(member).is_some() {
                        debug!(group = %group.id, replaced = %member, "radio replacement");
                    }
                }
            }
        }

        self.roll_if_needed(item_id);
        self.state.selected.set(item_id, current + 1);
        debug!(item = item_id, quantity = current + 1, "selected");

        self.run_pipeline();
        self.emit_recalculate();
        let quantity = self.state.selected.get(item_id);
        self.emit(&EngineEvent::Selection {
            item_id: item_id.to_string(),
            quantity,
            selected: true,
        });
        Ok(quantity)
    }

    /// Removes one unit of an item.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionRejected::AtMinQuantity`] when the quantity is
    /// already at or below the item's minimum, or
    /// [`SelectionRejected::UnknownItem`] for an id that is neither
    /// declared nor selected.
    pub fn deselect(&mut self, item_id: &str) -> SelectionResult {
        let item = self.catalog.item(item_id);
        let current = self.state.selected.get(item_id);
        if item.is_none() && current == 0 {
            return Err(SelectionRejected::UnknownItem(item_id.to_string()));
        }
        let min = item.map_or(0, Item::min_quantity);
        if current <= min {
            return Err(SelectionRejected::AtMinQuantity { item: item_id.to_string(), min });
        }

        self.state.selected.set(item_id, current - 1);
        debug!(item = item_id, quantity = current - 1, "deselected");

        self.run_pipeline();
        self.emit_recalculate();
        let quantity = self.state.selected.get(item_id);
        self.emit(&EngineEvent::Selection {
            item_id: item_id.to_string(),
            quantity,
            selected: false,
        });
        Ok(quantity)
    }

    /// Deselects an item with positive quantity, otherwise selects it.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionRejected::NotSelectable`] for display-only items,
    /// or whatever the routed call returns.
    pub fn toggle(&mut self, item_id: &str) -> SelectionResult {
        if self.catalog.item(item_id).is_some_and(|item| !item.is_selectable()) {
            return Err(SelectionRejected::NotSelectable(item_id.to_string()));
        }
        if self.state.selected.get(item_id) > 0 {
            self.deselect(item_id)
        } else {
            self.select(item_id)
        }
    }

    /// Clears the build: selections, dice results and effect overrides.
    pub fn reset(&mut self) {
        self.state = SelectionState::default();
        self.run_pipeline();
        self.emit_recalculate();
        self.emit(&EngineEvent::Reset);
    }

    /// Replaces the project and all state.
    pub fn load_config(&mut self, project: Project) {
        self.catalog = Catalog::new(project);
        self.cache.clear();
        self.state = SelectionState::default();
        info!(
            title = self.catalog.project().title().unwrap_or("untitled"),
            items = self.catalog.item_count(),
            groups = self.catalog.groups().len(),
            "project loaded"
        );
        self.report_config_issues();
        let title = self.catalog.project().title().map(str::to_string);
        self.emit(&EngineEvent::ConfigLoaded { title });
        self.run_pipeline();
        self.emit_recalculate();
    }

    /// Edits the project in place and rebuilds the lookup maps.
    ///
    /// Selections are left untouched; call [`recalculate`](Self::recalculate)
    /// once the edit batch is done.
    pub fn edit_project<R>(&mut self, edit: impl FnOnce(&mut Project) -> R) -> R {
        let out = self.catalog.edit(edit);
        self.cache.clear();
        out
    }

    /// Re-runs the pipeline without a state change.
    pub fn recalculate(&mut self) -> RecalcReport {
        self.run_pipeline();
        self.emit_recalculate();
        self.last_report.clone()
    }

    // ========================================================================
    // Build codes and snapshots
    // ========================================================================

    /// Selected ids as a shareable list, each id repeated once per unit.
    #[must_use]
    pub fn build_code(&self) -> String {
        let mut ids = Vec::new();
        for (id, quantity) in self.state.selected.iter() {
            for _ in 0..quantity.max(0) {
                ids.push(id);
            }
        }
        ids.join(", ")
    }

    /// Replaces the selection from a build code.
    ///
    /// Ids may be separated by commas or whitespace; each occurrence adds
    /// one unit and unknown ids are skipped. Returns the number of ids
    /// loaded. Invalid combinations are cleaned up by the pipeline.
    pub fn apply_build_code(&mut self, code: &str) -> usize {
        let ids: Vec<&str> = code
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if ids.is_empty() {
            return 0;
        }

        self.state.selected.clear();
        let mut loaded = 0;
        for id in ids {
            if !self.catalog.contains_item(id) {
                debug!(item = id, "build code names unknown item");
                continue;
            }
            let current = self.state.selected.get(id);
            self.state.selected.set(id, current + 1);
            self.roll_if_needed(id);
            loaded += 1;
        }

        self.run_pipeline();
        self.emit_recalculate();
        loaded
    }

    /// Persistable copy of the current state.
    #[must_use]
    pub fn export_state(&self) -> StateSnapshot {
        self.state.export()
    }

    /// Restores a snapshot and recalculates so every invariant holds.
    ///
    /// Balances and budgets are recomputed from the restored selection.
    pub fn import_state(&mut self, snapshot: StateSnapshot) -> RecalcReport {
        self.state.import(snapshot);
        self.recalculate()
    }

    /// JSON form of [`export_state`](Self::export_state).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export_state_json(&self) -> EconomyResult<String> {
        self.export_state().to_json()
    }

    /// Restores a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a valid snapshot.
    pub fn import_state_json(&mut self, json: &str) -> EconomyResult<RecalcReport> {
        let snapshot = StateSnapshot::from_json_str(json)?;
        Ok(self.import_state(snapshot))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Looks up an item.
    #[must_use]
    pub fn find_item(&self, item_id: &str) -> Option<&Item> {
        self.catalog.item(item_id)
    }

    /// Looks up a group.
    #[must_use]
    pub fn find_group(&self, group_id: &str) -> Option<&GroupEntry> {
        self.catalog.group(group_id)
    }

    /// The group owning an item, `None` for standalone items.
    #[must_use]
    pub fn find_group_for_item(&self, item_id: &str) -> Option<&GroupEntry> {
        self.catalog.group_for_item(item_id)
    }

    /// The page an item sits on.
    #[must_use]
    pub fn find_page_for_item(&self, item_id: &str) -> Option<&Page> {
        self.catalog.page_for_item(item_id)
    }

    /// Member items of a group, merged across fragments.
    #[must_use]
    pub fn get_all_items_in_group(&self, group_id: &str) -> Vec<&Item> {
        self.catalog.items_in_group(group_id)
    }

    /// Member items of a group that have a selection entry.
    #[must_use]
    pub fn get_selected_in_group(&self, group_id: &str) -> Vec<&Item> {
        self.catalog
            .items_in_group(group_id)
            .into_iter()
            .filter(|item| self.state.selected.contains(&item.id))
            .collect()
    }

    /// Summed selected quantity of a group's members.
    #[must_use]
    pub fn get_group_qty(&self, group_id: &str) -> i64 {
        self.catalog.group(group_id).map_or(0, |g| self.group_qty(g))
    }

    /// Every item, in declaration order.
    #[must_use]
    pub fn get_all_items(&self) -> Vec<&Item> {
        self.catalog.items().collect()
    }

    /// Every group, in declaration order.
    #[must_use]
    pub fn get_all_groups(&self) -> &[GroupEntry] {
        self.catalog.groups()
    }

    /// A group's current limit including effect deltas.
    #[must_use]
    pub fn effective_max_choices(&self, group_id: &str) -> Option<i64> {
        self.catalog.group(group_id).and_then(|g| self.effects.effective_limit(g))
    }

    /// Priced cost entries of an item under the current modifiers.
    #[must_use]
    pub fn cost_breakdown(&self, item_id: &str) -> Option<Vec<CostBreakdown>> {
        let item = self.catalog.item(item_id)?;
        let group = self.catalog.group_for_item(item_id);
        let rules = self.rules();
        Some(item.cost.iter().map(|cost| rules.cost_breakdown(cost, item, group)).collect())
    }

    /// Selected quantity of an item.
    #[must_use]
    pub fn quantity(&self, item_id: &str) -> i64 {
        self.state.selected.get(item_id)
    }

    /// Current balance of a currency.
    #[must_use]
    pub fn currency(&self, currency_id: &str) -> Option<i64> {
        self.state.currencies.get(currency_id).copied()
    }

    /// Persisted die result for an item.
    #[must_use]
    pub fn roll(&self, item_id: &str) -> Option<i64> {
        self.state.rolls.get(item_id).copied()
    }

    /// The full selection state.
    #[must_use]
    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Cost modifiers active after the last pass.
    #[must_use]
    pub fn cost_modifiers(&self) -> &[CostModifier] {
        &self.effects.cost_modifiers
    }

    /// The indexed project.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Settings in force.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// What the last pipeline run did.
    #[must_use]
    pub fn last_report(&self) -> &RecalcReport {
        &self.last_report
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    fn rules(&self) -> RuleContext<'_> {
        RuleContext {
            catalog: &self.catalog,
            selected: &self.state.selected,
            currencies: &self.state.currencies,
            modifiers: &self.effects.cost_modifiers,
            cache: &self.cache,
        }
    }

    fn report_config_issues(&self) {
        for issue in self.catalog.lint() {
            warn!(%issue, "configuration issue");
        }
    }

    fn group_qty(&self, group: &GroupEntry) -> i64 {
        group.members.iter().map(|id| self.state.selected.get(id)).sum()
    }

    fn start_balances(&self) -> BTreeMap<String, i64> {
        self.catalog
            .currencies()
            .iter()
            .map(|c| (c.id.clone(), c.start_value()))
            .collect()
    }

    /// Draws and stores a die result the first time a dice item is selected.
    fn roll_if_needed(&mut self, item_id: &str) {
        if self.state.rolls.contains_key(item_id) {
            return;
        }
        let Some(effect) = self
            .catalog
            .item(item_id)
            .and_then(|item| item.effects.iter().find(|e| e.is_roll_dice()))
        else {
            return;
        };
        #[allow(clippy::cast_possible_truncation)]
        let bound = |raw: Option<f64>, fallback: i64| {
            raw.filter(|v| v.is_finite())
                .map(|v| v.trunc() as i64)
                .filter(|&v| v != 0)
                .unwrap_or(fallback)
        };
        let min = bound(effect.min, self.settings.default_dice_min);
        let max = bound(effect.max, self.settings.default_dice_max);
        let rolled = self.dice.roll(min, max);
        debug!(item = item_id, min, max, rolled, "dice rolled");
        self.state.rolls.insert(item_id.to_string(), rolled);
    }

    fn derive(&self, base: &BTreeMap<String, i64>, forcing: Forcing<'_>) -> EffectOutputs {
        derive_effects(&self.catalog, &self.state.selected, base, &self.state.rolls, forcing, &self.cache)
    }

    fn run_pipeline(&mut self) {
        let base = self.start_balances();
        let cap = self.settings.cleanup_iteration_cap.max(1);
        let mut report = RecalcReport {
            converged: true,
            ..RecalcReport::default()
        };

        // Ids cleanup removed this run are never forced back in.
        let mut removed_ids = HashSet::new();
        let outputs = loop {
            report.cleanup_passes += 1;
            let outputs = self.derive(&base, Forcing::Except(&removed_ids));
            for id in &outputs.forced {
                self.state.selected.set(id, 1);
                if !report.forced.contains(id) {
                    report.forced.push(id.clone());
                }
            }

            let removed = self.cleanup_pass(&outputs);
            if removed.is_empty() {
                break outputs;
            }
            removed_ids.extend(removed.iter().cloned());
            report.removed.extend(removed);

            if report.cleanup_passes >= cap {
                warn!(
                    passes = report.cleanup_passes,
                    "cleanup did not converge; check for contradictory requirements"
                );
                report.converged = false;
                break self.derive(&base, Forcing::Disabled);
            }
        };

        // Price selections under the replayed effects.
        let mut table = DeltaTable::new();
        {
            let rules = RuleContext {
                catalog: &self.catalog,
                selected: &self.state.selected,
                currencies: &outputs.currencies,
                modifiers: &outputs.cost_modifiers,
                cache: &self.cache,
            };
            for (id, quantity) in self.state.selected.iter() {
                let Some(item) = self.catalog.item(id) else {
                    continue;
                };
                let group = self.catalog.group_for_item(id);
                let bucket = group.map_or(self.settings.standalone_bucket.as_str(), |g| g.id.as_str());
                for cost in &item.cost {
                    let unit = rules.evaluate_cost(cost, item, group);
                    table.add(bucket, &cost.currency, unit.saturating_mul(quantity));
                }
            }
        }

        let budgets = apply_budgets(&self.catalog, &mut table);

        let mut currencies = outputs.currencies.clone();
        for (currency, delta) in table.totals() {
            match currencies.get_mut(&currency) {
                Some(balance) => *balance = balance.saturating_add(delta),
                None => debug!(currency = %currency, delta, "delta for unknown currency dropped"),
            }
        }

        self.state.currencies = currencies;
        self.state.budgets = budgets;
        let selected = &self.state.selected;
        self.state.rolls.retain(|id, _| selected.contains(id));
        debug!(
            selected = self.state.selected.len(),
            passes = report.cleanup_passes,
            removed = report.removed.len(),
            forced = report.forced.len(),
            "recalculated"
        );
        self.effects = outputs;
        self.last_report = report;
    }

    /// One cleanup scan. Returns the ids removed or trimmed.
    fn cleanup_pass(&mut self, outputs: &EffectOutputs) -> Vec<String> {
        let mut removed = Vec::new();

        for id in self.state.selected.ids() {
            let quantity = self.state.selected.get(&id);
            if quantity == 0 {
                continue;
            }
            let verdict = match self.catalog.item(&id) {
                None => Some(0),
                Some(item) => {
                    let rules = RuleContext {
                        catalog: &self.catalog,
                        selected: &self.state.selected,
                        currencies: &self.state.currencies,
                        modifiers: &outputs.cost_modifiers,
                        cache: &self.cache,
                    };
                    if rules.can_select(item).is_err() {
                        Some(0)
                    } else if quantity > item.max_quantity() {
                        Some(item.max_quantity())
                    } else {
                        None
                    }
                }
            };
            if let Some(new_quantity) = verdict {
                debug!(item = %id, from = quantity, to = new_quantity, "cleanup");
                self.state.selected.set(&id, new_quantity);
                removed.push(id);
            }
        }

        for group in self.catalog.groups() {
            let Some(limit) = outputs.effective_limit(group) else {
                continue;
            };
            loop {
                let total: i64 = group.members.iter().map(|m| self.state.selected.get(m)).sum();
                if total <= limit {
                    break;
                }
                let victim = self
                    .state
                    .selected
                    .iter()
                    .filter(|(id, q)| *q > 0 && group.members.iter().any(|m| m == id))
                    .map(|(id, _)| id.to_string())
                    .last();
                let Some(victim) = victim else {
                    break;
                };
                let quantity = self.state.selected.get(&victim);
                debug!(group = %group.id, item = %victim, limit, "trimmed over-limit group");
                self.state.selected.set(&victim, quantity - 1);
                removed.push(victim);
            }
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine(doc: serde_json::Value) -> Engine {
        Engine::with_settings(Project::from_json_value(doc).unwrap(), EngineSettings::default().with_seed(7))
    }

    #[test]
    fn test_currencies_start_values() {
        let engine = engine(json!({"points": [{"id": "pts", "start": 12.6}]}));
        assert_eq!(engine.currency("pts"), Some(13));
        assert!(engine.last_report().converged);
    }

    #[test]
    fn test_unknown_and_unselectable() {
        let mut engine = engine(json!({"pages": [{"layout": [
            {"type": "item", "id": "anchor", "selectable": false}
        ]}]}));
        assert_eq!(engine.select("ghost"), Err(SelectionRejected::UnknownItem("ghost".into())));
        assert_eq!(engine.select("anchor"), Err(SelectionRejected::NotSelectable("anchor".into())));
        assert_eq!(engine.toggle("anchor"), Err(SelectionRejected::NotSelectable("anchor".into())));
        assert_eq!(engine.deselect("ghost"), Err(SelectionRejected::UnknownItem("ghost".into())));
    }

    #[test]
    fn test_group_full() {
        let mut engine = engine(json!({"pages": [{"layout": [
            {"type": "group", "id": "g", "rules": {"max_choices": 2}, "items": [
                {"id": "a"}, {"id": "b"}, {"id": "c"}
            ]}
        ]}]}));
        engine.select("a").unwrap();
        engine.select("b").unwrap();
        assert_eq!(
            engine.select("c"),
            Err(SelectionRejected::GroupFull { group: "g".into(), limit: 2 })
        );
        assert_eq!(engine.get_group_qty("g"), 2);
    }

    #[test]
    fn test_limit_effect_raises_cap_and_trims_on_removal() {
        let mut engine = engine(json!({"pages": [{"layout": [
            {"type": "group", "id": "g", "rules": {"max_choices": 1}, "items": [
                {"id": "a"}, {"id": "b"}
            ]},
            {"type": "item", "id": "bag", "effects": [
                {"type": "modify_group_limit", "group_id": "g", "value": 1}
            ]}
        ]}]}));
        engine.select("bag").unwrap();
        assert_eq!(engine.effective_max_choices("g"), Some(2));
        engine.select("a").unwrap();
        engine.select("b").unwrap();
        assert_eq!(engine.get_group_qty("g"), 2);

        engine.deselect("bag").unwrap();
        assert_eq!(engine.effective_max_choices("g"), Some(1));
        assert_eq!(engine.get_group_qty("g"), 1);
        assert_eq!(engine.quantity("a"), 1);
        assert_eq!(engine.last_report().removed, vec!["b"]);
    }

    #[test]
    fn test_forced_selection_and_release() {
        let mut engine = engine(json!({
            "points": [{"id": "pts", "start": 10}],
            "pages": [{"layout": [
                {"type": "item", "id": "pack", "effects": [
                    {"type": "force_selection", "target_id": "gift"}
                ]},
                {"type": "item", "id": "gift", "cost": [{"currency": "pts", "value": -3}]}
            ]}]
        }));
        engine.select("pack").unwrap();
        assert_eq!(engine.quantity("gift"), 1);
        assert_eq!(engine.currency("pts"), Some(7));
        assert_eq!(engine.last_report().forced, vec!["gift"]);

        // Forced items are ordinary selections afterwards.
        engine.deselect("pack").unwrap();
        assert_eq!(engine.quantity("gift"), 1);
    }

    #[test]
    fn test_standalone_costs_and_unknown_currency() {
        let mut engine = engine(json!({
            "points": [{"id": "pts", "start": 5}],
            "pages": [{"layout": [
                {"type": "item", "id": "x", "cost": [
                    {"currency": "pts", "value": -2},
                    {"currency": "gems", "value": -9}
                ]}
            ]}]
        }));
        engine.select("x").unwrap();
        assert_eq!(engine.currency("pts"), Some(3));
        assert_eq!(engine.currency("gems"), None);
    }

    #[test]
    fn test_set_value_then_costs() {
        let mut engine = engine(json!({
            "points": [{"id": "pts", "start": 5}],
            "pages": [{"layout": [
                {"type": "item", "id": "reset_pts", "cost": [{"currency": "pts", "value": -1}],
                 "effects": [{"type": "set_value", "currency": "pts", "value": 20}]}
            ]}]
        }));
        engine.select("reset_pts").unwrap();
        assert_eq!(engine.currency("pts"), Some(19));
    }

    #[test]
    fn test_cost_breakdown_accessor() {
        let mut engine = engine(json!({
            "points": [{"id": "pts", "start": 0}],
            "pages": [{"layout": [
                {"type": "item", "id": "sale", "effects": [
                    {"type": "modify_cost", "tag": "spell", "mode": "multiply", "value": 0.5}
                ]},
                {"type": "item", "id": "fireball", "tags": ["spell"], "cost": [{"currency": "pts", "value": -10}]}
            ]}]
        }));
        engine.select("sale").unwrap();
        let breakdown = engine.cost_breakdown("fireball").unwrap();
        assert_eq!(breakdown[0].value, -5);
        assert_eq!(breakdown[0].modifiers, vec!["-50%"]);
        assert!(engine.cost_breakdown("ghost").is_none());
    }

    #[test]
    fn test_cleanup_cap_reports_non_convergence() {
        let settings = EngineSettings { cleanup_iteration_cap: 1, ..EngineSettings::default() };
        let project = Project::from_json_value(json!({"pages": [{"layout": [
            {"type": "item", "id": "a"},
            {"type": "item", "id": "b", "requirements": ["a"]},
            {"type": "item", "id": "c", "requirements": ["b"]}
        ]}]}))
        .unwrap();
        let mut engine = Engine::with_settings(project, settings);
        engine.select("a").unwrap();
        engine.select("b").unwrap();
        engine.select("c").unwrap();
        engine.edit_project(|p| {
            if let Some(branchbuild_core::LayoutElement::Item(a)) = p.pages[0].layout.get_mut(0) {
                a.requirements.push("!c".into());
            }
        });
        let report = engine.recalculate();
        assert!(!report.converged);
        assert_eq!(report.cleanup_passes, 1);
    }
}
