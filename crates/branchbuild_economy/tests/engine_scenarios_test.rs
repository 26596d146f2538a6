//! Integration tests for the selection engine against a small but complete project.

use std::sync::Arc;

use branchbuild_core::Project;
use branchbuild_economy::{
    BudgetSnapshot, Engine, EngineEvent, EngineSettings, EventKind, ExpressionCache, RuleContext,
    SelectionRejected, StateSnapshot,
};
use parking_lot::Mutex;

const ACADEMY: &str = r#"{
    "meta": {"title": "Mage Academy"},
    "points": [
        {"id": "pts", "name": "Points", "start": 30},
        {"id": "gold", "name": "Gold", "start": 0}
    ],
    "pages": [
        {"id": "origins", "layout": [
            {"type": "text", "text": "Pick a school"},
            {"type": "group", "id": "school", "rules": {"max_choices": 1}, "items": [
                {"id": "fire", "tags": ["element"]},
                {"id": "ice", "tags": ["element"]}
            ]},
            {"type": "group", "id": "spells", "rules": {"budget": {"currency": "pts", "amount": 20}}, "items": [
                {"id": "spell_a", "cost": [{"currency": "pts", "value": -15}]},
                {"id": "spell_b", "cost": [{"currency": "pts", "value": -10}]}
            ]}
        ]},
        {"id": "shop", "layout": [
            {"type": "item", "id": "potion", "min_quantity": 0, "max_quantity": 3,
             "tags": ["extra"], "cost": [{"currency": "pts", "value": -1}]},
            {"type": "item", "id": "scroll", "tags": ["extra"]},
            {"type": "item", "id": "tome", "min_quantity": 1, "max_quantity": 3},
            {"type": "item", "id": "bulk", "cost": [{"currency": "pts", "formula": "-10 * count.tag('extra')"}]},
            {"type": "item", "id": "lucky", "effects": [
                {"type": "roll_dice", "currency": "gold", "min": 1, "max": 6}
            ]},
            {"type": "item", "id": "frost_ward", "incompatible": ["fire"]},
            {"type": "item", "id": "apprentice"},
            {"type": "item", "id": "adept", "requirements": ["apprentice"]},
            {"type": "item", "id": "master", "requirements": ["adept", "has('ice') || has('fire')"]},
            {"type": "item", "id": "familiar_pack", "effects": [
                {"type": "force_selection", "target_id": "owl"}
            ]},
            {"type": "item", "id": "owl", "cost": [{"currency": "gold", "value": -2}]}
        ]}
    ]
}"#;

fn engine() -> Engine {
    Engine::from_json_str(ACADEMY, EngineSettings::default().with_seed(42)).unwrap()
}

/// Every selected item passes its own gating, quantity bounds and group limits.
fn assert_consistent(engine: &Engine) {
    let state = engine.state();
    let cache = ExpressionCache::new();
    let rules = RuleContext {
        catalog: engine.catalog(),
        selected: &state.selected,
        currencies: &state.currencies,
        modifiers: engine.cost_modifiers(),
        cache: &cache,
    };
    for (id, quantity) in state.selected.iter() {
        let item = engine.find_item(id).expect("selected item exists");
        assert!(rules.can_select(item).is_ok(), "{id} is selected but fails its rules");
        assert!(quantity <= item.max_quantity(), "{id} above max quantity");
    }
    for group in engine.get_all_groups() {
        if let Some(limit) = engine.effective_max_choices(&group.id) {
            assert!(engine.get_group_qty(&group.id) <= limit, "group {} over limit", group.id);
        }
    }
    for id in state.rolls.keys() {
        assert!(state.selected.contains(id), "roll kept for unselected {id}");
    }
}

#[test]
fn test_radio_group_replaces_choice() {
    let mut engine = engine();
    engine.select("fire").unwrap();
    engine.select("ice").unwrap();
    assert_eq!(engine.quantity("fire"), 0);
    assert_eq!(engine.quantity("ice"), 1);
    assert_eq!(engine.get_group_qty("school"), 1);
    assert_eq!(
        engine.get_selected_in_group("school").iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        vec!["ice"]
    );
}

#[test]
fn test_quantity_bounds() {
    let mut engine = engine();
    assert_eq!(
        engine.deselect("potion"),
        Err(SelectionRejected::AtMinQuantity { item: "potion".into(), min: 0 })
    );
    for expected in 1..=3 {
        assert_eq!(engine.select("potion"), Ok(expected));
    }
    assert_eq!(
        engine.select("potion"),
        Err(SelectionRejected::AtMaxQuantity { item: "potion".into(), max: 3 })
    );
    assert_eq!(engine.currency("pts"), Some(27));
    assert_eq!(engine.deselect("potion"), Ok(2));
    assert_eq!(engine.currency("pts"), Some(28));
}

#[test]
fn test_mandatory_item_cannot_be_removed() {
    let mut engine = engine();
    assert_eq!(engine.select("tome"), Ok(1));
    assert_eq!(
        engine.deselect("tome"),
        Err(SelectionRejected::AtMinQuantity { item: "tome".into(), min: 1 })
    );
    assert_eq!(engine.quantity("tome"), 1);
    assert_eq!(engine.select("tome"), Ok(2));
    assert_eq!(engine.select("tome"), Ok(3));
    assert!(engine.select("tome").is_err());
    assert_eq!(engine.quantity("tome"), 3);
}

#[test]
fn test_budget_absorbs_group_spend() {
    let mut engine = engine();
    engine.select("spell_a").unwrap();
    assert_eq!(engine.currency("pts"), Some(30));
    assert_eq!(
        engine.state().budgets["spells"],
        BudgetSnapshot { total: 20, used: 15, remaining: 5 }
    );

    engine.select("spell_b").unwrap();
    assert_eq!(engine.currency("pts"), Some(25));
    assert_eq!(
        engine.state().budgets["spells"],
        BudgetSnapshot { total: 20, used: 20, remaining: 0 }
    );
}

#[test]
fn test_formula_cost_counts_tags() {
    let mut engine = engine();
    engine.select("potion").unwrap();
    engine.select("scroll").unwrap();
    engine.select("bulk").unwrap();
    // potion -1, bulk -10 * 2
    assert_eq!(engine.currency("pts"), Some(9));
    assert_eq!(engine.cost_breakdown("bulk").unwrap()[0].value, -20);
}

#[test]
fn test_dice_roll_persists_until_reset() {
    let mut engine = engine();
    engine.select("lucky").unwrap();
    let rolled = engine.roll("lucky").expect("rolled on first select");
    assert!((1..=6).contains(&rolled));
    assert_eq!(engine.currency("gold"), Some(rolled));

    engine.recalculate();
    engine.select("fire").unwrap();
    assert_eq!(engine.roll("lucky"), Some(rolled));
    assert_eq!(engine.currency("gold"), Some(rolled));

    engine.reset();
    assert_eq!(engine.roll("lucky"), None);
    assert_eq!(engine.currency("gold"), Some(0));
}

#[test]
fn test_same_seed_same_rolls() {
    let mut first = engine();
    let mut second = engine();
    first.select("lucky").unwrap();
    second.select("lucky").unwrap();
    assert_eq!(first.roll("lucky"), second.roll("lucky"));
}

#[test]
fn test_incompatible_blocks_selection() {
    let mut engine = engine();
    engine.select("fire").unwrap();
    assert_eq!(
        engine.select("frost_ward"),
        Err(SelectionRejected::Incompatible("frost_ward".into()))
    );
    assert_eq!(engine.quantity("frost_ward"), 0);
}

#[test]
fn test_cleanup_cascades_through_requirements() {
    let mut engine = engine();
    engine.select("ice").unwrap();
    engine.select("apprentice").unwrap();
    engine.select("adept").unwrap();
    engine.select("master").unwrap();
    assert_eq!(
        engine.select("master"),
        Err(SelectionRejected::AtMaxQuantity { item: "master".into(), max: 1 })
    );

    engine.deselect("apprentice").unwrap();
    assert_eq!(engine.quantity("adept"), 0);
    assert_eq!(engine.quantity("master"), 0);
    assert_eq!(engine.quantity("ice"), 1);
    assert!(engine.last_report().converged);
    assert_eq!(engine.last_report().removed, vec!["adept", "master"]);
}

#[test]
fn test_formula_requirement_is_cleaned_up() {
    let mut engine = engine();
    engine.select("apprentice").unwrap();
    engine.select("adept").unwrap();
    assert_eq!(
        engine.check_select("master"),
        Err(SelectionRejected::RequirementsUnmet("master".into()))
    );
    engine.select("fire").unwrap();
    engine.select("master").unwrap();
    engine.deselect("fire").unwrap();
    assert_eq!(engine.quantity("master"), 0);
}

#[test]
fn test_forced_selection() {
    let mut engine = engine();
    engine.select("familiar_pack").unwrap();
    assert_eq!(engine.quantity("owl"), 1);
    assert_eq!(engine.currency("gold"), Some(-2));
    assert_eq!(engine.last_report().forced, vec!["owl"]);
}

#[test]
fn test_recalculate_is_idempotent() {
    let mut engine = engine();
    engine.select("spell_a").unwrap();
    engine.select("potion").unwrap();
    engine.select("lucky").unwrap();
    let before = engine.state().clone();
    engine.recalculate();
    engine.recalculate();
    assert_eq!(engine.state(), &before);
}

#[test]
fn test_invariants_hold_over_sequence() {
    let mut engine = engine();
    let script = [
        "fire", "frost_ward", "apprentice", "adept", "master", "ice", "potion", "potion", "spell_a",
        "spell_b", "lucky", "apprentice", "familiar_pack", "owl", "bulk", "fire", "adept", "master",
        "scroll", "potion",
    ];
    for id in script {
        let _ = engine.toggle(id);
        assert_consistent(&engine);
    }
    engine.reset();
    assert!(engine.state().selected.is_empty());
    assert_consistent(&engine);
}

#[test]
fn test_build_code_round_trip() {
    let mut engine = engine();
    engine.select("ice").unwrap();
    engine.select("potion").unwrap();
    engine.select("potion").unwrap();
    engine.select("apprentice").unwrap();
    let code = engine.build_code();
    assert_eq!(code, "ice, potion, potion, apprentice");

    let expected = engine.state().currencies.clone();
    engine.reset();
    assert_eq!(engine.apply_build_code(&code), 4);
    assert_eq!(engine.quantity("potion"), 2);
    assert_eq!(engine.state().currencies, expected);
}

#[test]
fn test_build_code_skips_unknown_and_cleans_invalid() {
    let mut engine = engine();
    let loaded = engine.apply_build_code("adept\nghost,  fire ice");
    assert_eq!(loaded, 3);
    // adept lacks apprentice; fire and ice share a one-choice group.
    assert_eq!(engine.quantity("adept"), 0);
    assert_eq!(engine.get_group_qty("school"), 1);
    assert_eq!(engine.quantity("ice"), 0);
    assert_consistent(&engine);
}

#[test]
fn test_snapshot_round_trip() {
    let mut engine = engine();
    engine.select("lucky").unwrap();
    engine.select("potion").unwrap();
    let json = engine.export_state_json().unwrap();
    let rolled = engine.roll("lucky");

    let mut restored = Engine::from_json_str(ACADEMY, EngineSettings::default()).unwrap();
    restored.import_state_json(&json).unwrap();
    assert_eq!(restored.roll("lucky"), rolled);
    assert_eq!(restored.state().currencies, engine.state().currencies);
    assert_eq!(restored.build_code(), engine.build_code());
}

#[test]
fn test_legacy_snapshot_import() {
    let mut engine = engine();
    let snapshot = StateSnapshot::from_json_str(r#"{"selected": ["fire", "potion", "ghost"]}"#).unwrap();
    let report = engine.import_state(snapshot);
    assert_eq!(engine.quantity("fire"), 1);
    assert_eq!(engine.quantity("potion"), 1);
    assert!(!engine.state().selected.contains("ghost"));
    assert_eq!(report.removed, vec!["ghost"]);
    assert_eq!(engine.currency("pts"), Some(29));
}

#[test]
fn test_events_fire_in_order() {
    let mut engine = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    for kind in [EventKind::Selection, EventKind::Recalculate, EventKind::Reset, EventKind::ConfigLoaded] {
        let seen = Arc::clone(&seen);
        engine.on(kind, move |event: &EngineEvent| seen.lock().push(event.kind()));
    }

    engine.select("fire").unwrap();
    engine.deselect("fire").unwrap();
    engine.reset();
    engine.load_config(Project::from_json_str(ACADEMY).unwrap());

    assert_eq!(
        *seen.lock(),
        vec![
            EventKind::Recalculate,
            EventKind::Selection,
            EventKind::Recalculate,
            EventKind::Selection,
            EventKind::Recalculate,
            EventKind::Reset,
            EventKind::ConfigLoaded,
            EventKind::Recalculate,
        ]
    );
}

#[test]
fn test_selection_event_payload() {
    let mut engine = engine();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.on(EventKind::Selection, move |event| sink.lock().push(event.clone()));
    engine.select("potion").unwrap();
    engine.select("potion").unwrap();
    assert_eq!(
        seen.lock().last(),
        Some(&EngineEvent::Selection { item_id: "potion".into(), quantity: 2, selected: true })
    );
}

#[test]
fn test_lookups() {
    let engine = engine();
    assert_eq!(engine.find_group_for_item("fire").map(|g| g.id.as_str()), Some("school"));
    assert!(engine.find_group_for_item("potion").is_none());
    assert_eq!(
        engine.find_page_for_item("potion").and_then(|p| p.id.as_deref()),
        Some("shop")
    );
    assert_eq!(engine.get_all_items_in_group("spells").len(), 2);
    assert_eq!(engine.get_all_items().len(), 15);
    assert_eq!(engine.effective_max_choices("school"), Some(1));
    assert_eq!(engine.effective_max_choices("spells"), None);
}

const GIFTS: &str = r#"{
    "points": [{"id": "pts", "start": 0}],
    "pages": [{"layout": [
        {"type": "group", "id": "slot", "rules": {"max_choices": 1}, "items": [
            {"id": "sword"}, {"id": "prize"}
        ]},
        {"type": "item", "id": "blocker"},
        {"type": "item", "id": "pack", "effects": [
            {"type": "force_selection", "target_id": "gift"}
        ]},
        {"type": "item", "id": "gift", "incompatible": ["blocker"]},
        {"type": "item", "id": "raffle", "effects": [
            {"type": "force_selection", "target_id": "prize"}
        ]}
    ]}]
}"#;

#[test]
fn test_forced_target_failing_its_rules_is_not_added() {
    let mut engine = Engine::from_json_str(GIFTS, EngineSettings::default()).unwrap();
    engine.select("blocker").unwrap();
    engine.select("pack").unwrap();

    assert_eq!(engine.quantity("gift"), 0);
    assert_eq!(engine.quantity("blocker"), 1);
    assert_eq!(engine.quantity("pack"), 1);
    let report = engine.last_report();
    assert!(report.converged);
    assert_eq!(report.cleanup_passes, 1);
    assert!(report.forced.is_empty());
    assert_consistent(&engine);
}

#[test]
fn test_forced_target_trimmed_by_cleanup_stays_out() {
    let mut engine = Engine::from_json_str(GIFTS, EngineSettings::default()).unwrap();
    engine.select("sword").unwrap();
    engine.select("raffle").unwrap();

    assert_eq!(engine.quantity("prize"), 0);
    assert_eq!(engine.quantity("sword"), 1);
    let report = engine.last_report();
    assert!(report.converged);
    assert_eq!(report.cleanup_passes, 2);
    assert_eq!(report.removed, vec!["prize"]);
    assert_consistent(&engine);

    let again = engine.recalculate();
    assert!(again.converged);
    assert_eq!(engine.quantity("prize"), 0);

    engine.deselect("sword").unwrap();
    assert_eq!(engine.quantity("prize"), 1);
}

#[test]
fn test_huge_costs_saturate() {
    let mut engine = Engine::from_json_str(
        r#"{
            "points": [{"id": "pts", "start": 0}, {"id": "gold", "start": 0}],
            "pages": [{"layout": [
                {"type": "item", "id": "x", "cost": [{"currency": "pts", "formula": "Math.pow(10, 30)"}]},
                {"type": "group", "id": "vault", "rules": {"budget": {"currency": "gold", "amount": 5}}, "items": [
                    {"id": "y", "max_quantity": 2, "cost": [{"currency": "gold", "formula": "-Math.pow(10, 30)"}]}
                ]}
            ]}]
        }"#,
        EngineSettings::default(),
    )
    .unwrap();

    engine.select("x").unwrap();
    assert_eq!(engine.currency("pts"), Some(i64::MAX));

    engine.select("y").unwrap();
    engine.select("y").unwrap();
    assert_eq!(engine.quantity("y"), 2);
    assert_eq!(engine.currency("gold"), Some(i64::MIN + 5));
    assert_eq!(engine.state().budgets["vault"], BudgetSnapshot { total: 5, used: 5, remaining: 0 });
    assert_eq!(engine.recalculate().cleanup_passes, 1);
}
