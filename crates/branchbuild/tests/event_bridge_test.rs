//! Integration test for consuming engine events on another thread.

use std::thread;

use branchbuild::{attach, Engine, EngineEvent, EngineSettings, EventKind, Project};

fn temp_project_path() -> std::path::PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_event_bridge_{id}.json"))
}

const SHOP: &str = r#"{
    "points": [{"id": "gold", "start": 10}],
    "pages": [{"layout": [
        {"type": "group", "id": "weapons", "rules": {"max_choices": 1}, "items": [
            {"id": "sword", "cost": [{"currency": "gold", "value": -4}]},
            {"id": "axe", "cost": [{"currency": "gold", "value": -6}]}
        ]}
    ]}]
}"#;

#[test]
fn test_balances_reach_consumer_thread() {
    let path = temp_project_path();
    std::fs::write(&path, SHOP).unwrap();
    let project = Project::from_path(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let mut engine = Engine::with_settings(project, EngineSettings::default());
    let rx = attach(&mut engine, &[EventKind::Recalculate], 64);

    engine.select("sword").unwrap();
    engine.select("axe").unwrap();

    let consumer = thread::spawn(move || {
        rx.drain()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Recalculate { state, .. } => Some(state.currency("gold")),
                _ => None,
            })
            .collect::<Vec<_>>()
    });

    assert_eq!(consumer.join().unwrap(), vec![6, 4]);
    assert_eq!(engine.quantity("sword"), 0);
}
