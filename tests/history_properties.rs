//! Property tests for history, autoscale and parsing laws

mod common;

use common::assert_float_eq;
use common::builders::DataItemBuilder;
use graphs_core::expression::evaluate_over;
use graphs_core::history::{HistoryEngine, MAX_HISTORY_STATES};
use graphs_core::parsers::columns::{parse_columns, ColumnsOptions};
use graphs_core::{Direction, ProjectEngine, ProjectModel};
use proptest::prelude::*;
use serde_json::json;
use std::f64::consts::PI;

/// One user action against the engine
#[derive(Debug, Clone)]
enum Action {
    Add(f64),
    Rename(usize),
    Swap,
    Delete,
    Title(u8),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (-100.0f64..100.0).prop_map(Action::Add),
        (0usize..4).prop_map(Action::Rename),
        Just(Action::Swap),
        Just(Action::Delete),
        any::<u8>().prop_map(Action::Title),
    ]
}

fn perform(engine: &mut ProjectEngine, action: &Action) {
    let count = engine.items().len();
    match action {
        Action::Add(offset) => {
            let item = DataItemBuilder::new("item")
                .data(&[*offset, offset + 1.0], &[0.0, 1.0])
                .build();
            engine.add_items(vec![item]).unwrap();
        }
        Action::Rename(n) if count > 0 => {
            let uuid = engine.items()[n % count].uuid;
            engine
                .set_item_property(uuid, "name", json!(format!("renamed {}", n)))
                .unwrap();
        }
        Action::Swap if count > 1 => engine.change_position(0, count - 1).unwrap(),
        Action::Delete if count > 0 => {
            let uuid = engine.items()[count - 1].uuid;
            engine.delete_items(&[uuid]).unwrap();
        }
        Action::Title(n) => engine
            .set_figure_setting("title", json!(format!("title {}", n)))
            .unwrap(),
        _ => {}
    }
}

proptest! {
    #[test]
    fn test_undo_redo_idempotence(actions in proptest::collection::vec(action(), 1..12)) {
        let mut engine = ProjectEngine::default();
        for action in &actions {
            perform(&mut engine, action);
        }
        prop_assume!(engine.can_undo());
        let final_state = engine.model().clone();

        engine.undo().unwrap();
        let before_redo = engine.model().clone();
        engine.redo().unwrap();
        prop_assert_eq!(engine.model(), &final_state);

        engine.undo().unwrap();
        prop_assert_eq!(engine.model(), &before_redo);
    }

    #[test]
    fn test_history_bounds(commits in (MAX_HISTORY_STATES + 1)..(MAX_HISTORY_STATES + 40)) {
        let mut model = ProjectModel::default();
        let mut history = HistoryEngine::new(&model, MAX_HISTORY_STATES);
        for n in 0..commits {
            model.figure.title = format!("title {}", n);
            history.record_figure_changed("title", &model.figure);
            prop_assert!(history.add_history_state(&model, None));
            prop_assert_eq!(history.position(), -1);
        }
        prop_assert_eq!(history.states().len(), MAX_HISTORY_STATES);
    }

    #[test]
    fn test_undo_everything_reaches_empty_project(
        actions in proptest::collection::vec(action(), 1..10)
    ) {
        let mut engine = ProjectEngine::default();
        let initial = engine.model().items.clone();
        for action in &actions {
            perform(&mut engine, action);
        }
        while engine.can_undo() {
            engine.undo().unwrap();
        }
        prop_assert_eq!(&engine.model().items, &initial);
        prop_assert_eq!(engine.figure().title.as_str(), "");
    }
}

#[test]
fn test_batch_undoes_in_one_step() {
    let mut engine = ProjectEngine::default();
    let items = (0..3)
        .map(|n| DataItemBuilder::new(&format!("item {}", n)).build())
        .collect();
    engine.add_items(items).unwrap();
    assert_eq!(engine.items().len(), 3);
    engine.undo().unwrap();
    assert!(engine.items().is_empty());
    assert!(!engine.can_undo());
}

#[test]
fn test_commit_truncates_redo() {
    let mut engine = ProjectEngine::default();
    engine.add_items(vec![DataItemBuilder::new("a").build()]).unwrap();
    engine.add_items(vec![DataItemBuilder::new("b").build()]).unwrap();
    engine.undo().unwrap();
    engine.undo().unwrap();
    assert!(engine.can_redo());

    engine.add_items(vec![DataItemBuilder::new("c").build()]).unwrap();
    assert!(!engine.can_redo());
    assert_eq!(engine.history().states().len(), 2);
    engine.undo().unwrap();
    assert!(engine.items().is_empty());
}

#[test]
fn test_autoscale_widens_and_restores() {
    let mut engine = ProjectEngine::default();
    engine
        .add_items(vec![DataItemBuilder::new("a")
            .data(&[0.0, 1.0], &[0.0, 1.0])
            .build()])
        .unwrap();
    let before = engine.figure().axis(Direction::Bottom).clone();

    let ids = engine
        .add_items(vec![DataItemBuilder::new("wide")
            .data(&[-5.0, 8.0], &[0.0, 1.0])
            .build()])
        .unwrap();
    let widened = engine.figure().axis(Direction::Bottom).clone();
    assert!(widened.min < before.min);
    assert!(widened.max > before.max);

    engine.delete_items(&ids).unwrap();
    let restored = engine.figure().axis(Direction::Bottom);
    assert_float_eq(restored.min, before.min, 1e-9);
    assert_float_eq(restored.max, before.max, 1e-9);
}

#[test]
fn test_column_parser_european_decimals() {
    let options = ColumnsOptions {
        separator: ",".to_string(),
        ..ColumnsOptions::default()
    };
    let columns = parse_columns("0,1\t0,2\n1,0\t1,5\n", &options).unwrap();
    assert_eq!(columns.xdata, vec![0.1, 1.0]);
    assert_eq!(columns.ydata, vec![0.2, 1.5]);
}

#[test]
fn test_expression_preprocessing() {
    let values = evaluate_over("3sin(x)^2 + d(90)", &[PI / 2.0]).unwrap();
    assert_float_eq(values[0], 3.0 + PI / 2.0, 1e-9);
}
