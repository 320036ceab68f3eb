mod common;

use blockc::{DropdownOption, VirtualInstanceRef};
use common::*;

fn name_of(ws: &MemoryWorkspace, id: &BlockId) -> Option<String> {
    ws.field_value(id, "NAME")
}

fn labels(options: &[DropdownOption]) -> Vec<&str> {
    options.iter().map(|o| o.label.as_str()).collect()
}

#[test]
fn test_constructors_are_named_in_sequence() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let a = create(&mut compiler, &mut ws, "nvs_open");
    let b = create(&mut compiler, &mut ws, "nvs_open");
    let c = create(&mut compiler, &mut ws, "nvs_open");

    assert_eq!(name_of(&ws, &a).as_deref(), Some("nvs_0"));
    assert_eq!(name_of(&ws, &b).as_deref(), Some("nvs_1"));
    assert_eq!(name_of(&ws, &c).as_deref(), Some("nvs_2"));
}

#[test]
fn test_duplicate_rename_is_reverted() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let _a = create(&mut compiler, &mut ws, "nvs_open");
    let b = create(&mut compiler, &mut ws, "nvs_open");
    let _c = create(&mut compiler, &mut ws, "nvs_open");

    let report = edit(&mut compiler, &mut ws, &b, "NAME", "nvs_0");
    assert_eq!(report.names, vec![(b.clone(), NameChange::Reverted("nvs_1".to_string()))]);
    assert_eq!(name_of(&ws, &b).as_deref(), Some("nvs_1"));

    let report = edit(&mut compiler, &mut ws, &b, "NAME", "settings");
    assert_eq!(report.names, vec![(b.clone(), NameChange::Unchanged)]);
    assert_eq!(name_of(&ws, &b).as_deref(), Some("settings"));
}

#[test]
fn test_next_name_follows_highest_suffix() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let a = create(&mut compiler, &mut ws, "nvs_open");
    edit(&mut compiler, &mut ws, &a, "NAME", "nvs_5");
    let b = create(&mut compiler, &mut ws, "nvs_open");
    assert_eq!(name_of(&ws, &b).as_deref(), Some("nvs_6"));
}

#[test]
fn test_pasted_copy_gets_a_fresh_name() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let _original = create(&mut compiler, &mut ws, "nvs_open");

    let copy = ws.add_block("nvs_open");
    ws.set_field(&copy, "NAME", "nvs_0");
    let report = compiler.handle_event(&mut ws, &WorkspaceEvent::Create { ids: vec![copy.clone()] }, None);
    assert_eq!(report.names, vec![(copy.clone(), NameChange::Assigned("nvs_1".to_string()))]);
}

/// Dropped from the palette: the editor fills the field's default text.
fn dropped(compiler: &mut BlockCompiler, ws: &mut MemoryWorkspace) -> (BlockId, blockc::EventReport) {
    let id = ws.add_block("nvs_open");
    ws.set_field(&id, "NAME", "nvs_?");
    let report = compiler.handle_event(ws, &WorkspaceEvent::Create { ids: vec![id.clone()] }, None);
    (id, report)
}

#[test]
fn test_unassigned_placeholder_is_replaced() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let (a, report) = dropped(&mut compiler, &mut ws);
    assert_eq!(report.names, vec![(a.clone(), NameChange::Assigned("nvs_0".to_string()))]);
    let (b, _) = dropped(&mut compiler, &mut ws);
    let (c, _) = dropped(&mut compiler, &mut ws);
    assert_eq!(name_of(&ws, &b).as_deref(), Some("nvs_1"));
    assert_eq!(name_of(&ws, &c).as_deref(), Some("nvs_2"));

    let report = edit(&mut compiler, &mut ws, &c, "NAME", "nvs_0");
    assert_eq!(report.names, vec![(c.clone(), NameChange::Reverted("nvs_2".to_string()))]);
    assert_eq!(name_of(&ws, &a).as_deref(), Some("nvs_0"));
}

#[test]
fn test_saturated_suffix_falls_back_to_lowest_free() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let _a = create(&mut compiler, &mut ws, "nvs_open");
    let b = create(&mut compiler, &mut ws, "nvs_open");
    edit(&mut compiler, &mut ws, &b, "NAME", &format!("nvs_{}", u64::MAX));

    let (c, _) = dropped(&mut compiler, &mut ws);
    assert_eq!(name_of(&ws, &c).as_deref(), Some("nvs_1"));
}

#[test]
fn test_moving_an_unnamed_constructor_names_it() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let id = ws.add_block("nvs_open");
    ws.set_field(&id, "NAME", "nvs_?");

    let report = moved(&mut compiler, &mut ws, &id);
    assert_eq!(report.names, vec![(id.clone(), NameChange::Assigned("nvs_0".to_string()))]);

    let report = moved(&mut compiler, &mut ws, &id);
    assert!(report.names.is_empty());
    assert_eq!(name_of(&ws, &id).as_deref(), Some("nvs_0"));
}

#[test]
fn test_renamed_constructor_leaves_stale_selection_warning() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let store = create(&mut compiler, &mut ws, "nvs_open");
    let commit = create(&mut compiler, &mut ws, "nvs_commit");
    let report = edit(&mut compiler, &mut ws, &commit, "STORE", "nvs_0");
    assert_eq!(report.invalid_selections, 0);
    assert!(ws.warnings(&commit).is_empty());

    let report = edit(&mut compiler, &mut ws, &store, "NAME", "settings");
    assert_eq!(report.invalid_selections, 1);
    assert_eq!(
        ws.warnings(&commit),
        vec!["Instance 'nvs_0' of nvs does not exist".to_string()]
    );
}

#[test]
fn test_instance_options_sort_naturally() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let a = create(&mut compiler, &mut ws, "nvs_open");
    let _b = create(&mut compiler, &mut ws, "nvs_open");
    let _c = create(&mut compiler, &mut ws, "nvs_open");
    edit(&mut compiler, &mut ws, &a, "NAME", "nvs_10");
    let commit = create(&mut compiler, &mut ws, "nvs_commit");

    let options = compiler.instance_options(&ws, &commit, "STORE", None).unwrap();
    assert_eq!(labels(&options), vec!["nvs_1", "nvs_2", "nvs_10"]);
}

#[test]
fn test_missing_instances_fall_back_to_sentinel() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let commit = ws.add_block("nvs_commit");
    let report = compiler.handle_event(&mut ws, &WorkspaceEvent::Create { ids: vec![commit.clone()] }, None);

    let options = compiler.instance_options(&ws, &commit, "STORE", None).unwrap();
    assert_eq!(options, vec![DropdownOption::new("No instance available", "")]);
    assert_eq!(report.invalid_selections, 1);
    assert_eq!(ws.warnings(&commit), vec!["No nvs instance selected".to_string()]);
}

#[test]
fn test_stale_and_restoring_values_are_listed() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let _a = create(&mut compiler, &mut ws, "nvs_open");
    let commit = create(&mut compiler, &mut ws, "nvs_commit");
    ws.set_field(&commit, "STORE", "gone");

    let options = compiler
        .instance_options(&ws, &commit, "STORE", Some("later"))
        .unwrap();
    assert_eq!(labels(&options), vec!["gone", "later", "nvs_0"]);
}

#[test]
fn test_instance_options_reject_plain_fields() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let a = create(&mut compiler, &mut ws, "nvs_open");
    let err = compiler.instance_options(&ws, &a, "NAME", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CodeGeneration);
}

#[test]
fn test_virtual_instance_survives_provider_rename() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let start = create(&mut compiler, &mut ws, "on_start");
    let robot = create(&mut compiler, &mut ws, "robutek_create");
    let drive = create(&mut compiler, &mut ws, "pair_forward");
    ws.connect_input(&start, "DO", &robot);
    ws.connect_next(&robot, &drive);
    moved(&mut compiler, &mut ws, &robot);
    assert_eq!(name_of(&ws, &robot).as_deref(), Some("robutek2_0"));

    let options = compiler.instance_options(&ws, &drive, "PAIR", None).unwrap();
    assert_eq!(labels(&options), vec!["robutek2_0.differential"]);
    let encoded = options[0].value.clone();
    assert_eq!(
        VirtualInstanceRef::decode(&encoded),
        Some(VirtualInstanceRef::new("robutek_create", robot.clone(), "differential"))
    );

    edit(&mut compiler, &mut ws, &drive, "PAIR", &encoded);
    assert!(ws.warnings(&drive).is_empty());

    edit(&mut compiler, &mut ws, &robot, "NAME", "robutek2_main");
    let code = compiler.compile_workspace(&ws).unwrap();
    assert!(code.contains("  const robutek2_main = new Robutek();\n  robutek2_main.differential.forward();\n"));
    assert!(code.starts_with("import { Robutek } from \"robutek\";\n\n"));

    let options = compiler.instance_options(&ws, &drive, "PAIR", None).unwrap();
    assert_eq!(labels(&options), vec!["robutek2_main.differential"]);
    assert_eq!(options[0].value, encoded);
}

#[test]
fn test_deleted_provider_leaves_warning() {
    let mut compiler = loaded_compiler();
    let mut ws = MemoryWorkspace::new();
    let start = create(&mut compiler, &mut ws, "on_start");
    let robot = create(&mut compiler, &mut ws, "robutek_create");
    let drive = create(&mut compiler, &mut ws, "pair_forward");
    ws.connect_input(&start, "DO", &robot);
    ws.connect_next(&robot, &drive);
    moved(&mut compiler, &mut ws, &robot);
    let encoded = VirtualInstanceRef::new("robutek_create", robot.clone(), "differential").encode();
    edit(&mut compiler, &mut ws, &drive, "PAIR", &encoded);

    ws.disconnect(&drive);
    ws.connect_input(&start, "DO", &drive);
    let removed = ws.delete(&robot);
    let report = compiler.handle_event(&mut ws, &WorkspaceEvent::Delete { ids: removed }, None);

    assert_eq!(report.invalid_selections, 1);
    assert_eq!(
        ws.warnings(&drive),
        vec!["Selected motor_pair instance no longer exists".to_string()]
    );
    assert_eq!(compiler.instances().resolve_virtual_instance(&ws, &encoded), None);

    let options = compiler.instance_options(&ws, &drive, "PAIR", None).unwrap();
    assert_eq!(options, vec![DropdownOption::new("differential", encoded)]);
}
