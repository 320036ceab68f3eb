#![allow(dead_code, unused_imports)]

pub use blockc::{
    BlockCompiler, BlockId, CompileError, CompilerConfig, ErrorKind, MemoryWorkspace, Messages, NameChange,
    RawDocument, ToolboxView, Workspace, WorkspaceEvent,
};
use serde_json::{json, Value};

/// Route `tracing` output through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn core_doc() -> Value {
    json!({
        "category": "basic",
        "name": "Basic",
        "priority": 0,
        "color": 120,
        "contents": [
            {
                "type": "on_start",
                "message": "on start $[DO]",
                "args": [{"name": "DO", "type": "input_statement"}],
                "programStart": true,
                "code": "async function main() {\n$[DO]}"
            },
            {
                "type": "number",
                "message": "$[N]",
                "args": [{"name": "N", "type": "field_number", "value": 0}],
                "output": "Number",
                "code": "$[N]"
            },
            {
                "type": "arith",
                "message": "$[A] $[OP] $[B]",
                "args": [
                    {"name": "A", "type": "input_value", "check": "Number", "order": "multiplication"},
                    {"name": "OP", "type": "field_dropdown", "options": [["*", "*"], ["/", "/"]]},
                    {"name": "B", "type": "input_value", "check": "Number", "order": "multiplication"}
                ],
                "output": "Number",
                "order": "multiplication",
                "code": "$[A] $[OP] $[B]"
            },
            {
                "type": "sum",
                "message": "$[A] + $[B]",
                "args": [
                    {"name": "A", "type": "input_value", "check": "Number", "order": "addition"},
                    {"name": "B", "type": "input_value", "check": "Number", "order": "addition"}
                ],
                "output": "Number",
                "order": "addition",
                "code": "$[A] + $[B]"
            }
        ]
    })
}

pub fn motors_doc() -> Value {
    json!({
        "category": "motors",
        "name": "%{BKY_MOTORS}",
        "priority": 1,
        "imports": ["import * as motor from \"motor\";"],
        "contents": [
            {"kind": "label", "text": "%{BKY_MOTORS}"},
            {
                "type": "motor_spin",
                "message": "spin $[SPEED]",
                "args": [{"name": "SPEED", "type": "input_value", "check": "Number"}],
                "previous": true,
                "next": true,
                "code": "motor.spin($[SPEED]);"
            },
            {
                "type": "motor_spin_now",
                "message": "spin now $[SPEED]",
                "args": [{"name": "SPEED", "type": "input_value", "check": "Number"}],
                "code": "motor.spin($[SPEED]);"
            }
        ]
    })
}

pub fn nvs_doc() -> Value {
    json!({
        "category": "storage",
        "name": "Storage",
        "imports": ["import * as nvs from \"nvs\";"],
        "contents": [
            {
                "type": "nvs_open",
                "message": "open storage $[NAME]",
                "args": [{"name": "NAME", "type": "field_input", "text": "nvs_?"}],
                "constructs": "nvs",
                "previous": true,
                "next": true,
                "code": "const $[NAME] = nvs.open(\"$[NAME]\");"
            },
            {
                "type": "nvs_commit",
                "message": "commit $[STORE]",
                "args": [{"name": "STORE", "type": "field_dropdown", "instanceOf": "nvs"}],
                "previous": true,
                "next": true,
                "code": "$[STORE].commit();"
            }
        ]
    })
}

pub fn robutek_doc() -> Value {
    json!({
        "category": "robutek",
        "name": "Robutek",
        "imports": ["import { Robutek } from \"robutek\";"],
        "contents": [
            {
                "type": "robutek_create",
                "message": "robot $[NAME]",
                "args": [{"name": "NAME", "type": "field_input", "text": "robutek2_?"}],
                "constructs": {
                    "system": "robutek",
                    "prefix": "robutek2_",
                    "virtualInstances": [
                        {"instanceOf": "motor_pair", "name": "differential", "connection": "$[NAME].differential"}
                    ]
                },
                "previous": true,
                "next": true,
                "code": "const $[NAME] = new Robutek();"
            },
            {
                "type": "pair_forward",
                "message": "drive $[PAIR] forward",
                "args": [{"name": "PAIR", "type": "field_dropdown", "instanceOf": "motor_pair"}],
                "previous": true,
                "next": true,
                "code": "$[PAIR].forward();"
            }
        ]
    })
}

pub fn messages() -> Messages {
    [("MOTORS".to_string(), "Motors".to_string())].into_iter().collect()
}

pub fn documents() -> Vec<RawDocument> {
    vec![
        RawDocument::new("core.json", core_doc()),
        RawDocument::new("motors.json", motors_doc()),
        RawDocument::new("nvs.json", nvs_doc()),
        RawDocument::new("robutek.json", robutek_doc()),
    ]
}

pub fn loaded_compiler() -> BlockCompiler {
    init_tracing();
    let mut compiler = BlockCompiler::new(CompilerConfig::default()).with_messages(messages());
    compiler.load_libraries(&documents()).expect("fixture libraries are valid");
    compiler
}

/// Add a block the way the editor does: create it, then report the event.
pub fn create(compiler: &mut BlockCompiler, ws: &mut MemoryWorkspace, block_type: &str) -> BlockId {
    let id = ws.add_block(block_type);
    compiler.handle_event(ws, &WorkspaceEvent::Create { ids: vec![id.clone()] }, None);
    id
}

/// Edit a field the way the editor does and report the change.
pub fn edit(
    compiler: &mut BlockCompiler,
    ws: &mut MemoryWorkspace,
    id: &BlockId,
    field: &str,
    value: &str,
) -> blockc::EventReport {
    let old_value = ws.field_value(id, field);
    ws.set_field(id, field, value);
    compiler.handle_event(
        ws,
        &WorkspaceEvent::Change {
            id: id.clone(),
            field: field.to_string(),
            old_value,
            new_value: Some(value.to_string()),
        },
        None,
    )
}

pub fn moved(compiler: &mut BlockCompiler, ws: &mut MemoryWorkspace, id: &BlockId) -> blockc::EventReport {
    compiler.handle_event(ws, &WorkspaceEvent::Move { id: id.clone() }, None)
}
