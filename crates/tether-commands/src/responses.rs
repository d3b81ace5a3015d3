//! Response shapes of the remote debugger API
//!
//! The `state`, `frame` and `references` commands all answer with one
//! `DebuggerResponse` envelope; which branch is populated depends on the
//! command. Shapes mirror the service's camelCase JSON.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerResponse {
    #[serde(default)]
    pub state_response: Option<StateResponse>,
    #[serde(default)]
    pub frame_response: Option<FrameResponse>,
    #[serde(default)]
    pub references_response: Option<ReferencesResponse>,
}

impl DebuggerResponse {
    /// Stack frames of a `state` response; empty when the request is not
    /// paused anywhere (a valid empty result, not an error).
    pub fn stack_frames(&self) -> &[ServerFrame] {
        self.state_response
            .as_ref()
            .and_then(|r| r.state.as_ref())
            .and_then(|s| s.stack.as_ref())
            .map(|s| s.stack_frame.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub state: Option<FrameState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameResponse {
    #[serde(default)]
    pub frame: Option<FrameState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferencesResponse {
    #[serde(default)]
    pub references: Option<ReferenceSet>,
}

/// Variable view of one paused frame. The `state` command fills this for the
/// top frame, saving one round trip; deeper frames need a `frame` command.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameState {
    #[serde(default)]
    pub stack: Option<Stack>,
    #[serde(default)]
    pub locals: Option<LocalValues>,
    #[serde(default)]
    pub statics: Option<StaticValues>,
    #[serde(default)]
    pub globals: Option<GlobalValues>,
    #[serde(default)]
    pub references: Option<ReferenceSet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    #[serde(default)]
    pub stack_frame: Vec<ServerFrame>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerFrame {
    pub type_ref: String,
    pub full_name: String,
    pub line_number: u32,
    pub frame_number: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalValues {
    #[serde(default, rename = "local")]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StaticValues {
    #[serde(default, rename = "static")]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalValues {
    #[serde(default, rename = "global")]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceSet {
    #[serde(default)]
    pub references: Vec<Reference>,
}

/// A named value in a frame. `ref` is set when the value is a handle into
/// the reference graph.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    /// Empty for unnamed collection entries.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_for_messages: Option<String>,
    #[serde(default)]
    pub declared_type_ref: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default, rename = "ref")]
    pub reference: Option<i64>,
    /// Declaration slot, present for locals and fields; used for stable
    /// ordering in the variables view.
    #[serde(default)]
    pub slot: Option<u32>,
}

impl Value {
    /// Render the value the way the remote runtime's users expect: explicit
    /// `null`, strings single-quoted to distinguish `null` from `'null'`.
    pub fn display(&self) -> String {
        match &self.value {
            None | Some(serde_json::Value::Null) => "null".to_string(),
            Some(serde_json::Value::String(s)) => format!("'{s}'"),
            Some(other) => other.to_string(),
        }
    }

    /// Human-readable type name.
    pub fn type_name(&self) -> &str {
        self.name_for_messages
            .as_deref()
            .or(self.declared_type_ref.as_deref())
            .unwrap_or("")
    }
}

/// A heap object reachable through a numeric handle.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: i64,
    #[serde(default)]
    pub name_for_messages: Option<String>,
    #[serde(default)]
    pub type_ref: Option<String>,
    #[serde(default)]
    pub size: Option<i64>,
    /// Object fields (kind == "object").
    #[serde(default)]
    pub fields: Option<Vec<Value>>,
    /// Collection entries (kind == "list" or "set").
    #[serde(default)]
    pub value: Option<Vec<Value>>,
    /// Map entries (kind == "map").
    #[serde(default)]
    pub tuple: Option<Vec<Tuple>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tuple {
    #[serde(default)]
    pub key: Option<Value>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_response_with_stack() {
        let json = r#"{
            "stateResponse": {
                "state": {
                    "stack": {
                        "stackFrame": [
                            {"typeRef": "Foo", "fullName": "Foo.bar()", "lineNumber": 7, "frameNumber": 0},
                            {"typeRef": "Baz", "fullName": "Baz.run()", "lineNumber": 21, "frameNumber": 1}
                        ]
                    },
                    "locals": {"local": [{"name": "count", "value": 3, "slot": 0}]}
                }
            }
        }"#;
        let resp: DebuggerResponse = serde_json::from_str(json).unwrap();
        let frames = resp.stack_frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].type_ref, "Foo");
        assert_eq!(frames[1].line_number, 21);

        let locals = resp
            .state_response
            .unwrap()
            .state
            .unwrap()
            .locals
            .unwrap()
            .values;
        assert_eq!(locals[0].name, "count");
        assert_eq!(locals[0].display(), "3");
    }

    #[test]
    fn test_state_response_without_stack_is_empty() {
        let resp: DebuggerResponse = serde_json::from_str(r#"{"stateResponse": {}}"#).unwrap();
        assert!(resp.stack_frames().is_empty());
    }

    #[test]
    fn test_value_display_null_and_string() {
        let null_value = Value {
            name: "x".to_string(),
            ..Default::default()
        };
        assert_eq!(null_value.display(), "null");

        let string_value = Value {
            name: "s".to_string(),
            value: Some(serde_json::Value::String("null".to_string())),
            ..Default::default()
        };
        // quoted so 'null' is distinguishable from null
        assert_eq!(string_value.display(), "'null'");
    }

    #[test]
    fn test_references_response() {
        let json = r#"{
            "referencesResponse": {
                "references": {
                    "references": [
                        {"type": "object", "id": 5, "nameForMessages": "Account",
                         "fields": [{"name": "total", "value": 10}]}
                    ]
                }
            }
        }"#;
        let resp: DebuggerResponse = serde_json::from_str(json).unwrap();
        let refs = resp
            .references_response
            .unwrap()
            .references
            .unwrap()
            .references;
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, "object");
        assert_eq!(refs[0].id, 5);
    }
}
