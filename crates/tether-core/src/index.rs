//! Source-location index payload
//!
//! A separate static-analysis component computes, ahead of time, which source
//! lines are executable and which symbolic type (typeref) each of them
//! compiles into. The editor pushes that payload to the bridge once after
//! `initialize`; breakpoint reconciliation cannot run without it.

use serde::{Deserialize, Serialize};

/// One entry of the source-location payload: the executable lines of one
/// typeref inside one source file. A single file can hold several typerefs
/// (inner types, triggers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineBreakpointInfo {
    pub uri: String,
    pub typeref: String,
    pub lines: Vec<u32>,
}

/// Per-uri view of the index: the typerefs defined in that file and their
/// executable lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TyperefLines {
    pub typeref: String,
    pub lines: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_breakpoint_info_deserialization() {
        let json = r#"[{"uri": "file:///project/Foo.cls", "typeref": "Foo", "lines": [3, 4, 7]}]"#;
        let infos: Vec<LineBreakpointInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].typeref, "Foo");
        assert_eq!(infos[0].lines, vec![3, 4, 7]);
    }
}
