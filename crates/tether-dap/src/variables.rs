//! Variable and frame handle management
//!
//! DAP identifies frames and variable containers by numeric handles that the
//! adapter mints. Handles are valid only while the target is paused; every
//! resume resets them, so a stale reference from the client misses instead of
//! reading another request's data.

use std::collections::HashMap;

const HANDLE_START: i64 = 1_000;

/// Monotonic handle allocator.
#[derive(Debug)]
pub struct Handles<T> {
    next: i64,
    values: HashMap<i64, T>,
}

impl<T> Default for Handles<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Handles<T> {
    pub fn new() -> Self {
        Self {
            next: HANDLE_START,
            values: HashMap::new(),
        }
    }

    pub fn create(&mut self, value: T) -> i64 {
        let handle = self.next;
        self.next += 1;
        self.values.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: i64) -> Option<&T> {
        self.values.get(&handle)
    }

    pub fn reset(&mut self) {
        self.next = HANDLE_START;
        self.values.clear();
    }
}

/// What a stack frame handle points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub request_id: String,
    pub frame_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Local,
    Static,
    Global,
}

impl ScopeKind {
    pub fn label(self) -> &'static str {
        match self {
            ScopeKind::Local => "Local",
            ScopeKind::Static => "Static",
            ScopeKind::Global => "Global",
        }
    }
}

/// What a variablesReference handle expands into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableContainer {
    /// One scope of one frame; expansion fetches the frame's variables.
    Scope {
        kind: ScopeKind,
        request_id: String,
        frame_number: u32,
    },
    /// A heap object handle; expansion dereferences it through the
    /// references command.
    Reference {
        request_id: String,
        reference_id: i64,
    },
}

/// Per-pause handle state of the adapter.
#[derive(Debug, Default)]
pub struct VariableState {
    pub frames: Handles<FrameInfo>,
    pub containers: Handles<VariableContainer>,
}

impl VariableState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all handles. Called whenever any request resumes, since
    /// frame numbers shift as soon as execution moves.
    pub fn reset(&mut self) {
        self.frames.reset();
        self.containers.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_and_resolvable() {
        let mut handles = Handles::new();
        let a = handles.create("first");
        let b = handles.create("second");
        assert_ne!(a, b);
        assert_eq!(handles.get(a), Some(&"first"));
        assert_eq!(handles.get(b), Some(&"second"));
    }

    #[test]
    fn test_reset_invalidates_old_handles() {
        let mut state = VariableState::new();
        let frame = state.frames.create(FrameInfo {
            request_id: "07nAAA".to_string(),
            frame_number: 0,
        });
        state.reset();
        assert!(state.frames.get(frame).is_none());
    }

    #[test]
    fn test_scope_labels() {
        assert_eq!(ScopeKind::Local.label(), "Local");
        assert_eq!(ScopeKind::Static.label(), "Static");
        assert_eq!(ScopeKind::Global.label(), "Global");
    }
}
