//! Resolution context: scopes, resource stack, group cursor and depth.
//!
//! One context is built per request and threaded through every engine
//! call; nothing is shared between requests.

use serde_json::{Map, Value};

use crate::error::{TemplateError, TemplateResult};
use crate::params::resolve_param;

/// Maximum nesting of templates and sibling-resource chases.
pub const MAX_DEPTH: usize = 32;

/// Stack of resource maps, one frame per template being resolved.
///
/// The outermost frame stays for the whole resolution so sibling lookups
/// from the root template keep working after nested templates return.
#[derive(Debug, Clone, Default)]
pub struct ResourceStack {
    frames: Vec<Map<String, Value>>,
}

impl ResourceStack {
    pub fn push(&mut self, frame: Map<String, Value>) {
        self.frames.push(frame);
    }

    /// Pop the innermost frame unless it is the last one.
    pub fn pop_nested(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Find a resource by name, innermost frame first.
    pub fn find(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
}

/// Everything a resolution needs besides the template being walked.
pub struct ResolutionContext<'a> {
    pub(crate) files: &'a Map<String, Value>,
    pub(crate) environment: &'a Map<String, Value>,
    pub(crate) request: &'a Map<String, Value>,
    pub(crate) stack: ResourceStack,
    pub(crate) cursor: Option<usize>,
    depth: usize,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        files: &'a Map<String, Value>,
        environment: &'a Map<String, Value>,
        request: &'a Map<String, Value>,
    ) -> Self {
        Self {
            files,
            environment,
            request,
            stack: ResourceStack::default(),
            cursor: None,
            depth: 0,
        }
    }

    pub fn stack(&self) -> &ResourceStack {
        &self.stack
    }

    /// Current replica index while expanding a group.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Resolve a parameter against this context's scopes.
    pub fn param(
        &self,
        key: &str,
        parent: Option<&Map<String, Value>>,
        root_key: &str,
        index: Option<usize>,
    ) -> Option<Value> {
        resolve_param(key, self.environment, parent, self.request, root_key, index)
    }

    /// Resolve a parameter with `root_key = key` and no index.
    pub fn param_plain(&self, key: &str, parent: Option<&Map<String, Value>>) -> Option<Value> {
        self.param(key, parent, key, None)
    }

    /// Run `f` with `frame` pushed on the resource stack.
    pub fn with_frame<T>(
        &mut self,
        frame: Map<String, Value>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.stack.push(frame);
        let out = f(self);
        self.stack.pop_nested();
        out
    }

    /// Run `f` with the group cursor set to `cursor`, restoring the
    /// previous cursor afterwards.
    pub fn with_cursor<T>(&mut self, cursor: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = self.cursor.replace(cursor);
        let out = f(self);
        self.cursor = previous;
        out
    }

    /// Run `f` one nesting level deeper.
    pub fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> TemplateResult<T>,
    ) -> TemplateResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(TemplateError::RecursionLimit(MAX_DEPTH));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }
}
