use std::ops::Range;

use crate::ir::{Component, IrNode};

/// A block component that is still receiving children.
#[derive(Debug)]
struct OpenBlock {
    component: Component,
    opened_by: ClosedBlock,
}

/// Which invocation opened a block, reported once the block is closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedBlock {
    pub opened_by: String,
    pub span: Range<usize>,
}

/// The append targets of one compile: the root list plus a stack of open
/// block components. Closing a block moves the finished component into its
/// parent, so the tree is built without back-pointers.
#[derive(Debug, Default)]
pub struct ScopeStack {
    root: Vec<IrNode>,
    open: Vec<OpenBlock>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack::default()
    }

    /// Number of append targets; the root counts, so this is never below 1.
    pub fn depth(&self) -> usize {
        self.open.len() + 1
    }

    /// Append to the innermost open block, or the root when none is open.
    pub fn append(&mut self, node: IrNode) {
        match self.open.last_mut() {
            Some(block) => block.component.push_child(node),
            None => self.root.push(node),
        }
    }

    /// Make `component` the append target until the matching `pop`.
    pub fn push(&mut self, component: Component, opened_by: impl Into<String>, span: Range<usize>) {
        self.open.push(OpenBlock {
            component,
            opened_by: ClosedBlock {
                opened_by: opened_by.into(),
                span,
            },
        });
    }

    /// Close the innermost block, moving it into its parent.
    ///
    /// Returns `None` at depth 1: the root is never popped.
    pub fn pop(&mut self) -> Option<ClosedBlock> {
        let OpenBlock {
            component,
            opened_by,
        } = self.open.pop()?;
        self.append(IrNode::Component(component));
        Some(opened_by)
    }

    /// Close every block still open, innermost first, and hand back the
    /// finished tree together with the blocks that had to be closed.
    pub fn finish(mut self) -> (Vec<IrNode>, Vec<ClosedBlock>) {
        let mut unclosed = Vec::new();
        while let Some(block) = self.pop() {
            unclosed.push(block);
        }
        (self.root, unclosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(stack: &mut ScopeStack, name: &str) {
        stack.push(Component::new(name), name, 0..0);
    }

    #[test]
    fn matched_pushes_return_to_root() {
        let mut stack = ScopeStack::new();
        for n in 0..3 {
            open(&mut stack, &format!("B{}", n));
        }
        assert_eq!(stack.depth(), 4);
        for _ in 0..3 {
            assert!(stack.pop().is_some());
        }
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn excess_pops_are_refused() {
        let mut stack = ScopeStack::new();
        open(&mut stack, "A");
        assert!(stack.pop().is_some());
        assert!(stack.pop().is_none());
        assert!(stack.pop().is_none());
        assert_eq!(stack.depth(), 1);
        let (root, unclosed) = stack.finish();
        assert_eq!(root.len(), 1);
        assert!(unclosed.is_empty());
    }

    #[test]
    fn closed_block_lands_in_parent() {
        let mut stack = ScopeStack::new();
        stack.append(IrNode::text("before"));
        open(&mut stack, "Outer");
        stack.append(IrNode::text("a"));
        open(&mut stack, "Inner");
        stack.append(IrNode::text("b"));
        stack.pop();
        stack.append(IrNode::text("c"));
        stack.pop();
        stack.append(IrNode::text("after"));

        let (root, unclosed) = stack.finish();
        assert!(unclosed.is_empty());
        assert_eq!(root.len(), 3);
        let outer = root[1].as_component().expect("outer");
        assert_eq!(outer.component_name, "Outer");
        let texts: Vec<_> = outer.children().iter().filter_map(IrNode::as_text).collect();
        assert_eq!(texts, vec!["a", "c"]);
        let inner = outer.children()[1].as_component().expect("inner");
        assert_eq!(inner.children(), &[IrNode::text("b")]);
    }

    #[test]
    fn finish_closes_innermost_first() {
        let mut stack = ScopeStack::new();
        open(&mut stack, "Outer");
        open(&mut stack, "Inner");
        stack.append(IrNode::text("x"));

        let (root, unclosed) = stack.finish();
        let names: Vec<_> = unclosed.iter().map(|b| b.opened_by.as_str()).collect();
        assert_eq!(names, vec!["Inner", "Outer"]);
        assert_eq!(root.len(), 1);
        let outer = root[0].as_component().expect("outer");
        assert_eq!(outer.children()[0].as_component().map(|c| c.component_name.as_str()), Some("Inner"));
    }
}
