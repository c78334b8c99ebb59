//! Beta reduction support.
//!
//! Programs are closed and redexes are never reduced under a binder, so an
//! argument never contains free variables and indices need no shifting.

use crate::syntax::{Graph, Node, NodeId, Side};

/// Deep copy of the subtree at `root`.
pub fn clone_tree(graph: &mut Graph, root: NodeId) -> NodeId {
    let copy = graph.alloc(graph[root]);
    // Each copied node still points at the original's children until popped.
    let mut stack = vec![copy];
    while let Some(id) = stack.pop() {
        let node = graph[id];
        match node {
            Node::Abstraction { body } => {
                let body = graph.alloc(graph[body]);
                graph[id] = Node::Abstraction { body };
                stack.push(body);
            }
            Node::Application { function, argument } => {
                let function = graph.alloc(graph[function]);
                let argument = graph.alloc(graph[argument]);
                graph[id] = Node::Application { function, argument };
                stack.push(argument);
                stack.push(function);
            }
            _ => {}
        }
    }
    copy
}

/// Replaces every variable bound by the abstraction `func` with `arg`.
///
/// The leftmost occurrence receives `arg` itself, every later one a fresh
/// copy, so no node ends up with two parents. Returns the number of
/// occurrences replaced.
pub fn substitute_arg(graph: &mut Graph, func: NodeId, arg: NodeId) -> usize {
    let mut replaced = 0;
    // (parent, side, binders between `func` and the child)
    let mut stack = vec![(func, Side::Body, 0)];
    while let Some((parent, side, nest)) = stack.pop() {
        let child = graph.child(parent, side);
        let node = graph[child];
        match node {
            Node::Abstraction { .. } => stack.push((child, Side::Body, nest + 1)),
            Node::Application { .. } => {
                stack.push((child, Side::Argument, nest));
                stack.push((child, Side::Function, nest));
            }
            Node::Variable { index } if index == nest => {
                let value = if replaced == 0 {
                    arg
                } else {
                    clone_tree(graph, arg)
                };
                graph.set_child(parent, side, value);
                graph.release(child);
                replaced += 1;
            }
            _ => {}
        }
    }
    replaced
}

/// Reduces `func` applied to `arg` and returns the resulting body.
///
/// Consumes the abstraction shell, and `arg` too when the body never uses
/// it. The application node itself is the caller's to release.
pub fn beta(graph: &mut Graph, func: NodeId, arg: NodeId) -> NodeId {
    if substitute_arg(graph, func, arg) == 0 {
        graph.release_tree(arg);
    }
    let body = graph.child(func, Side::Body);
    graph.release(func);
    body
}
