//! Church numerals to and from native counts.

use crate::syntax::{Graph, Node, NodeId, Side};

/// Builds `''` followed by `n` applications of `..` ending in `.`.
pub fn to_church(graph: &mut Graph, n: u32) -> NodeId {
    let mut body = graph.alloc(Node::Variable { index: 0 });
    for _ in 0..n {
        let function = graph.alloc(Node::Variable { index: 1 });
        body = graph.alloc(Node::Application {
            function,
            argument: body,
        });
    }
    let inner = graph.alloc(Node::Abstraction { body });
    graph.alloc(Node::Abstraction { body: inner })
}

/// Scratch term used only while decoding. The successor and the running
/// count exist here and never in a program [`Graph`].
#[derive(Debug, Clone, Copy)]
enum Term {
    Abstraction { body: usize },
    Application { function: usize, argument: usize },
    Variable { index: usize },
    Increment,
    Count(u32),
    /// Unit or a built-in; applying one never yields a count.
    Inert,
}

/// Throwaway arena for one decode. Nothing is reclaimed before it drops.
#[derive(Debug, Default)]
struct Scratch {
    terms: Vec<Term>,
}

impl Scratch {
    fn push(&mut self, term: Term) -> usize {
        self.terms.push(term);
        self.terms.len() - 1
    }

    fn is_application(&self, id: usize) -> bool {
        matches!(self.terms[id], Term::Application { .. })
    }

    fn child(&self, parent: usize, side: Side) -> usize {
        match (self.terms[parent], side) {
            (Term::Abstraction { body }, Side::Body) => body,
            (Term::Application { function, .. }, Side::Function) => function,
            (Term::Application { argument, .. }, Side::Argument) => argument,
            (term, side) => unreachable!("{:?} has no {:?} child", term, side),
        }
    }

    fn set_child(&mut self, parent: usize, side: Side, child: usize) {
        match (&mut self.terms[parent], side) {
            (Term::Abstraction { body }, Side::Body) => *body = child,
            (Term::Application { function, .. }, Side::Function) => *function = child,
            (Term::Application { argument, .. }, Side::Argument) => *argument = child,
            (term, side) => unreachable!("{:?} has no {:?} child", term, side),
        }
    }

    /// Copies the program subtree at `root` into the arena.
    fn import(&mut self, graph: &Graph, root: NodeId) -> usize {
        let top = self.push(Term::Inert);
        let mut stack = vec![(root, top)];
        while let Some((id, slot)) = stack.pop() {
            self.terms[slot] = match graph[id] {
                Node::Abstraction { body } => {
                    let copy = self.push(Term::Inert);
                    stack.push((body, copy));
                    Term::Abstraction { body: copy }
                }
                Node::Application { function, argument } => {
                    let f = self.push(Term::Inert);
                    let a = self.push(Term::Inert);
                    stack.push((argument, a));
                    stack.push((function, f));
                    Term::Application {
                        function: f,
                        argument: a,
                    }
                }
                Node::Variable { index } => Term::Variable { index },
                _ => Term::Inert,
            };
        }
        top
    }

    fn clone_tree(&mut self, root: usize) -> usize {
        let copy = self.push(self.terms[root]);
        let mut stack = vec![copy];
        while let Some(id) = stack.pop() {
            match self.terms[id] {
                Term::Abstraction { body } => {
                    let body = self.push(self.terms[body]);
                    self.terms[id] = Term::Abstraction { body };
                    stack.push(body);
                }
                Term::Application { function, argument } => {
                    let function = self.push(self.terms[function]);
                    let argument = self.push(self.terms[argument]);
                    self.terms[id] = Term::Application { function, argument };
                    stack.push(argument);
                    stack.push(function);
                }
                _ => {}
            }
        }
        copy
    }

    /// Substitutes `arg` into the abstraction `func` and returns its body.
    /// As in the program graph, only the first occurrence shares `arg`.
    fn beta(&mut self, func: usize, arg: usize) -> usize {
        let mut used = false;
        let mut stack = vec![(func, Side::Body, 0)];
        while let Some((parent, side, nest)) = stack.pop() {
            let child = self.child(parent, side);
            match self.terms[child] {
                Term::Abstraction { .. } => stack.push((child, Side::Body, nest + 1)),
                Term::Application { .. } => {
                    stack.push((child, Side::Argument, nest));
                    stack.push((child, Side::Function, nest));
                }
                Term::Variable { index } if index == nest => {
                    let value = if used { self.clone_tree(arg) } else { arg };
                    self.set_child(parent, side, value);
                    used = true;
                }
                _ => {}
            }
        }
        self.child(func, Side::Body)
    }

    /// Reduces the application `node` the way the VM does and reads off the
    /// final count.
    fn reduce(&mut self, mut node: usize) -> Option<u32> {
        let mut path: Vec<(usize, Side)> = Vec::new();
        loop {
            let Term::Application { function, argument } = self.terms[node] else {
                unreachable!("redex {:?} is not an application", self.terms[node]);
            };
            if self.is_application(function) {
                path.push((node, Side::Function));
                node = function;
                continue;
            }
            if self.is_application(argument) {
                path.push((node, Side::Argument));
                node = argument;
                continue;
            }
            let result = match (self.terms[function], self.terms[argument]) {
                (Term::Abstraction { .. }, _) => {
                    let body = self.beta(function, argument);
                    if self.is_application(body) {
                        if let Some(&(parent, side)) = path.last() {
                            self.set_child(parent, side, body);
                        }
                        node = body;
                        continue;
                    }
                    body
                }
                (Term::Increment, Term::Count(n)) => self.push(Term::Count(n.checked_add(1)?)),
                _ => return None,
            };
            match path.pop() {
                Some((parent, side)) => {
                    self.set_child(parent, side, result);
                    node = parent;
                }
                None => {
                    return match self.terms[result] {
                        Term::Count(n) => Some(n),
                        _ => None,
                    }
                }
            }
        }
    }
}

/// Decodes a numeral by reducing `church` applied to a successor function and
/// zero, with the same strategy as the VM. Consumes `church`.
///
/// Returns `None` when the reduction gets stuck on anything other than a
/// successor applied to a count, or ends in something other than a count.
pub fn to_number(graph: &mut Graph, church: NodeId) -> Option<u32> {
    let mut scratch = Scratch::default();
    let term = scratch.import(graph, church);
    graph.release_tree(church);

    let increment = scratch.push(Term::Increment);
    let zero = scratch.push(Term::Count(0));
    let function = scratch.push(Term::Application {
        function: term,
        argument: increment,
    });
    let root = scratch.push(Term::Application {
        function,
        argument: zero,
    });
    scratch.reduce(root)
}
