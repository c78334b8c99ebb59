use std::fmt;
use std::ops::{Index, IndexMut};

/// Handle to a node slot in a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Id of the slot at `index`. Panics once the arena outgrows `u32`.
    fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) => NodeId(index),
            Err(_) => panic!("node arena exhausted: slot {} does not fit a u32 id", index),
        }
    }

    #[inline(always)]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which child of a node a link goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// `Abstraction::body`
    Body,
    /// `Application::function`
    Function,
    /// `Application::argument`
    Argument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Lambda binding one de Bruijn variable, e.g. `'body`
    Abstraction { body: NodeId },
    /// Argument and result placeholder of the built-ins, e.g. `"`
    Unit,
    /// Bound variable, e.g. `..` for index 1
    Variable { index: usize },
    /// Application, e.g. `,function argument`
    Application { function: NodeId, argument: NodeId },
    /// Output built-in, `:`
    Put,
    /// `Put` applied to a numeral, awaiting `Unit`. `None` marks an operand
    /// that did not decode to a number.
    PutPartial { number: Option<u32> },
    /// Input built-in, `::`
    Get,
    /// Random byte built-in, `:::`
    Random,
}

impl Node {
    #[inline(always)]
    pub fn is_application(&self) -> bool {
        matches!(self, Node::Application { .. })
    }
}

/// Arena owning every node of one program.
///
/// Released slots are recycled through a free list. Every node has at most
/// one parent, so releasing a subtree never frees something still in use.
#[derive(Debug, Default)]
pub struct Graph {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                debug_assert!(self.slots[id.index()].is_none());
                self.slots[id.index()] = Some(node);
                id
            }
            None => {
                let id = NodeId::from_index(self.slots.len());
                self.slots.push(Some(node));
                id
            }
        }
    }

    /// Frees a single slot. Children are left alone.
    pub fn release(&mut self, id: NodeId) {
        debug_assert!(self.slots[id.index()].is_some(), "double release of {:?}", id);
        self.slots[id.index()] = None;
        self.free.push(id);
    }

    /// Frees `id` and everything below it.
    pub fn release_tree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match self[id] {
                Node::Abstraction { body } => stack.push(body),
                Node::Application { function, argument } => {
                    stack.push(argument);
                    stack.push(function);
                }
                _ => {}
            }
            self.release(id);
        }
    }

    pub fn child(&self, parent: NodeId, side: Side) -> NodeId {
        match (self[parent], side) {
            (Node::Abstraction { body }, Side::Body) => body,
            (Node::Application { function, .. }, Side::Function) => function,
            (Node::Application { argument, .. }, Side::Argument) => argument,
            (node, side) => unreachable!("{:?} has no {:?} child", node, side),
        }
    }

    pub fn set_child(&mut self, parent: NodeId, side: Side, child: NodeId) {
        match (&mut self[parent], side) {
            (Node::Abstraction { body }, Side::Body) => *body = child,
            (Node::Application { function, .. }, Side::Function) => *function = child,
            (Node::Application { argument, .. }, Side::Argument) => *argument = child,
            (node, side) => unreachable!("{:?} has no {:?} child", node, side),
        }
    }

    /// Number of nodes currently allocated.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

impl Index<NodeId> for Graph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match &self.slots[id.index()] {
            Some(node) => node,
            None => unreachable!("{:?} was released", id),
        }
    }
}

impl IndexMut<NodeId> for Graph {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        match &mut self.slots[id.index()] {
            Some(node) => node,
            None => unreachable!("{:?} was released", id),
        }
    }
}

/// Renders a graph back to program text.
///
/// The application equal to `current` is bracketed as `[,function argument]`
/// and partially applied output is shown as `{N}`; neither re-parses.
pub struct Dump<'a> {
    pub graph: &'a Graph,
    pub root: Option<NodeId>,
    pub current: Option<NodeId>,
}

enum Task {
    Visit(NodeId),
    Close,
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Some(root) = self.root else {
            return Ok(());
        };
        // Adjacent dot runs and colon runs would merge when re-read.
        let mut last = None;
        let mut stack = vec![Task::Visit(root)];
        while let Some(task) = stack.pop() {
            let id = match task {
                Task::Visit(id) => id,
                Task::Close => {
                    f.write_str("]")?;
                    last = Some(']');
                    continue;
                }
            };
            match self.graph[id] {
                Node::Abstraction { body } => {
                    f.write_str("'")?;
                    last = Some('\'');
                    stack.push(Task::Visit(body));
                }
                Node::Unit => {
                    f.write_str("\"")?;
                    last = Some('"');
                }
                Node::Variable { index } => {
                    if last == Some('.') {
                        f.write_str(" ")?;
                    }
                    for _ in 0..=index {
                        f.write_str(".")?;
                    }
                    last = Some('.');
                }
                Node::Application { function, argument } => {
                    if self.current == Some(id) {
                        f.write_str("[,")?;
                        stack.push(Task::Close);
                    } else {
                        f.write_str(",")?;
                    }
                    last = Some(',');
                    stack.push(Task::Visit(argument));
                    stack.push(Task::Visit(function));
                }
                Node::Put | Node::Get | Node::Random => {
                    if last == Some(':') {
                        f.write_str(" ")?;
                    }
                    f.write_str(match self.graph[id] {
                        Node::Put => ":",
                        Node::Get => "::",
                        _ => ":::",
                    })?;
                    last = Some(':');
                }
                Node::PutPartial { number } => {
                    match number {
                        Some(number) => write!(f, "{{{}}}", number)?,
                        None => f.write_str("{NaN}")?,
                    }
                    last = Some('}');
                }
            }
        }
        Ok(())
    }
}

pub fn dump(graph: &Graph, root: Option<NodeId>, current: Option<NodeId>) -> String {
    Dump {
        graph,
        root,
        current,
    }
    .to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    fn app(graph: &mut Graph, function: NodeId, argument: NodeId) -> NodeId {
        graph.alloc(Node::Application { function, argument })
    }

    #[test]
    fn test_dump_nodes() {
        let mut graph = Graph::new();
        let x = graph.alloc(Node::Variable { index: 0 });
        let id = graph.alloc(Node::Abstraction { body: x });
        let unit = graph.alloc(Node::Unit);
        let put = graph.alloc(Node::PutPartial { number: Some(65) });
        let nan = graph.alloc(Node::PutPartial { number: None });

        let test_cases = &[
            (x, "."),
            (id, "'."),
            (unit, "\""),
            (put, "{65}"),
            (nan, "{NaN}"),
        ];
        for (node, expected) in test_cases {
            assert_eq!(dump(&graph, Some(*node), None), *expected);
        }
        assert_eq!(dump(&graph, None, None), "");
    }

    #[test]
    fn test_dump_separates_runs() {
        let mut graph = Graph::new();
        let f = graph.alloc(Node::Variable { index: 1 });
        let x = graph.alloc(Node::Variable { index: 0 });
        let fx = app(&mut graph, f, x);
        let inner = graph.alloc(Node::Abstraction { body: fx });
        let church = graph.alloc(Node::Abstraction { body: inner });
        assert_eq!(dump(&graph, Some(church), None), "'',.. .");

        let put = graph.alloc(Node::Put);
        let get = graph.alloc(Node::Get);
        let random = graph.alloc(Node::Random);
        let left = app(&mut graph, put, get);
        let root = app(&mut graph, left, random);
        assert_eq!(dump(&graph, Some(root), None), ",,: :: :::");
    }

    #[test]
    fn test_dump_marks_current() {
        let mut graph = Graph::new();
        let get = graph.alloc(Node::Get);
        let unit = graph.alloc(Node::Unit);
        let inner = app(&mut graph, get, unit);
        let put = graph.alloc(Node::Put);
        let outer = app(&mut graph, put, inner);
        assert_eq!(dump(&graph, Some(outer), Some(inner)), ",:[,::\"]");
        assert_eq!(dump(&graph, Some(outer), Some(outer)), "[,:,::\"]");
    }

    #[test]
    fn test_release_recycles_slots() {
        let mut graph = Graph::new();
        let unit = graph.alloc(Node::Unit);
        let x = graph.alloc(Node::Variable { index: 0 });
        let body = app(&mut graph, x, unit);
        let lam = graph.alloc(Node::Abstraction { body });
        assert_eq!(graph.live(), 4);

        graph.release_tree(lam);
        assert_eq!(graph.live(), 0);

        let again = graph.alloc(Node::Get);
        assert_eq!(graph.live(), 1);
        assert!(again.index() < 4);
    }

    #[test]
    fn test_node_id_bounds() {
        assert_eq!(NodeId::from_index(7).index(), 7);
        let last = u32::MAX as usize;
        assert_eq!(NodeId::from_index(last).index(), last);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "node arena exhausted")]
    fn test_node_id_overflow() {
        NodeId::from_index(u32::MAX as usize + 1);
    }

    #[test]
    fn test_set_child() {
        let mut graph = Graph::new();
        let unit = graph.alloc(Node::Unit);
        let get = graph.alloc(Node::Get);
        let node = app(&mut graph, get, unit);
        let random = graph.alloc(Node::Random);
        graph.set_child(node, Side::Function, random);
        assert_eq!(graph.child(node, Side::Function), random);
        assert_eq!(graph.child(node, Side::Argument), unit);
    }
}
