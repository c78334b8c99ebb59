use tracing::{debug, info, trace, warn};

use crate::error::{RuntimeError, SyntaxError};
use crate::host::Host;
use crate::numeral::{to_church, to_number};
use crate::parse::parse_program;
use crate::subst::beta;
use crate::syntax::{dump, Graph, Node, NodeId, Side};
use crate::utf8::{Utf8Decoder, Utf8Encoder};

/// Normal-order graph reduction machine for one program.
///
/// `path` leads from `root` to `current`, the application being reduced;
/// `current` is `None` once the program has halted or nothing is loaded.
pub struct Vm<H: Host> {
    host: H,
    graph: Graph,
    root: Option<NodeId>,
    current: Option<NodeId>,
    path: Vec<(NodeId, Side)>,
    encoder: Utf8Encoder,
    decoder: Utf8Decoder,
}

impl<H: Host> Vm<H> {
    pub fn new(host: H) -> Self {
        Vm {
            host,
            graph: Graph::new(),
            root: None,
            current: None,
            path: Vec::new(),
            encoder: Utf8Encoder::new(),
            decoder: Utf8Decoder::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Compiles `code`, replacing whatever was loaded before. Syntax errors
    /// are also reported to the host's error sink.
    pub fn load(&mut self, code: &str, dump: bool) -> Result<(), SyntaxError> {
        self.unload();
        let root = match parse_program(code, &mut self.graph) {
            Ok(root) => root,
            Err(error) => {
                self.graph.clear();
                debug!(line = error.line, column = error.column, "program rejected");
                self.host.error(&error.to_string());
                return Err(error);
            }
        };
        self.root = Some(root);
        if self.graph[root].is_application() {
            self.current = Some(root);
        }
        debug!(nodes = self.graph.live(), halted = self.ended(), "program loaded");
        if dump {
            let text = self.dump();
            self.host.log(&text);
        }
        Ok(())
    }

    /// Reduces up to `steps` times (`None` for no limit), yielding to the
    /// host between reductions. On error or abort the failure is reported
    /// with a dump of the graph and the machine is unloaded.
    pub async fn run(&mut self, steps: Option<u64>, dump: bool) -> Result<(), RuntimeError> {
        let mut remaining = steps;
        while !self.ended() && remaining != Some(0) {
            if let Err(error) = self.step().await {
                return Err(self.fail(error));
            }
            if let Some(remaining) = remaining.as_mut() {
                *remaining -= 1;
            }
            if self.ended() || remaining == Some(0) {
                break;
            }
            if self.host.sleep().await {
                return Err(self.fail(RuntimeError::Aborted));
            }
        }
        if dump {
            let text = self.dump();
            self.host.log(&text);
        }
        Ok(())
    }

    /// No redex left: halted, failed, or never loaded.
    pub fn ended(&self) -> bool {
        self.current.is_none()
    }

    pub fn unload(&mut self) {
        self.root = None;
        self.current = None;
        self.path.clear();
        self.graph.clear();
        self.encoder.reset();
        self.decoder.reset();
        debug!("program unloaded");
    }

    /// Program text of the graph, with the active redex bracketed.
    pub fn dump(&self) -> String {
        dump(&self.graph, self.root, self.current)
    }

    /// One descent or one reduction.
    async fn step(&mut self) -> Result<(), RuntimeError> {
        let Some(node) = self.current else {
            return Ok(());
        };
        let Node::Application { function, argument } = self.graph[node] else {
            unreachable!("redex {:?} is not an application", self.graph[node]);
        };
        if self.graph[function].is_application() {
            self.path.push((node, Side::Function));
            self.current = Some(function);
            return Ok(());
        }
        if self.graph[argument].is_application() {
            self.path.push((node, Side::Argument));
            self.current = Some(argument);
            return Ok(());
        }

        let head = self.graph[function];
        trace!(function = ?head, depth = self.path.len(), "reduce");
        let result = match head {
            Node::Abstraction { .. } => {
                let body = beta(&mut self.graph, function, argument);
                self.graph.release(node);
                if self.graph[body].is_application() {
                    // the body is the next redex; stay at this position
                    match self.path.last() {
                        Some(&(parent, side)) => self.graph.set_child(parent, side, body),
                        None => self.root = Some(body),
                    }
                    self.current = Some(body);
                    return Ok(());
                }
                body
            }
            Node::Put => {
                let number = to_number(&mut self.graph, argument);
                self.graph.release(function);
                self.graph.release(node);
                let result = self.graph.alloc(Node::PutPartial { number });
                if number.is_none() {
                    // the marker takes the redex's place; no redex is marked
                    match self.path.pop() {
                        Some((parent, side)) => self.graph.set_child(parent, side, result),
                        None => self.root = Some(result),
                    }
                    self.current = None;
                    return Err(RuntimeError::NotANumeral);
                }
                result
            }
            Node::PutPartial { number } => {
                self.expect_unit(argument)?;
                let number = number.ok_or(RuntimeError::InvalidUtf8)?;
                match self.encoder.push(number) {
                    Ok(Some(c)) => self.host.put_char(c),
                    Ok(None) => {}
                    Err(_) => return Err(RuntimeError::InvalidUtf8),
                }
                self.release_redex(node, function, argument);
                self.graph.alloc(Node::Unit)
            }
            Node::Get => {
                self.expect_unit(argument)?;
                let byte = self
                    .decoder
                    .next_byte(&mut self.host, || {
                        dump(&self.graph, self.root, self.current)
                    })
                    .await
                    .ok_or(RuntimeError::Aborted)?;
                self.release_redex(node, function, argument);
                to_church(&mut self.graph, byte as u32)
            }
            Node::Random => {
                self.expect_unit(argument)?;
                let byte = self.host.rand_byte();
                self.release_redex(node, function, argument);
                to_church(&mut self.graph, byte as u32)
            }
            _ => return Err(RuntimeError::NotAFunction),
        };
        self.install(result);
        Ok(())
    }

    fn expect_unit(&self, argument: NodeId) -> Result<(), RuntimeError> {
        match self.graph[argument] {
            Node::Unit => Ok(()),
            _ => Err(RuntimeError::NotNull),
        }
    }

    fn release_redex(&mut self, node: NodeId, function: NodeId, argument: NodeId) {
        self.graph.release(argument);
        self.graph.release(function);
        self.graph.release(node);
    }

    /// Puts `result` where `current` was and moves up one level.
    fn install(&mut self, result: NodeId) {
        match self.path.pop() {
            Some((parent, side)) => {
                self.graph.set_child(parent, side, result);
                self.current = Some(parent);
            }
            None => {
                self.root = Some(result);
                self.current = None;
                info!(nodes = self.graph.live(), "program halted");
            }
        }
    }

    fn fail(&mut self, error: RuntimeError) -> RuntimeError {
        warn!(%error, "program stopped");
        self.host.error(&error.to_string());
        let text = self.dump();
        self.host.log(&text);
        self.unload();
        error
    }
}
