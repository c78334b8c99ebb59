//! Compiler and graph-reduction machine for Nuts, an untyped lambda calculus
//! with de Bruijn variables, a unit literal and three byte-level built-ins.
//!
//! ```text
//! ,,:'',..,..,.. ."    ; put the byte 3
//! ```

pub mod error;
pub mod host;
pub mod numeral;
pub mod parse;
pub mod subst;
pub mod syntax;
pub mod utf8;
pub mod vm;

pub use error::{RuntimeError, SyntaxError, SyntaxErrorKind};
pub use host::Host;
pub use vm::Vm;
