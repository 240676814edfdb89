//! Symbols, the scope chain and declared types.

mod scope;
mod symbol;
mod types;

pub use scope::Scope;
pub use symbol::{LiteralData, Payload, ProcedureData, Symbol, SymbolKind, VariableData};
pub use types::Type;
