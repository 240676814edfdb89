use std::cmp::Ordering;
use std::fmt;

use crate::ir::IrType;

/// A declared integer type.
///
/// The IR only knows `iN`, so signedness rides along here and picks the
/// extension, division and comparison flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
    backend: IrType,
    width: u32,
    signed: bool,
}

impl Type {
    pub const INT32: Type = Type::new(32, true);
    pub const INT64: Type = Type::new(64, true);

    pub const fn new(width: u32, signed: bool) -> Self {
        Self {
            backend: IrType::Int(width),
            width,
            signed,
        }
    }

    /// Resolves a type keyword such as `INT16` or `uint8`.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let (signed, digits) = match lower.strip_prefix("uint") {
            Some(rest) => (false, rest),
            None => (true, lower.strip_prefix("int")?),
        };
        match digits {
            "8" => Some(Type::new(8, signed)),
            "16" => Some(Type::new(16, signed)),
            "32" => Some(Type::new(32, signed)),
            "64" => Some(Type::new(64, signed)),
            _ => None,
        }
    }

    pub fn backend(&self) -> IrType {
        self.backend
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Type both operands of a binary operator are brought to.
    ///
    /// The wider type wins; at equal width unsigned wins. The result does not
    /// depend on operand order.
    pub fn common(self, other: Type) -> Type {
        match self.width.cmp(&other.width) {
            Ordering::Greater => self,
            Ordering::Less => other,
            Ordering::Equal => Type::new(self.width, self.signed && other.signed),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.signed { "INT" } else { "UINT" };
        write!(f, "{prefix}{}", self.width)
    }
}
