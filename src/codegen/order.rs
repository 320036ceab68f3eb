//! # Expression Precedence
//!
//! Value blocks report the precedence class of the expression they produce,
//! and every value input declares the class its template position requires.
//! The generator wraps an expression in parentheses only when the two
//! disagree.

use serde::{Deserialize, Serialize};

/// Precedence classes, tightest first. Modelled on JavaScript operator
/// precedence since that is what the generated programs are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    Atomic,
    New,
    Member,
    FunctionCall,
    Increment,
    Decrement,
    BitwiseNot,
    UnaryPlus,
    UnaryNegation,
    LogicalNot,
    Typeof,
    Void,
    Delete,
    Await,
    Exponentiation,
    Multiplication,
    Division,
    Modulus,
    Subtraction,
    Addition,
    BitwiseShift,
    Relational,
    In,
    Instanceof,
    Equality,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    Conditional,
    Assignment,
    Yield,
    Comma,
    None,
}

/// Pairs (outer, inner) that never need parentheses even though the inner
/// expression does not bind more tightly than its consumer.
const ORDER_OVERRIDES: &[(Order, Order)] = &[
    // a.b()() / a.b.c
    (Order::FunctionCall, Order::Member),
    (Order::FunctionCall, Order::FunctionCall),
    (Order::Member, Order::Member),
    (Order::Member, Order::FunctionCall),
    // !!x
    (Order::LogicalNot, Order::LogicalNot),
    // a * (b * c) == a * b * c
    (Order::Multiplication, Order::Multiplication),
    // a + (b + c) == a + b + c
    (Order::Addition, Order::Addition),
    (Order::LogicalAnd, Order::LogicalAnd),
    (Order::LogicalOr, Order::LogicalOr),
];

impl Order {
    /// Binding strength, lower binds tighter. Classes sharing a row of the
    /// operator table share a value.
    pub fn precedence(self) -> u16 {
        match self {
            Order::Atomic => 0,
            Order::New => 11,
            Order::Member => 12,
            Order::FunctionCall => 20,
            Order::Increment | Order::Decrement => 30,
            Order::BitwiseNot => 41,
            Order::UnaryPlus => 42,
            Order::UnaryNegation => 43,
            Order::LogicalNot => 44,
            Order::Typeof => 45,
            Order::Void => 46,
            Order::Delete => 47,
            Order::Await => 48,
            Order::Exponentiation => 50,
            Order::Multiplication => 51,
            Order::Division => 52,
            Order::Modulus => 53,
            Order::Subtraction => 61,
            Order::Addition => 62,
            Order::BitwiseShift => 70,
            Order::Relational | Order::In | Order::Instanceof => 80,
            Order::Equality => 90,
            Order::BitwiseAnd => 100,
            Order::BitwiseXor => 110,
            Order::BitwiseOr => 120,
            Order::LogicalAnd => 130,
            Order::LogicalOr => 140,
            Order::Conditional => 150,
            Order::Assignment => 160,
            Order::Yield => 170,
            Order::Comma => 180,
            Order::None => 990,
        }
    }

    /// Whether an expression of class `inner` needs parentheses when placed
    /// at a position requiring class `self`.
    pub fn needs_parens(self, inner: Order) -> bool {
        if inner == Order::Atomic || self == Order::None {
            return false;
        }
        if inner.precedence() < self.precedence() {
            return false;
        }
        !ORDER_OVERRIDES.contains(&(self, inner))
    }

    /// Place `code` of class `inner` at a position requiring `self`.
    pub fn wrap(self, code: &str, inner: Order) -> String {
        if self.needs_parens(inner) {
            format!("({})", code)
        } else {
            code.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looser_inner_expression_is_parenthesized() {
        assert_eq!(Order::Multiplication.wrap("a + b", Order::Addition), "(a + b)");
        assert_eq!(Order::Addition.wrap("a * b", Order::Multiplication), "a * b");
    }

    #[test]
    fn none_and_atomic_never_add_parens() {
        assert!(!Order::None.needs_parens(Order::Comma));
        assert!(!Order::Member.needs_parens(Order::Atomic));
    }

    #[test]
    fn associative_pairs_are_exempt() {
        assert!(!Order::Addition.needs_parens(Order::Addition));
        assert!(!Order::FunctionCall.needs_parens(Order::Member));
        assert!(Order::Subtraction.needs_parens(Order::Subtraction));
        assert!(Order::Division.needs_parens(Order::Division));
    }

    #[test]
    fn deserializes_snake_case_names() {
        let order: Order = serde_json::from_str("\"function_call\"").unwrap();
        assert_eq!(order, Order::FunctionCall);
    }
}
