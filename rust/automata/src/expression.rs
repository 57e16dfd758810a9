//! Guard, invariant and update expressions.
//!
//! Expressions print in the C-like syntax of timed-automaton tools, with the
//! minimal parentheses their operator precedence requires.

use std::fmt::{self, Display, Formatter};

/// Operator associativity for expression printing.
///
/// Determines the order in which operators of the same precedence are evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Associativity {
    /// Left-to-right associativity (e.g., `a - b - c` = `(a - b) - c`)
    Left,
    /// Right-to-left associativity (e.g., `!!a` = `!(!a)`)
    Right,
}

/// Trait for operators in expressions.
pub trait Operator {
    /// Returns the precedence level of this operator.
    ///
    /// Lower numbers bind more tightly (higher precedence).
    fn precedence(&self) -> usize;

    /// Returns the associativity of this operator.
    fn associativity(&self) -> Associativity;
}

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical negation (`!`)
    Not,
    /// Arithmetic negation (`-`)
    Minus,
}

impl Operator for UnaryOp {
    fn associativity(&self) -> Associativity {
        Associativity::Right
    }

    fn precedence(&self) -> usize {
        2
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not => write!(f, "!"),
            Self::Minus => write!(f, "-"),
        }
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Logical AND (`&&`)
    LAnd,
    /// Logical OR (`||`)
    LOr,
    /// Equality (`==`)
    Equal,
    /// Inequality (`!=`)
    NotEqual,
    /// Less than (`<`)
    Less,
    /// Greater than (`>`)
    Greater,
    /// Less than or equal (`<=`)
    LessEqual,
    /// Greater than or equal (`>=`)
    GreaterEqual,
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Remainder (`%`)
    Modulo,
}

impl Operator for BinaryOp {
    fn associativity(&self) -> Associativity {
        Associativity::Left
    }

    fn precedence(&self) -> usize {
        match self {
            Self::LAnd => 11,
            Self::LOr => 12,
            Self::Equal | Self::NotEqual => 7,
            Self::Less | Self::Greater | Self::LessEqual | Self::GreaterEqual => 6,
            Self::Add | Self::Subtract => 4,
            Self::Multiply | Self::Divide | Self::Modulo => 3,
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::LAnd => write!(f, "&&"),
            Self::LOr => write!(f, "||"),
            Self::Equal => write!(f, "=="),
            Self::NotEqual => write!(f, "!="),
            Self::Less => write!(f, "<"),
            Self::Greater => write!(f, ">"),
            Self::LessEqual => write!(f, "<="),
            Self::GreaterEqual => write!(f, ">="),
            Self::Add => write!(f, "+"),
            Self::Subtract => write!(f, "-"),
            Self::Multiply => write!(f, "*"),
            Self::Divide => write!(f, "/"),
            Self::Modulo => write!(f, "%"),
        }
    }
}

/// Expression over named variables, constants and functions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expression<N = String> {
    /// Variable, constant or clock reference
    Name(N),
    /// Boolean constant
    Boolean(bool),
    /// Integer constant
    Number(i64),
    /// Unary operation
    Unary(UnaryOp, Box<Self>),
    /// Binary operation
    Binary(BinaryOp, Box<Self>, Box<Self>),
    /// Array subscript `base[index]`
    Index(Box<Self>, Box<Self>),
    /// Struct field `base.field`
    Field(Box<Self>, N),
    /// Function call
    Call(N, Vec<Self>),
}

impl<N> Expression<N> {
    /// Combine two expressions with a binary operator
    #[must_use]
    pub fn binary(op: BinaryOp, left: Self, right: Self) -> Self {
        Self::Binary(op, Box::new(left), Box::new(right))
    }

    /// Logical negation
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Unary(UnaryOp::Not, Box::new(self))
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::binary(BinaryOp::LAnd, self, other)
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::binary(BinaryOp::LOr, self, other)
    }

    #[must_use]
    pub fn equals(self, other: Self) -> Self {
        Self::binary(BinaryOp::Equal, self, other)
    }

    #[must_use]
    pub fn not_equals(self, other: Self) -> Self {
        Self::binary(BinaryOp::NotEqual, self, other)
    }

    #[must_use]
    pub fn less(self, other: Self) -> Self {
        Self::binary(BinaryOp::Less, self, other)
    }

    #[must_use]
    pub fn less_eq(self, other: Self) -> Self {
        Self::binary(BinaryOp::LessEqual, self, other)
    }

    #[must_use]
    pub fn greater(self, other: Self) -> Self {
        Self::binary(BinaryOp::Greater, self, other)
    }

    #[must_use]
    pub fn greater_eq(self, other: Self) -> Self {
        Self::binary(BinaryOp::GreaterEqual, self, other)
    }

    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self::binary(BinaryOp::Add, self, other)
    }

    #[must_use]
    pub fn minus(self, other: Self) -> Self {
        Self::binary(BinaryOp::Subtract, self, other)
    }

    #[must_use]
    pub fn modulo(self, other: Self) -> Self {
        Self::binary(BinaryOp::Modulo, self, other)
    }

    /// Array subscript
    #[must_use]
    pub fn at(self, index: Self) -> Self {
        Self::Index(Box::new(self), Box::new(index))
    }

    /// Struct field access
    #[must_use]
    pub fn field(self, field: N) -> Self {
        Self::Field(Box::new(self), field)
    }

    /// Conjunction of all operands; `true` when there are none.
    #[must_use]
    pub fn all(operands: impl IntoIterator<Item = Self>) -> Self {
        operands
            .into_iter()
            .reduce(Self::and)
            .unwrap_or(Self::Boolean(true))
    }

    /// Disjunction of all operands; `false` when there are none.
    #[must_use]
    pub fn any(operands: impl IntoIterator<Item = Self>) -> Self {
        operands
            .into_iter()
            .reduce(Self::or)
            .unwrap_or(Self::Boolean(false))
    }
}

impl Expression<String> {
    /// Reference a named variable
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Integer constant from an index or count
    #[must_use]
    pub fn int(value: impl TryInto<i64>) -> Self {
        Self::Number(value.try_into().unwrap_or(i64::MAX))
    }

    /// Call a named function
    #[must_use]
    pub fn call(function: impl Into<String>, arguments: Vec<Self>) -> Self {
        Self::Call(function.into(), arguments)
    }
}

impl<N: Display> Expression<N> {
    fn fmt_bracketed(
        &self,
        f: &mut Formatter<'_>,
        associativity: Associativity,
        precedence: usize,
        op: &impl Operator,
        fmt: impl FnOnce(&mut Formatter<'_>) -> fmt::Result,
    ) -> fmt::Result {
        if op.precedence() > precedence
            || (op.precedence() == precedence && op.associativity() == associativity)
        {
            write!(f, "(")?;
            fmt(f)?;
            return write!(f, ")");
        }

        fmt(f)
    }

    fn fmt_postfix_base(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unary(..) | Self::Binary(..) => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }

    fn fmt_inner(
        &self,
        f: &mut Formatter<'_>,
        associativity: Associativity,
        precedence: usize,
    ) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Boolean(boolean) => write!(f, "{boolean}"),
            Self::Number(number) => write!(f, "{number}"),
            Self::Unary(op, expression) => {
                self.fmt_bracketed(f, associativity, precedence, op, |f| {
                    write!(f, "{op}")?;
                    expression.fmt_inner(f, Associativity::Left, op.precedence())
                })
            }
            Self::Binary(op, left, right) => {
                self.fmt_bracketed(f, associativity, precedence, op, |f| {
                    left.fmt_inner(f, Associativity::Right, op.precedence())?;
                    write!(f, " {op} ")?;
                    right.fmt_inner(f, Associativity::Left, op.precedence())
                })
            }
            Self::Index(base, index) => {
                base.fmt_postfix_base(f)?;
                write!(f, "[{index}]")
            }
            Self::Field(base, field) => {
                base.fmt_postfix_base(f)?;
                write!(f, ".{field}")
            }
            Self::Call(function, arguments) => {
                write!(f, "{function}(")?;
                let mut arguments = arguments.iter();
                if let Some(argument) = arguments.next() {
                    write!(f, "{argument}")?;
                    for argument in arguments {
                        write!(f, ", {argument}")?;
                    }
                }
                write!(f, ")")
            }
        }
    }
}

impl<N: Display> Display for Expression<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.fmt_inner(f, Associativity::Left, usize::MAX)
    }
}
