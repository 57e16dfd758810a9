//! Typed declarations of constants, variables, types and channels.

use crate::expression::Expression;
use std::fmt::{self, Display, Formatter};

/// Type of a declared name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    Clock,
    /// Integer restricted to `[low, high]`
    Range(Expression, Expression),
    /// A previously declared type name
    Named(String),
    /// Record with named fields
    Struct(Vec<(Type, String)>),
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::Clock => write!(f, "clock"),
            Self::Range(low, high) => write!(f, "int[{low}, {high}]"),
            Self::Named(name) => write!(f, "{name}"),
            Self::Struct(fields) => {
                write!(f, "struct {{ ")?;
                for (ty, name) in fields {
                    write!(f, "{ty} {name}; ")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Initial value of a declared name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Initializer {
    Value(Expression),
    List(Vec<Initializer>),
}

impl Initializer {
    /// One-dimensional list of integers
    #[must_use]
    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Self::List(
            values
                .into_iter()
                .map(|value| Self::Value(Expression::Number(value)))
                .collect(),
        )
    }

    /// Two-dimensional table of integers
    #[must_use]
    pub fn table<R>(rows: impl IntoIterator<Item = R>) -> Self
    where
        R: IntoIterator<Item = i64>,
    {
        Self::List(rows.into_iter().map(Self::ints).collect())
    }

    /// One-dimensional list of booleans
    #[must_use]
    pub fn bools(values: impl IntoIterator<Item = bool>) -> Self {
        Self::List(
            values
                .into_iter()
                .map(|value| Self::Value(Expression::Boolean(value)))
                .collect(),
        )
    }
}

impl Display for Initializer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{value}"),
            Self::List(items) => {
                write!(f, "{{")?;
                let mut items = items.iter();
                if let Some(item) = items.next() {
                    write!(f, "{item}")?;
                    for item in items {
                        write!(f, ", {item}")?;
                    }
                }
                write!(f, "}}")
            }
        }
    }
}

/// A global or template-local declaration.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Declaration {
    Constant {
        ty: Type,
        name: String,
        dimensions: Vec<Expression>,
        value: Initializer,
    },
    Variable {
        ty: Type,
        name: String,
        dimensions: Vec<Expression>,
        initial: Option<Initializer>,
    },
    Typedef {
        name: String,
        ty: Type,
    },
    Channel {
        name: String,
        urgent: bool,
        broadcast: bool,
        dimensions: Vec<Expression>,
    },
}

impl Declaration {
    /// `const int name = value;`
    #[must_use]
    pub fn int_constant(name: impl Into<String>, value: i64) -> Self {
        Self::Constant {
            ty: Type::Int,
            name: name.into(),
            dimensions: Vec::new(),
            value: Initializer::Value(Expression::Number(value)),
        }
    }

    /// `const bool name = value;`
    #[must_use]
    pub fn bool_constant(name: impl Into<String>, value: bool) -> Self {
        Self::Constant {
            ty: Type::Bool,
            name: name.into(),
            dimensions: Vec::new(),
            value: Initializer::Value(Expression::Boolean(value)),
        }
    }

    /// Constant array with the given dimensions
    #[must_use]
    pub fn constant_array(
        ty: Type,
        name: impl Into<String>,
        dimensions: Vec<Expression>,
        value: Initializer,
    ) -> Self {
        Self::Constant {
            ty,
            name: name.into(),
            dimensions,
            value,
        }
    }

    /// Scalar variable, optionally initialised
    #[must_use]
    pub fn variable(ty: Type, name: impl Into<String>, initial: Option<Expression>) -> Self {
        Self::Variable {
            ty,
            name: name.into(),
            dimensions: Vec::new(),
            initial: initial.map(Initializer::Value),
        }
    }

    /// Array variable, optionally initialised
    #[must_use]
    pub fn array(
        ty: Type,
        name: impl Into<String>,
        dimensions: Vec<Expression>,
        initial: Option<Initializer>,
    ) -> Self {
        Self::Variable {
            ty,
            name: name.into(),
            dimensions,
            initial,
        }
    }

    #[must_use]
    pub fn typedef(name: impl Into<String>, ty: Type) -> Self {
        Self::Typedef {
            name: name.into(),
            ty,
        }
    }

    /// Channel or channel array
    #[must_use]
    pub fn channel(
        name: impl Into<String>,
        urgent: bool,
        broadcast: bool,
        dimensions: Vec<Expression>,
    ) -> Self {
        Self::Channel {
            name: name.into(),
            urgent,
            broadcast,
            dimensions,
        }
    }

    /// The declared name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Constant { name, .. }
            | Self::Variable { name, .. }
            | Self::Typedef { name, .. }
            | Self::Channel { name, .. } => name,
        }
    }

    #[must_use]
    pub fn is_channel(&self) -> bool {
        matches!(self, Self::Channel { .. })
    }
}

fn fmt_dimensions(f: &mut Formatter<'_>, dimensions: &[Expression]) -> fmt::Result {
    for dimension in dimensions {
        write!(f, "[{dimension}]")?;
    }
    Ok(())
}

impl Display for Declaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant {
                ty,
                name,
                dimensions,
                value,
            } => {
                write!(f, "const {ty} {name}")?;
                fmt_dimensions(f, dimensions)?;
                write!(f, " = {value};")
            }
            Self::Variable {
                ty,
                name,
                dimensions,
                initial,
            } => {
                write!(f, "{ty} {name}")?;
                fmt_dimensions(f, dimensions)?;
                if let Some(initial) = initial {
                    write!(f, " = {initial}")?;
                }
                write!(f, ";")
            }
            Self::Typedef { name, ty } => write!(f, "typedef {ty} {name};"),
            Self::Channel {
                name,
                urgent,
                broadcast,
                dimensions,
            } => {
                if *urgent {
                    write!(f, "urgent ")?;
                }
                if *broadcast {
                    write!(f, "broadcast ")?;
                }
                write!(f, "chan {name}")?;
                fmt_dimensions(f, dimensions)?;
                write!(f, ";")
            }
        }
    }
}
