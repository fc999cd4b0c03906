//! Abstract syntax tree
//!
//! The parser builds these nodes bottom-up and never changes them afterwards.
//! Every node has a [`NodeId`] that is unique within one parse, which keys
//! side tables such as [`TypeTable`], and the [`Span`] of its source.
//!
//! Nodes compare structurally: ids and spans are ignored by `PartialEq`, so
//! two parses of equivalent text compare equal.

use serde::Serialize;
use std::collections::HashMap;

use crate::util::span::Span;

/// Identity of a node within one parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Literal as written; numbers keep their source text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    /// Integer text, e.g. `-0x1FL`
    Int(String),
    /// Floating point text, e.g. `1.5e3f`
    Flt(String),
    /// Decimal text, e.g. `12.50m`
    Dec(String),
    /// Decoded string
    Str(String),
    /// Decoded character
    Char(char),
    /// `true` or `false`
    Bool(bool),
    /// `null`
    Null,
    /// `nothing`
    Nothing,
    /// `eof`
    Eof,
}

/// Type annotation, kept but not checked
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeAnno {
    /// Type name
    pub name: String,
    /// Type parameters (`Name[T, U]`)
    pub params: Vec<TypeAnno>,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl BinOp {
    /// Operator symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    /// Binding strength; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Mod => 6,
        }
    }
}

/// Prefix operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    /// `-e`
    Neg,
    /// `!e`
    Not,
    /// `@cell`
    Deref,
}

impl UnaryOp {
    /// Operator symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
            UnaryOp::Deref => "@",
        }
    }
}

/// One `var` or `local` declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    /// Declared pattern
    pub pat: Pat,
    /// Initializer
    pub value: Option<Node>,
}

/// `of pat [when guard] then body`, also used by `catch`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseClause {
    /// Pattern
    pub pat: Pat,
    /// Optional guard
    pub guard: Option<Node>,
    /// Clause body
    pub body: Node,
}

/// Member of an `actor` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ActorItem {
    /// Initializer statement
    Stmt(Node),
    /// `ask` handler
    Ask(CaseClause),
    /// `tell` handler
    Tell(CaseClause),
}

/// AST node
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    /// Identity within the parse
    pub id: NodeId,
    /// Source of the node
    pub span: Span,
    /// Node variant
    pub kind: NodeKind,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// AST node variants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    /// Identifier reference
    Ident(String),
    /// Literal value
    Literal(Literal),
    /// `var x = e, y`
    Var(Vec<VarDecl>),
    /// `local x = e in body end`
    Local {
        /// Declarations
        decls: Vec<VarDecl>,
        /// Scope body
        body: Box<Node>,
    },
    /// `begin body end`
    Begin(Box<Node>),
    /// Statement sequence
    Seq(Vec<Node>),
    /// `if c then a elseif d then b else e end`
    If {
        /// Conditions and their branches
        branches: Vec<(Node, Node)>,
        /// `else` branch
        otherwise: Option<Box<Node>>,
    },
    /// `case arg of ... else ... end`
    Case {
        /// Tested expression
        arg: Box<Node>,
        /// Clauses in order
        clauses: Vec<CaseClause>,
        /// `else` branch
        otherwise: Option<Box<Node>>,
    },
    /// `for pat in iter do body end`
    For {
        /// Element pattern
        pat: Pat,
        /// Iterable
        iter: Box<Node>,
        /// Loop body
        body: Box<Node>,
    },
    /// `while cond do body end`
    While {
        /// Loop condition
        cond: Box<Node>,
        /// Loop body
        body: Box<Node>,
    },
    /// `func [name](formals) [-> T] in body end`
    Func {
        /// Name, for a named definition
        name: Option<String>,
        /// Formal parameters
        formals: Vec<Pat>,
        /// Result annotation
        ret_anno: Option<TypeAnno>,
        /// Body; its last expression is the result
        body: Box<Node>,
    },
    /// `proc [name](formals) in body end`
    Proc {
        /// Name, for a named definition
        name: Option<String>,
        /// Formal parameters
        formals: Vec<Pat>,
        /// Body
        body: Box<Node>,
    },
    /// `act body end`
    Act(Box<Node>),
    /// `spawn(cfg)`
    Spawn(Box<Node>),
    /// `self`
    SelfRef,
    /// `actor [name](formals) in items end`
    Actor {
        /// Name, for a named definition
        name: Option<String>,
        /// Constructor parameters
        formals: Vec<Pat>,
        /// Initializers and handlers in source order
        items: Vec<ActorItem>,
    },
    /// `import a.b.C` or `import a.b.{C, D}`
    Import {
        /// Module path
        qualifier: Vec<String>,
        /// Imported names
        names: Vec<String>,
    },
    /// `throw e`
    Throw(Box<Node>),
    /// `try body catch ... finally ... end`
    Try {
        /// Protected body
        body: Box<Node>,
        /// Catch clauses in order
        catches: Vec<CaseClause>,
        /// `finally` block
        finally: Option<Box<Node>>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return [e]`
    Return(Option<Box<Node>>),
    /// `skip`
    Skip,
    /// `a = b`
    Unify {
        /// Left side
        left: Box<Node>,
        /// Right side
        right: Box<Node>,
    },
    /// `cell := value`
    Assign {
        /// Cell identifier
        left: Box<Node>,
        /// New content
        right: Box<Node>,
    },
    /// Binary arithmetic or comparison
    BinOp {
        /// Operator
        op: BinOp,
        /// Left operand
        left: Box<Node>,
        /// Right operand
        right: Box<Node>,
    },
    /// `a && b`
    And(Box<Node>, Box<Node>),
    /// `a || b`
    Or(Box<Node>, Box<Node>),
    /// Prefix operator
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        arg: Box<Node>,
    },
    /// `rec.feature`
    Select {
        /// Record expression
        rec: Box<Node>,
        /// Feature
        feature: Literal,
    },
    /// `rec[index]`
    Index {
        /// Record expression
        rec: Box<Node>,
        /// Feature expression
        index: Box<Node>,
    },
    /// `proc(args)`
    Apply {
        /// Procedure expression
        proc: Box<Node>,
        /// Arguments
        args: Vec<Node>,
    },
    /// `[label#]{feature: value, ...}`
    Rec {
        /// Label
        label: Option<Literal>,
        /// Fields in source order
        fields: Vec<(Literal, Node)>,
    },
    /// `[label#][value, ...]`
    Tuple {
        /// Label
        label: Option<Literal>,
        /// Values
        values: Vec<Node>,
    },
}

/// Pattern node
#[derive(Debug, Clone, Serialize)]
pub struct Pat {
    /// Identity within the parse
    pub id: NodeId,
    /// Source of the pattern
    pub span: Span,
    /// Pattern variant
    pub kind: PatKind,
}

impl PartialEq for Pat {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// Pattern variants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PatKind {
    /// Binds a new identifier
    Ident {
        /// Identifier name
        name: String,
        /// Optional annotation
        anno: Option<TypeAnno>,
    },
    /// `_`
    Anon,
    /// `~x`: equal to the current value of `x`
    Escaped(String),
    /// Literal equality
    Literal(Literal),
    /// Record shape
    Rec {
        /// Label
        label: Option<Literal>,
        /// Field patterns
        fields: Vec<(Literal, Pat)>,
        /// Trailing `...`
        partial: bool,
    },
    /// Tuple shape
    Tuple {
        /// Label
        label: Option<Literal>,
        /// Positional patterns
        values: Vec<Pat>,
        /// Trailing `...`
        partial: bool,
    },
}

impl Pat {
    /// Whether this pattern is a record or tuple
    pub fn is_compound(&self) -> bool {
        matches!(self.kind, PatKind::Rec { .. } | PatKind::Tuple { .. })
    }

    /// Names bound by this pattern, in pre-order
    pub fn binders(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_binders(&mut names);
        names
    }

    fn collect_binders(&self, names: &mut Vec<String>) {
        match &self.kind {
            PatKind::Ident { name, .. } => {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            PatKind::Rec { fields, .. } => {
                for (_, pat) in fields {
                    pat.collect_binders(names);
                }
            }
            PatKind::Tuple { values, .. } => {
                for pat in values {
                    pat.collect_binders(names);
                }
            }
            PatKind::Anon | PatKind::Escaped(_) | PatKind::Literal(_) => {}
        }
    }
}

/// Write-once side table of inferred types keyed by node
#[derive(Debug, Default, Clone)]
pub struct TypeTable {
    types: HashMap<NodeId, TypeAnno>,
}

impl TypeTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the type of `id`; a node's type can be set once
    pub fn set(&mut self, id: NodeId, ty: TypeAnno) -> Result<(), TypeAnno> {
        if let Some(existing) = self.types.get(&id) {
            return Err(existing.clone());
        }
        self.types.insert(id, ty);
        Ok(())
    }

    /// Recorded type of `id`
    pub fn get(&self, id: NodeId) -> Option<&TypeAnno> {
        self.types.get(&id)
    }

    /// Number of typed nodes
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no node is typed
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u32, kind: NodeKind) -> Node {
        Node {
            id: NodeId(id),
            span: Span::none(),
            kind,
        }
    }

    #[test]
    fn test_nodes_compare_structurally() {
        let a = node(1, NodeKind::Literal(Literal::Int("1".into())));
        let b = node(7, NodeKind::Literal(Literal::Int("1".into())));
        assert_eq!(a, b);
        assert_ne!(a, node(1, NodeKind::Literal(Literal::Int("2".into()))));
    }

    #[test]
    fn test_pattern_binders_preorder() {
        let pat = |kind| Pat {
            id: NodeId(0),
            span: Span::none(),
            kind,
        };
        let ident = |name: &str| {
            pat(PatKind::Ident {
                name: name.into(),
                anno: None,
            })
        };
        let nested = pat(PatKind::Tuple {
            label: None,
            values: vec![
                ident("a"),
                pat(PatKind::Tuple {
                    label: None,
                    values: vec![ident("b"), pat(PatKind::Anon)],
                    partial: true,
                }),
                ident("a"),
            ],
            partial: false,
        });
        assert!(nested.is_compound());
        assert_eq!(nested.binders(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_type_table_is_write_once() {
        let mut table = TypeTable::new();
        let int = TypeAnno {
            name: "Int32".into(),
            params: vec![],
        };
        assert!(table.set(NodeId(3), int.clone()).is_ok());
        assert_eq!(table.set(NodeId(3), int.clone()), Err(int.clone()));
        assert_eq!(table.get(NodeId(3)), Some(&int));
        assert_eq!(table.len(), 1);
    }
}
