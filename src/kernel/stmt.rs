//! Kernel statements
//!
//! The generator lowers the AST into this small statement language. Every
//! statement carries the [`Span`] of the source construct it came from.
//! Children are shared through `Arc` so the machine can push them onto its
//! stack without copying.

use std::fmt;
use std::sync::Arc;

use super::ident::Ident;
use super::value::{Feature, Value};
use crate::util::span::Span;

/// Label id caught by loops for `break`
pub const BREAK_ID: u32 = 1;
/// Label id caught by loop bodies for `continue`
pub const CONTINUE_ID: u32 = 2;
/// Label id caught by function bodies for `return`
pub const RETURN_ID: u32 = 3;

/// Operand that is either a literal value or an identifier
#[derive(Debug, Clone, PartialEq)]
pub enum CompleteOrIdent {
    /// Literal value
    Value(Value),
    /// Identifier looked up in the environment
    Ident(Ident),
}

impl CompleteOrIdent {
    /// Identifier operand, if any
    pub fn as_ident(&self) -> Option<&Ident> {
        match self {
            CompleteOrIdent::Ident(ident) => Some(ident),
            CompleteOrIdent::Value(_) => None,
        }
    }
}

impl From<Ident> for CompleteOrIdent {
    fn from(ident: Ident) -> Self {
        CompleteOrIdent::Ident(ident)
    }
}

impl fmt::Display for CompleteOrIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompleteOrIdent::Value(value) => write!(f, "{}", value),
            CompleteOrIdent::Ident(ident) => write!(f, "{}", ident),
        }
    }
}

/// Feature operand that is either a literal feature or an identifier
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureOrIdent {
    /// Literal feature
    Feature(Feature),
    /// Identifier whose value is used as the feature
    Ident(Ident),
}

impl fmt::Display for FeatureOrIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureOrIdent::Feature(feature) => write!(f, "{}", feature),
            FeatureOrIdent::Ident(ident) => write!(f, "{}", ident),
        }
    }
}

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
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
}

impl ArithOp {
    /// Operator symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// Ordering comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl RelOp {
    /// Operator symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            RelOp::Lt => "<",
            RelOp::Le => "<=",
            RelOp::Gt => ">",
            RelOp::Ge => ">=",
        }
    }
}

/// Field of a single-level record pattern
#[derive(Debug, Clone, PartialEq)]
pub enum CaseField {
    /// Bind the field to a fresh identifier visible in the case body
    Bind(Ident),
    /// Field must equal a literal
    Value(Value),
    /// Field must equal the current value of an identifier
    Escaped(Ident),
    /// Anonymous `_`: field must exist, value ignored
    Anon,
}

/// Single-level pattern tested by `Case`/`CaseElse`
#[derive(Debug, Clone, PartialEq)]
pub enum CasePat {
    /// Scalar literal equality
    Value(Value),
    /// Equality with the current value of an identifier
    Escaped(Ident),
    /// Record (or tuple) shape
    Rec {
        /// Required label (`None` is the default label)
        label: Option<Feature>,
        /// Field tests in feature order
        fields: Vec<(Feature, CaseField)>,
        /// Whether extra features are permitted (`...`)
        partial: bool,
    },
}

impl CasePat {
    /// Identifiers introduced by a successful match
    pub fn binders(&self) -> Vec<Ident> {
        match self {
            CasePat::Rec { fields, .. } => fields
                .iter()
                .filter_map(|(_, field)| match field {
                    CaseField::Bind(ident) => Some(ident.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for CasePat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CasePat::Value(value) => write!(f, "{}", value),
            CasePat::Escaped(ident) => write!(f, "~{}", ident),
            CasePat::Rec {
                label,
                fields,
                partial,
            } => {
                if let Some(label) = label {
                    write!(f, "{}#", label)?;
                }
                write!(f, "{{")?;
                for (index, (feature, field)) in fields.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: ", feature)?;
                    match field {
                        CaseField::Bind(ident) => write!(f, "{}", ident)?,
                        CaseField::Value(value) => write!(f, "{}", value)?,
                        CaseField::Escaped(ident) => write!(f, "~{}", ident)?,
                        CaseField::Anon => write!(f, "_")?,
                    }
                }
                if *partial {
                    if !fields.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Procedure definition shared by every closure created from it
#[derive(Debug)]
pub struct ProcDef {
    /// Formal parameters; functions carry their result parameter last
    pub formals: Vec<Ident>,
    /// Procedure body
    pub body: Arc<Stmt>,
    /// Identifiers the body uses but does not declare
    pub free_idents: Vec<Ident>,
    /// Source of the definition
    pub span: Span,
}

impl ProcDef {
    /// Create a definition and compute its free identifiers
    pub fn new(formals: Vec<Ident>, body: Arc<Stmt>, span: Span) -> Self {
        let mut bound = formals.clone();
        let mut free = Vec::new();
        body.collect_free(&mut bound, &mut free);
        Self {
            formals,
            body,
            free_idents: free,
            span,
        }
    }
}

/// Kernel statement with its source span
#[derive(Debug)]
pub struct Stmt {
    /// Statement variant
    pub kind: StmtKind,
    /// Source construct this statement was lowered from
    pub span: Span,
}

/// Kernel statement variants
#[derive(Debug)]
pub enum StmtKind {
    /// Declare fresh variables for `idents` and run `body`
    Local {
        /// Declared identifiers
        idents: Vec<Ident>,
        /// Scope body
        body: Arc<Stmt>,
    },
    /// Run statements in order
    Seq(Vec<Arc<Stmt>>),
    /// Do nothing
    Skip,
    /// Bind (unify) an identifier with an operand
    Bind {
        /// Identifier to bind
        target: Ident,
        /// Value or identifier bound to it
        value: CompleteOrIdent,
    },
    /// Unify two operands
    Unify {
        /// Left operand
        left: CompleteOrIdent,
        /// Right operand
        right: CompleteOrIdent,
    },
    /// Conditional without alternative
    If {
        /// Boolean condition
        cond: CompleteOrIdent,
        /// Branch taken when true
        then: Arc<Stmt>,
    },
    /// Conditional with alternative
    IfElse {
        /// Boolean condition
        cond: CompleteOrIdent,
        /// Branch taken when true
        then: Arc<Stmt>,
        /// Branch taken when false
        otherwise: Arc<Stmt>,
    },
    /// Single-level pattern test; no match does nothing
    Case {
        /// Tested identifier
        arg: Ident,
        /// Pattern
        pat: CasePat,
        /// Body run with pattern binders in scope
        body: Arc<Stmt>,
    },
    /// Single-level pattern test with alternative
    CaseElse {
        /// Tested identifier
        arg: Ident,
        /// Pattern
        pat: CasePat,
        /// Body run with pattern binders in scope
        body: Arc<Stmt>,
        /// Alternative when the pattern does not match
        otherwise: Arc<Stmt>,
    },
    /// Procedure application
    Apply {
        /// Procedure operand
        proc: CompleteOrIdent,
        /// Actual arguments
        args: Vec<CompleteOrIdent>,
    },
    /// Create a closure and bind it
    CreateProc {
        /// Identifier receiving the closure
        target: Ident,
        /// Procedure definition
        def: Arc<ProcDef>,
    },
    /// Create a record and bind it
    CreateRec {
        /// Identifier receiving the record
        target: Ident,
        /// Record label
        label: Option<Feature>,
        /// Fields
        fields: Vec<(Feature, CompleteOrIdent)>,
    },
    /// Create a tuple and bind it
    CreateTuple {
        /// Identifier receiving the tuple
        target: Ident,
        /// Tuple label
        label: Option<Feature>,
        /// Positional values
        values: Vec<CompleteOrIdent>,
    },
    /// Create an actor configurator and bind it
    CreateActorCfgtr {
        /// Identifier receiving the configurator
        target: Ident,
        /// Handler constructor (`formals..., $handlers`)
        def: Arc<ProcDef>,
    },
    /// Select a feature of a record (or member of a host object)
    Select {
        /// Record operand
        rec: CompleteOrIdent,
        /// Feature
        feature: FeatureOrIdent,
        /// Identifier receiving the field
        target: Ident,
    },
    /// Read a cell (`@c`)
    GetCellValue {
        /// Cell operand
        cell: CompleteOrIdent,
        /// Identifier receiving the content
        target: Ident,
    },
    /// Write a cell (`c := v`)
    SetCellValue {
        /// Cell operand
        cell: CompleteOrIdent,
        /// New content
        value: CompleteOrIdent,
    },
    /// Binary arithmetic
    Arith {
        /// Operator
        op: ArithOp,
        /// Left operand
        left: CompleteOrIdent,
        /// Right operand
        right: CompleteOrIdent,
        /// Result identifier
        target: Ident,
    },
    /// Arithmetic negation
    Negate {
        /// Operand
        arg: CompleteOrIdent,
        /// Result identifier
        target: Ident,
    },
    /// Boolean negation
    Not {
        /// Operand
        arg: CompleteOrIdent,
        /// Result identifier
        target: Ident,
    },
    /// Ordering comparison
    Relational {
        /// Operator
        op: RelOp,
        /// Left operand
        left: CompleteOrIdent,
        /// Right operand
        right: CompleteOrIdent,
        /// Result identifier
        target: Ident,
    },
    /// `==` over complete values
    Entails {
        /// Left operand
        left: CompleteOrIdent,
        /// Right operand
        right: CompleteOrIdent,
        /// Result identifier
        target: Ident,
    },
    /// `!=` over complete values
    Disentails {
        /// Left operand
        left: CompleteOrIdent,
        /// Right operand
        right: CompleteOrIdent,
        /// Result identifier
        target: Ident,
    },
    /// Raise an error value
    Throw {
        /// Error operand
        error: CompleteOrIdent,
    },
    /// Run `body`; on a throw bind the error to `catch_ident` and run `catch_body`
    Try {
        /// Protected body
        body: Arc<Stmt>,
        /// Identifier receiving the error
        catch_ident: Ident,
        /// Handler
        catch_body: Arc<Stmt>,
    },
    /// Unwind to the nearest matching `JumpCatch`
    JumpThrow(u32),
    /// Stop a matching `JumpThrow`; a no-op when reached normally
    JumpCatch(u32),
    /// Run a computation concurrently and bind its result
    Act {
        /// Computation as a one-parameter procedure receiving the result
        def: Arc<ProcDef>,
        /// Identifier receiving the result
        target: Ident,
    },
    /// Start a child actor from an actor configuration
    Spawn {
        /// Configuration operand
        cfg: CompleteOrIdent,
        /// Identifier receiving the actor reference
        target: Ident,
    },
    /// Bind names exported by a registered module
    Import {
        /// Module path, e.g. `system`
        qualifier: Vec<String>,
        /// Exported name and the identifier receiving it
        names: Vec<(String, Ident)>,
    },
    /// Bind the running actor's reference
    SelfRef {
        /// Identifier receiving the reference
        target: Ident,
    },
}

impl Stmt {
    /// Create a statement
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Create a shared statement
    pub fn arc(kind: StmtKind, span: Span) -> Arc<Self> {
        Arc::new(Self::new(kind, span))
    }

    /// Identifiers used but not declared by this statement
    pub fn free_idents(&self) -> Vec<Ident> {
        let mut bound = Vec::new();
        let mut free = Vec::new();
        self.collect_free(&mut bound, &mut free);
        free
    }

    fn collect_free(&self, bound: &mut Vec<Ident>, free: &mut Vec<Ident>) {
        fn use_ident(ident: &Ident, bound: &[Ident], free: &mut Vec<Ident>) {
            if !bound.contains(ident) && !free.contains(ident) {
                free.push(ident.clone());
            }
        }
        fn use_operand(operand: &CompleteOrIdent, bound: &[Ident], free: &mut Vec<Ident>) {
            if let CompleteOrIdent::Ident(ident) = operand {
                use_ident(ident, bound, free);
            }
        }
        fn scoped(
            stmt: &Stmt,
            declared: impl IntoIterator<Item = Ident>,
            bound: &mut Vec<Ident>,
            free: &mut Vec<Ident>,
        ) {
            let mark = bound.len();
            bound.extend(declared);
            stmt.collect_free(bound, free);
            bound.truncate(mark);
        }
        fn use_pat(pat: &CasePat, bound: &[Ident], free: &mut Vec<Ident>) {
            match pat {
                CasePat::Escaped(ident) => use_ident(ident, bound, free),
                CasePat::Rec { fields, .. } => {
                    for (_, field) in fields {
                        if let CaseField::Escaped(ident) = field {
                            use_ident(ident, bound, free);
                        }
                    }
                }
                CasePat::Value(_) => {}
            }
        }

        match &self.kind {
            StmtKind::Local { idents, body } => scoped(body, idents.iter().cloned(), bound, free),
            StmtKind::Seq(stmts) => {
                for stmt in stmts {
                    stmt.collect_free(bound, free);
                }
            }
            StmtKind::Skip | StmtKind::JumpThrow(_) | StmtKind::JumpCatch(_) => {}
            StmtKind::Bind { target, value } => {
                use_ident(target, bound, free);
                use_operand(value, bound, free);
            }
            StmtKind::Unify { left, right } => {
                use_operand(left, bound, free);
                use_operand(right, bound, free);
            }
            StmtKind::If { cond, then } => {
                use_operand(cond, bound, free);
                then.collect_free(bound, free);
            }
            StmtKind::IfElse {
                cond,
                then,
                otherwise,
            } => {
                use_operand(cond, bound, free);
                then.collect_free(bound, free);
                otherwise.collect_free(bound, free);
            }
            StmtKind::Case { arg, pat, body } => {
                use_ident(arg, bound, free);
                use_pat(pat, bound, free);
                scoped(body, pat.binders(), bound, free);
            }
            StmtKind::CaseElse {
                arg,
                pat,
                body,
                otherwise,
            } => {
                use_ident(arg, bound, free);
                use_pat(pat, bound, free);
                scoped(body, pat.binders(), bound, free);
                otherwise.collect_free(bound, free);
            }
            StmtKind::Apply { proc, args } => {
                use_operand(proc, bound, free);
                for arg in args {
                    use_operand(arg, bound, free);
                }
            }
            StmtKind::CreateProc { target, def }
            | StmtKind::CreateActorCfgtr { target, def }
            | StmtKind::Act { target, def } => {
                use_ident(target, bound, free);
                for ident in &def.free_idents {
                    use_ident(ident, bound, free);
                }
            }
            StmtKind::CreateRec { target, fields, .. } => {
                use_ident(target, bound, free);
                for (_, value) in fields {
                    use_operand(value, bound, free);
                }
            }
            StmtKind::CreateTuple { target, values, .. } => {
                use_ident(target, bound, free);
                for value in values {
                    use_operand(value, bound, free);
                }
            }
            StmtKind::Select {
                rec,
                feature,
                target,
            } => {
                use_operand(rec, bound, free);
                if let FeatureOrIdent::Ident(ident) = feature {
                    use_ident(ident, bound, free);
                }
                use_ident(target, bound, free);
            }
            StmtKind::GetCellValue { cell, target } => {
                use_operand(cell, bound, free);
                use_ident(target, bound, free);
            }
            StmtKind::SetCellValue { cell, value } => {
                use_operand(cell, bound, free);
                use_operand(value, bound, free);
            }
            StmtKind::Arith {
                left,
                right,
                target,
                ..
            }
            | StmtKind::Relational {
                left,
                right,
                target,
                ..
            }
            | StmtKind::Entails {
                left,
                right,
                target,
            }
            | StmtKind::Disentails {
                left,
                right,
                target,
            } => {
                use_operand(left, bound, free);
                use_operand(right, bound, free);
                use_ident(target, bound, free);
            }
            StmtKind::Negate { arg, target } | StmtKind::Not { arg, target } => {
                use_operand(arg, bound, free);
                use_ident(target, bound, free);
            }
            StmtKind::Throw { error } => use_operand(error, bound, free),
            StmtKind::Try {
                body,
                catch_ident,
                catch_body,
            } => {
                body.collect_free(bound, free);
                scoped(catch_body, [catch_ident.clone()], bound, free);
            }
            StmtKind::Spawn { cfg, target } => {
                use_operand(cfg, bound, free);
                use_ident(target, bound, free);
            }
            StmtKind::Import { names, .. } => {
                for (_, ident) in names {
                    use_ident(ident, bound, free);
                }
            }
            StmtKind::SelfRef { target } => use_ident(target, bound, free),
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "    ".repeat(depth);
        match &self.kind {
            StmtKind::Local { idents, body } => {
                let names: Vec<String> = idents.iter().map(|i| i.to_string()).collect();
                writeln!(f, "{}local {} in", pad, names.join(", "))?;
                body.write_indented(f, depth + 1)?;
                writeln!(f, "{}end", pad)
            }
            StmtKind::Seq(stmts) => {
                for stmt in stmts {
                    stmt.write_indented(f, depth)?;
                }
                Ok(())
            }
            StmtKind::Skip => writeln!(f, "{}skip", pad),
            StmtKind::Bind { target, value } => writeln!(f, "{}{} = {}", pad, target, value),
            StmtKind::Unify { left, right } => writeln!(f, "{}{} = {}", pad, left, right),
            StmtKind::If { cond, then } => {
                writeln!(f, "{}if {} then", pad, cond)?;
                then.write_indented(f, depth + 1)?;
                writeln!(f, "{}end", pad)
            }
            StmtKind::IfElse {
                cond,
                then,
                otherwise,
            } => {
                writeln!(f, "{}if {} then", pad, cond)?;
                then.write_indented(f, depth + 1)?;
                writeln!(f, "{}else", pad)?;
                otherwise.write_indented(f, depth + 1)?;
                writeln!(f, "{}end", pad)
            }
            StmtKind::Case { arg, pat, body } => {
                writeln!(f, "{}case {} of {} then", pad, arg, pat)?;
                body.write_indented(f, depth + 1)?;
                writeln!(f, "{}end", pad)
            }
            StmtKind::CaseElse {
                arg,
                pat,
                body,
                otherwise,
            } => {
                writeln!(f, "{}case {} of {} then", pad, arg, pat)?;
                body.write_indented(f, depth + 1)?;
                writeln!(f, "{}else", pad)?;
                otherwise.write_indented(f, depth + 1)?;
                writeln!(f, "{}end", pad)
            }
            StmtKind::Apply { proc, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                writeln!(f, "{}{}({})", pad, proc, args.join(", "))
            }
            StmtKind::CreateProc { target, def } => {
                write_def(f, &pad, depth, &format!("{} = proc", target), def)
            }
            StmtKind::CreateActorCfgtr { target, def } => {
                write_def(f, &pad, depth, &format!("{} = actor-cfgtr", target), def)
            }
            StmtKind::Act { target, def } => {
                write_def(f, &pad, depth, &format!("{} = act", target), def)
            }
            StmtKind::CreateRec {
                target,
                label,
                fields,
            } => {
                let fields: Vec<String> = fields
                    .iter()
                    .map(|(feature, value)| format!("{}: {}", feature, value))
                    .collect();
                let label = label.as_ref().map(|l| format!("{}#", l)).unwrap_or_default();
                writeln!(f, "{}{} = {}{{{}}}", pad, target, label, fields.join(", "))
            }
            StmtKind::CreateTuple {
                target,
                label,
                values,
            } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                let label = label.as_ref().map(|l| format!("{}#", l)).unwrap_or_default();
                writeln!(f, "{}{} = {}[{}]", pad, target, label, values.join(", "))
            }
            StmtKind::Select {
                rec,
                feature,
                target,
            } => writeln!(f, "{}{} = {}[{}]", pad, target, rec, feature),
            StmtKind::GetCellValue { cell, target } => {
                writeln!(f, "{}{} = @{}", pad, target, cell)
            }
            StmtKind::SetCellValue { cell, value } => writeln!(f, "{}{} := {}", pad, cell, value),
            StmtKind::Arith {
                op,
                left,
                right,
                target,
            } => writeln!(f, "{}{} = {} {} {}", pad, target, left, op.symbol(), right),
            StmtKind::Negate { arg, target } => writeln!(f, "{}{} = -{}", pad, target, arg),
            StmtKind::Not { arg, target } => writeln!(f, "{}{} = !{}", pad, target, arg),
            StmtKind::Relational {
                op,
                left,
                right,
                target,
            } => writeln!(f, "{}{} = {} {} {}", pad, target, left, op.symbol(), right),
            StmtKind::Entails {
                left,
                right,
                target,
            } => writeln!(f, "{}{} = {} == {}", pad, target, left, right),
            StmtKind::Disentails {
                left,
                right,
                target,
            } => writeln!(f, "{}{} = {} != {}", pad, target, left, right),
            StmtKind::Throw { error } => writeln!(f, "{}throw {}", pad, error),
            StmtKind::Try {
                body,
                catch_ident,
                catch_body,
            } => {
                writeln!(f, "{}try", pad)?;
                body.write_indented(f, depth + 1)?;
                writeln!(f, "{}catch {} then", pad, catch_ident)?;
                catch_body.write_indented(f, depth + 1)?;
                writeln!(f, "{}end", pad)
            }
            StmtKind::JumpThrow(id) => writeln!(f, "{}jump-throw {}", pad, id),
            StmtKind::JumpCatch(id) => writeln!(f, "{}jump-catch {}", pad, id),
            StmtKind::Spawn { cfg, target } => writeln!(f, "{}{} = spawn({})", pad, target, cfg),
            StmtKind::Import { qualifier, names } => {
                let names: Vec<String> = names
                    .iter()
                    .map(|(name, ident)| {
                        if ident.name() == Some(name.as_str()) {
                            name.clone()
                        } else {
                            format!("{} as {}", name, ident)
                        }
                    })
                    .collect();
                writeln!(f, "{}import {}.{{{}}}", pad, qualifier.join("."), names.join(", "))
            }
            StmtKind::SelfRef { target } => writeln!(f, "{}{} = self", pad, target),
        }
    }
}

fn write_def(
    f: &mut fmt::Formatter<'_>,
    pad: &str,
    depth: usize,
    head: &str,
    def: &ProcDef,
) -> fmt::Result {
    let formals: Vec<String> = def.formals.iter().map(|i| i.to_string()).collect();
    writeln!(f, "{}{}({}) in", pad, head, formals.join(", "))?;
    def.body.write_indented(f, depth + 1)?;
    writeln!(f, "{}end", pad)
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Ident {
        Ident::user(name)
    }

    #[test]
    fn test_free_idents_exclude_declarations() {
        let body = Stmt::arc(
            StmtKind::Arith {
                op: ArithOp::Add,
                left: ident("a").into(),
                right: ident("b").into(),
                target: ident("c"),
            },
            Span::none(),
        );
        let local = Stmt::new(
            StmtKind::Local {
                idents: vec![ident("c")],
                body,
            },
            Span::none(),
        );
        assert_eq!(local.free_idents(), vec![ident("a"), ident("b")]);
    }

    #[test]
    fn test_proc_def_free_idents_skip_formals() {
        let body = Stmt::arc(
            StmtKind::Bind {
                target: ident("r"),
                value: ident("outer").into(),
            },
            Span::none(),
        );
        let def = ProcDef::new(vec![ident("r")], body, Span::none());
        assert_eq!(def.free_idents, vec![ident("outer")]);
    }

    #[test]
    fn test_display_prints_nested_blocks() {
        let stmt = Stmt::new(
            StmtKind::IfElse {
                cond: ident("c").into(),
                then: Stmt::arc(StmtKind::Skip, Span::none()),
                otherwise: Stmt::arc(StmtKind::JumpThrow(BREAK_ID), Span::none()),
            },
            Span::none(),
        );
        assert_eq!(
            stmt.to_string(),
            "if c then\n    skip\nelse\n    jump-throw 1\nend\n"
        );
    }
}
