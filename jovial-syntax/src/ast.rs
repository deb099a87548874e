//! Declaration/statement tree for JOVIAL J73.
//!
//! The tree is deliberately shallow on the expression side: statements are
//! parsed just deeply enough to classify every identifier occurrence as a
//! read, write or call for cross-referencing.

use crate::span::Span;

/// A declared or referenced name with its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// `START name; ... TERM`
    Program,
    /// `COMPOOL name; ... TERM` — a shared-declaration pool source.
    Compool,
    /// No recognizable module header; common mid-edit.
    Fragment,
}

/// One parsed source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub kind: ModuleKind,
    pub name: Option<Name>,
    pub declarations: Vec<Declaration>,
    pub statements: Vec<Statement>,
    pub span: Span,
}

/// Declared type descriptor: kind letter plus width, with a scale for
/// fixed point or a member list for status enumerations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    Signed { width: Option<u32> },
    Unsigned { width: Option<u32> },
    Float { width: Option<u32> },
    Fixed { width: Option<u32>, scale: Option<u32> },
    Bit { width: Option<u32> },
    Character { width: Option<u32> },
    Pointer,
    Status { values: Vec<Name> },
    /// `LIKE other` — type copied from another declaration.
    Like { source: Name },
    Unknown,
}

impl TypeSpec {
    /// The descriptor as it would be written in source, e.g. `S 16` or
    /// `STATUS (V(ON), V(OFF))`.
    pub fn describe(&self) -> String {
        fn lettered(letter: &str, width: &Option<u32>) -> String {
            match width {
                Some(width) => format!("{letter} {width}"),
                None => letter.to_string(),
            }
        }
        match self {
            TypeSpec::Signed { width } => lettered("S", width),
            TypeSpec::Unsigned { width } => lettered("U", width),
            TypeSpec::Float { width } => lettered("F", width),
            TypeSpec::Fixed { width, scale } => match (width, scale) {
                (Some(width), Some(scale)) => format!("A {width},{scale}"),
                (Some(width), None) => format!("A {width}"),
                _ => "A".to_string(),
            },
            TypeSpec::Bit { width } => lettered("B", width),
            TypeSpec::Character { width } => lettered("C", width),
            TypeSpec::Pointer => "P".to_string(),
            TypeSpec::Status { values } => {
                let members = values
                    .iter()
                    .map(|value| format!("V({})", value.text))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("STATUS ({members})")
            }
            TypeSpec::Like { source } => format!("LIKE {}", source.text),
            TypeSpec::Unknown => String::new(),
        }
    }
}

/// One `lo : hi` table dimension. `label` is the dimension as written,
/// kept for hover/outline details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub lower: Expr,
    pub upper: Expr,
    pub label: String,
    pub span: Span,
}

/// Which way an external declaration faces: `DEF` exports to other
/// modules, `REF` imports from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalKind {
    Def,
    Ref,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    /// `DEFINE name = value;`
    Define {
        name: Name,
        value: Option<Expr>,
        doc: Option<String>,
        span: Span,
    },
    /// `ITEM name [STATIC|CONSTANT] type-spec [= init];`
    Item {
        name: Name,
        type_spec: TypeSpec,
        is_static: bool,
        is_constant: bool,
        initial: Option<Expr>,
        doc: Option<String>,
        span: Span,
    },
    /// `TABLE name (dims); BEGIN members END`
    Table {
        name: Name,
        dimensions: Vec<Dimension>,
        members: Vec<Declaration>,
        is_static: bool,
        is_constant: bool,
        doc: Option<String>,
        span: Span,
    },
    /// `PROC name (inputs : outputs); BEGIN decls stmts END`
    Proc {
        name: Name,
        inputs: Vec<Name>,
        outputs: Vec<Name>,
        declarations: Vec<Declaration>,
        statements: Vec<Statement>,
        doc: Option<String>,
        span: Span,
    },
    /// Nested `COMPOOL name; BEGIN members END` shared-data block.
    Compool {
        name: Name,
        members: Vec<Declaration>,
        doc: Option<String>,
        span: Span,
    },
    /// `DEF [ITEM|TABLE|PROC] name;` / `REF [ITEM|TABLE|PROC] name;`
    External {
        name: Name,
        kind: ExternalKind,
        doc: Option<String>,
        span: Span,
    },
}

impl Declaration {
    pub fn name(&self) -> &Name {
        match self {
            Declaration::Define { name, .. }
            | Declaration::Item { name, .. }
            | Declaration::Table { name, .. }
            | Declaration::Proc { name, .. }
            | Declaration::Compool { name, .. }
            | Declaration::External { name, .. } => name,
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Declaration::Define { span, .. }
            | Declaration::Item { span, .. }
            | Declaration::Table { span, .. }
            | Declaration::Proc { span, .. }
            | Declaration::Compool { span, .. }
            | Declaration::External { span, .. } => span,
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            Declaration::Define { doc, .. }
            | Declaration::Item { doc, .. }
            | Declaration::Table { doc, .. }
            | Declaration::Proc { doc, .. }
            | Declaration::Compool { doc, .. }
            | Declaration::External { doc, .. } => doc.as_deref(),
        }
    }
}

/// A variable reference: plain item or table element with subscripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarRef {
    pub name: Name,
    pub subscripts: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `target := value;`
    Assign {
        target: VarRef,
        value: Expr,
        span: Span,
    },
    /// `name (args);` or bare `name;` when followed by nothing callable.
    Call {
        name: Name,
        args: Vec<Expr>,
        span: Span,
    },
    If {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
        span: Span,
    },
    /// `FOR control : from [BY step] [WHILE cond]; body`
    For {
        control: Name,
        from: Expr,
        by: Option<Expr>,
        while_condition: Option<Expr>,
        body: Option<Box<Statement>>,
        span: Span,
    },
    Goto {
        label: Name,
        span: Span,
    },
    Return {
        span: Span,
    },
    Exit {
        span: Span,
    },
    Stop {
        span: Span,
    },
    /// `BEGIN stmts END`
    Block {
        statements: Vec<Statement>,
        span: Span,
    },
    /// A stray `;`.
    Empty {
        span: Span,
    },
}

impl Statement {
    pub fn span(&self) -> &Span {
        match self {
            Statement::Assign { span, .. }
            | Statement::Call { span, .. }
            | Statement::If { span, .. }
            | Statement::For { span, .. }
            | Statement::Goto { span, .. }
            | Statement::Return { span }
            | Statement::Exit { span }
            | Statement::Stop { span }
            | Statement::Block { span, .. }
            | Statement::Empty { span } => span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    /// `@` dereference.
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Integer {
        text: String,
        span: Span,
    },
    Real {
        text: String,
        span: Span,
    },
    Fixed {
        text: String,
        span: Span,
    },
    BitString {
        text: String,
        span: Span,
    },
    /// Quoted text in operand position.
    StringLiteral {
        text: String,
        span: Span,
    },
    /// `V(name)` status-value mention.
    StatusValue {
        value: Name,
        span: Span,
    },
    /// Item read or table element / function-style use with subscripts.
    Variable {
        var: VarRef,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// Placeholder kept after parse recovery.
    Error {
        span: Span,
    },
}

impl Expr {
    /// Compact single-line rendering for hover and outline details, e.g.
    /// table bounds or DEFINE values.
    pub fn display_label(&self) -> String {
        match self {
            Expr::Integer { text, .. }
            | Expr::Real { text, .. }
            | Expr::Fixed { text, .. }
            | Expr::BitString { text, .. } => text.clone(),
            Expr::StringLiteral { text, .. } => format!("\"{text}\""),
            Expr::StatusValue { value, .. } => format!("V({})", value.text),
            Expr::Variable { var, .. } => var.name.text.clone(),
            Expr::Unary { operand, .. } => format!("-{}", operand.display_label()),
            Expr::Binary { lhs, rhs, .. } => {
                format!("{}…{}", lhs.display_label(), rhs.display_label())
            }
            Expr::Error { .. } => "?".to_string(),
        }
    }

    pub fn span(&self) -> &Span {
        match self {
            Expr::Integer { span, .. }
            | Expr::Real { span, .. }
            | Expr::Fixed { span, .. }
            | Expr::BitString { span, .. }
            | Expr::StringLiteral { span, .. }
            | Expr::StatusValue { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Error { span } => span,
        }
    }
}
