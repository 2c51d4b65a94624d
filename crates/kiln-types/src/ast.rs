//! AST node types for component script modules.
//!
//! The parser produces [`Module`]; the compiler lowers it into a flat
//! statement list where markup has become `React.createElement` calls and
//! module declarations have become `require` bindings. The two lowered-only
//! statement forms ([`Stmt::BindImport`], [`Stmt::ExportAll`]) never come
//! out of the parser.
//!
//! Function bodies sit behind [`Arc`] so closures share them instead of
//! cloning subtrees.

use crate::Span;
use std::sync::Arc;

// ══════════════════════════════════════════════════════════════════════════════
// Module Level
// ══════════════════════════════════════════════════════════════════════════════

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub items: Vec<ModuleItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModuleItem {
    Import(ImportDecl),
    Export(ExportDecl),
    Stmt(Stmt),
}

/// `import D, { a, b as c } from "source"`, `import * as ns from "source"`,
/// or the bare side-effect form `import "source"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub source: StrLit,
    pub default: Option<Ident>,
    pub namespace: Option<Ident>,
    pub named: Vec<ImportSpecifier>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpecifier {
    pub imported: Ident,
    pub local: Ident,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportDecl {
    /// `export const …`, `export function …`
    Decl(Stmt),
    /// `export default function [Name]() {}`
    DefaultFunction(FunctionDecl),
    /// `export default <expr>`
    Default { value: Expr, span: Span },
    /// `export { a, b as c } [from "source"]`
    Named {
        specifiers: Vec<ExportSpecifier>,
        source: Option<StrLit>,
        span: Span,
    },
    /// `export * from "source"`
    All { source: StrLit, span: Span },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSpecifier {
    pub local: Ident,
    pub exported: Ident,
}

/// A string literal that must stay a literal (module specifiers).
#[derive(Debug, Clone, PartialEq)]
pub struct StrLit {
    pub value: String,
    pub span: Span,
}

// ══════════════════════════════════════════════════════════════════════════════
// Identifiers & Patterns
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    pub fn synthetic(name: impl Into<String>) -> Self {
        Self::new(name, Span::SYNTHETIC)
    }
}

/// A binding target in declarations, parameters and `catch` clauses.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Ident(Ident),
    Object {
        props: Vec<ObjectPatternProp>,
        rest: Option<Ident>,
        span: Span,
    },
    Array {
        elems: Vec<Option<PatternElem>>,
        rest: Option<Ident>,
        span: Span,
    },
}

impl Pattern {
    /// Every name this pattern binds, in source order.
    pub fn bound_names(&self) -> Vec<&Ident> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, out: &mut Vec<&'a Ident>) {
        match self {
            Pattern::Ident(ident) => out.push(ident),
            Pattern::Object { props, rest, .. } => {
                for prop in props {
                    prop.value.collect_names(out);
                }
                out.extend(rest.iter());
            }
            Pattern::Array { elems, rest, .. } => {
                for elem in elems.iter().flatten() {
                    elem.pattern.collect_names(out);
                }
                out.extend(rest.iter());
            }
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Pattern::Ident(ident) => ident.span,
            Pattern::Object { span, .. } | Pattern::Array { span, .. } => *span,
        }
    }
}

/// `key: pattern = default` inside an object pattern (`{ a }` is `a: a`).
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatternProp {
    pub key: String,
    pub value: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternElem {
    pub pattern: Pattern,
    pub default: Option<Expr>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Option<Ident>,
    pub params: Vec<Param>,
    pub body: FunctionBody,
    /// Arrow functions take `this` from their defining scope.
    pub is_arrow: bool,
    /// `async` functions return a promise of their result.
    pub is_async: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    Block(Block),
    Expr(Box<Expr>),
}

/// `function name(params) { body }` in statement position (hoisted).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub func: Arc<Function>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var(VarDecl),
    Function(FunctionDecl),
    Return(ReturnStmt),
    If(IfStmt),
    For(ForStmt),
    ForOf(ForOfStmt),
    ForIn(ForInStmt),
    While(WhileStmt),
    DoWhile(WhileStmt),
    Switch(SwitchStmt),
    Break(Span),
    Continue(Span),
    Throw(ThrowStmt),
    Try(TryStmt),
    Block(Block),
    Expr(ExprStmt),
    Empty(Span),
    /// Lowered import: `local` reads `export` from the exports object held in `module`.
    BindImport(ImportBinding),
    /// Lowered `export * from`: copies every named export of `module` onto `exports`.
    ExportAll(Ident),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Const,
    Let,
    Var,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub kind: VarKind,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Box<Stmt>,
    pub else_branch: Option<Box<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    Var(VarDecl),
    Expr(Expr),
}

/// `for (init; test; update) body`
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub init: Option<ForInit>,
    pub test: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// `for (const pattern of iterable) body`
#[derive(Debug, Clone, PartialEq)]
pub struct ForOfStmt {
    pub kind: VarKind,
    pub pattern: Pattern,
    pub iterable: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// `for (const key in object) body`
#[derive(Debug, Clone, PartialEq)]
pub struct ForInStmt {
    pub kind: VarKind,
    pub pattern: Pattern,
    pub object: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

/// `while (cond) body`, or `do body while (cond)` as [`Stmt::DoWhile`].
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    pub discriminant: Expr,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

/// `case test:` followed by its statements; `test` is `None` for `default:`.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThrowStmt {
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    pub block: Block,
    pub param: Option<Pattern>,
    pub handler: Option<Block>,
    pub finalizer: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportBinding {
    pub local: Ident,
    pub module: Ident,
    pub import: ImportedName,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportedName {
    /// `import D from …`: `exports.default` for compiled modules, the value itself otherwise.
    Default,
    Named(String),
    /// `import * as ns from …`
    Namespace,
}

// ══════════════════════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Ident(name.into()), span)
    }

    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::String(value.into()), span)
    }

    pub fn member(object: Expr, property: impl Into<String>, span: Span) -> Self {
        Self::new(
            ExprKind::Member {
                object: Box::new(object),
                property: property.into(),
                optional: false,
            },
            span,
        )
    }

    pub fn call(callee: Expr, args: Vec<Argument>, span: Span) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                optional: false,
            },
            span,
        )
    }

    pub fn assign(target: Expr, value: Expr, span: Span) -> Self {
        Self::new(
            ExprKind::Assign {
                target: Box::new(target),
                op: AssignOp::Assign,
                value: Box::new(value),
            },
            span,
        )
    }

    /// `true` for expressions that may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number(f64),
    String(String),
    Template(Vec<TemplatePart>),
    Bool(bool),
    Null,
    /// `/pattern/flags`
    Regex { pattern: String, flags: String },
    Ident(String),
    This,

    Array(Vec<ArrayElem>),
    Object(Vec<PropDef>),
    Function(Arc<Function>),

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
    },

    Member {
        object: Box<Expr>,
        property: String,
        optional: bool,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
        optional: bool,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Argument>,
    },
    Await(Box<Expr>),

    /// Component markup; removed by lowering.
    Markup(Box<MarkupElement>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElem {
    Expr(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropDef {
    KeyValue(PropKey, Expr),
    Shorthand(Ident),
    Method(PropKey, Arc<Function>),
    Getter(PropKey, Arc<Function>),
    Setter(PropKey, Arc<Function>),
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropKey {
    Named(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Expr(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
    Void,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    StrictEq,
    StrictNotEq,
    LooseEq,
    LooseNotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    In,
    InstanceOf,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    And,
    Or,
    Nullish,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any.
    pub fn binary(self) -> Option<BinOp> {
        match self {
            AssignOp::Add => Some(BinOp::Add),
            AssignOp::Sub => Some(BinOp::Sub),
            AssignOp::Mul => Some(BinOp::Mul),
            AssignOp::Div => Some(BinOp::Div),
            AssignOp::Mod => Some(BinOp::Mod),
            AssignOp::Pow => Some(BinOp::Pow),
            AssignOp::BitAnd => Some(BinOp::BitAnd),
            AssignOp::BitOr => Some(BinOp::BitOr),
            AssignOp::BitXor => Some(BinOp::BitXor),
            AssignOp::Shl => Some(BinOp::Shl),
            AssignOp::Shr => Some(BinOp::Shr),
            AssignOp::UShr => Some(BinOp::UShr),
            AssignOp::Assign | AssignOp::And | AssignOp::Or | AssignOp::Nullish => None,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Markup
// ══════════════════════════════════════════════════════════════════════════════

/// `<name attrs…>children</name>`, `<name />` or a fragment `<>…</>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupElement {
    pub name: MarkupName,
    pub attributes: Vec<MarkupAttr>,
    pub children: Vec<MarkupChild>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupName {
    Fragment,
    /// Lower-case host tag: `div`, `my-widget`.
    Intrinsic(String),
    /// Component reference, possibly dotted: `Button`, `Ctx.Provider`.
    Component(Vec<String>),
}

impl MarkupName {
    pub fn display(&self) -> String {
        match self {
            MarkupName::Fragment => String::new(),
            MarkupName::Intrinsic(tag) => tag.clone(),
            MarkupName::Component(path) => path.join("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupAttr {
    /// `name`, `name="text"` or `name={expr}`.
    Named {
        name: String,
        value: Option<MarkupAttrValue>,
        span: Span,
    },
    Spread(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupAttrValue {
    Text(String),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkupChild {
    /// Raw text between tags, before whitespace collapsing.
    Text(String),
    /// `{expr}`; `None` for an empty container such as `{/* note */}`.
    Expr(Option<Expr>),
    Element(MarkupElement),
}
