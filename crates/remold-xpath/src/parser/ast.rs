//! Internal AST produced by the parser and consumed by the evaluator.

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    FunctionCall { name: String, args: Vec<Expr> },
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    Comparison { left: Box<Expr>, op: ComparisonOp, right: Box<Expr> },
    Negate(Box<Expr>),
    Path(PathExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStart {
    /// Absolute path: evaluation starts at the tree root.
    Root,
    /// Relative path: evaluation starts at the context node.
    Relative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Attribute,
    SelfAxis,
    Parent,
    DescendantOrSelf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// QName test against the axis' principal node kind.
    Name(NameTest),
    /// `*`: any node of the axis' principal kind.
    Wildcard,
    /// `text()`
    Text,
    /// `node()`
    AnyKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTest {
    pub prefix: Option<String>,
    pub local: String,
}

impl Expr {
    /// Copy of this expression with the predicates of the final path step
    /// removed. Streaming readers match candidates against this form, because
    /// a trailing predicate may inspect content that does not exist until the
    /// node is fully built.
    #[must_use]
    pub fn without_trailing_predicates(&self) -> Expr {
        match self {
            Expr::Path(p) => {
                let mut stripped = p.clone();
                if let Some(last) = stripped.steps.last_mut() {
                    last.predicates.clear();
                }
                Expr::Path(stripped)
            }
            other => other.clone(),
        }
    }
}
