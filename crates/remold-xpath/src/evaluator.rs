use crate::error::XPathError;
use crate::model::{DocumentCursor, NodeKind, move_to_root};
use crate::parser::ast::{
    Axis, BinaryOp, ComparisonOp, Expr, Literal, NameTest, NodeTest, PathExpr, PathStart,
};
use crate::runtime::StaticContext;
use crate::xdm::{AtomicValue, XdmItem, XdmSequence};

/// Per-expression evaluation scope: the context item plus the 1-based
/// position/size pair predicates observe.
pub(crate) struct Scope<'a, C: DocumentCursor> {
    pub item: XdmItem<C>,
    pub position: i64,
    pub size: i64,
    pub static_ctx: &'a StaticContext,
}

/// Evaluate an expression with `context` as the context node.
pub fn evaluate<C: DocumentCursor>(
    expr: &Expr,
    context: &C,
    static_ctx: &StaticContext,
) -> Result<XdmSequence<C>, XPathError> {
    let scope = Scope { item: XdmItem::Node(context.clone()), position: 1, size: 1, static_ctx };
    eval_expr(expr, &scope)
}

pub(crate) fn eval_expr<C: DocumentCursor>(
    expr: &Expr,
    scope: &Scope<'_, C>,
) -> Result<XdmSequence<C>, XPathError> {
    match expr {
        Expr::Literal(Literal::String(s)) => {
            Ok(vec![XdmItem::Atomic(AtomicValue::String(s.clone()))])
        }
        Expr::Literal(Literal::Number(n)) => Ok(vec![XdmItem::Atomic(AtomicValue::Number(*n))]),
        Expr::FunctionCall { name, args } => crate::functions::call(name, args, scope),
        Expr::Negate(inner) => {
            let v = seq_number(&eval_expr(inner, scope)?);
            Ok(vec![XdmItem::Atomic(AtomicValue::Number(-v))])
        }
        Expr::Binary { left, op: BinaryOp::Or, right } => {
            let b = ebv(&eval_expr(left, scope)?) || ebv(&eval_expr(right, scope)?);
            Ok(vec![XdmItem::Atomic(AtomicValue::Boolean(b))])
        }
        Expr::Binary { left, op: BinaryOp::And, right } => {
            let b = ebv(&eval_expr(left, scope)?) && ebv(&eval_expr(right, scope)?);
            Ok(vec![XdmItem::Atomic(AtomicValue::Boolean(b))])
        }
        Expr::Binary { left, op, right } => {
            let a = seq_number(&eval_expr(left, scope)?);
            let b = seq_number(&eval_expr(right, scope)?);
            let v = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Mod => a % b,
                BinaryOp::Or | BinaryOp::And => unreachable!(),
            };
            Ok(vec![XdmItem::Atomic(AtomicValue::Number(v))])
        }
        Expr::Comparison { left, op, right } => {
            let l = eval_expr(left, scope)?;
            let r = eval_expr(right, scope)?;
            let b = compare(&l, &r, *op);
            Ok(vec![XdmItem::Atomic(AtomicValue::Boolean(b))])
        }
        Expr::Path(path) => eval_path(path, scope),
    }
}

fn eval_path<C: DocumentCursor>(
    path: &PathExpr,
    scope: &Scope<'_, C>,
) -> Result<XdmSequence<C>, XPathError> {
    let XdmItem::Node(context) = &scope.item else {
        return Err(XPathError::Eval("location path requires a node context".into()));
    };
    let start = match path.start {
        PathStart::Root => {
            let mut root = context.clone();
            move_to_root(&mut root);
            root
        }
        PathStart::Relative => context.clone(),
    };
    let mut nodes: Vec<C> = vec![start];
    for step in &path.steps {
        let mut next: Vec<C> = Vec::new();
        for node in &nodes {
            for candidate in apply_axis(node, step.axis) {
                if matches_test(&candidate, step.axis, &step.test, scope.static_ctx)
                    && !next.contains(&candidate)
                {
                    next.push(candidate);
                }
            }
        }
        for pred in &step.predicates {
            let size = next.len() as i64;
            let mut kept: Vec<C> = Vec::new();
            for (idx, node) in next.into_iter().enumerate() {
                let inner = Scope {
                    item: XdmItem::Node(node.clone()),
                    position: idx as i64 + 1,
                    size,
                    static_ctx: scope.static_ctx,
                };
                let res = eval_expr(pred, &inner)?;
                if predicate_truthy(&res, inner.position) {
                    kept.push(node);
                }
            }
            next = kept;
        }
        nodes = next;
    }
    Ok(nodes.into_iter().map(XdmItem::Node).collect())
}

fn apply_axis<C: DocumentCursor>(node: &C, axis: Axis) -> Vec<C> {
    match axis {
        Axis::SelfAxis => vec![node.clone()],
        Axis::Parent => {
            let mut c = node.clone();
            if c.move_to_parent() { vec![c] } else { Vec::new() }
        }
        Axis::Child => children(node),
        Axis::Attribute => {
            let mut out = Vec::new();
            let mut c = node.clone();
            if c.move_to_first_attribute() {
                out.push(c.clone());
                while c.move_to_next_attribute() {
                    out.push(c.clone());
                }
            }
            out
        }
        Axis::DescendantOrSelf => {
            fn dfs<C: DocumentCursor>(n: &C, out: &mut Vec<C>) {
                out.push(n.clone());
                for c in children(n) {
                    dfs(&c, out);
                }
            }
            let mut out = Vec::new();
            dfs(node, &mut out);
            out
        }
    }
}

fn children<C: DocumentCursor>(node: &C) -> Vec<C> {
    let mut out = Vec::new();
    let mut c = node.clone();
    if c.move_to_first_child() {
        out.push(c.clone());
        while c.move_to_next_sibling() {
            out.push(c.clone());
        }
    }
    out
}

fn matches_test<C: DocumentCursor>(
    node: &C,
    axis: Axis,
    test: &NodeTest,
    static_ctx: &StaticContext,
) -> bool {
    let principal = if axis == Axis::Attribute { NodeKind::Attribute } else { NodeKind::Element };
    match test {
        NodeTest::AnyKind => true,
        NodeTest::Text => node.kind() == NodeKind::Text,
        NodeTest::Wildcard => node.kind() == principal,
        NodeTest::Name(nt) => node.kind() == principal && matches_name(node, nt, static_ctx),
    }
}

fn matches_name<C: DocumentCursor>(node: &C, test: &NameTest, static_ctx: &StaticContext) -> bool {
    let Some(name) = node.name() else { return false };
    if name.local != test.local {
        return false;
    }
    match &test.prefix {
        // Unprefixed tests match on local name alone; formats without
        // namespaces never set ns_uri.
        None => true,
        Some(prefix) => match static_ctx.namespace_uri(prefix) {
            Some(uri) => name.ns_uri.as_deref() == Some(uri),
            None => name.prefix.as_deref() == Some(prefix.as_str()),
        },
    }
}

/// XPath 1.0 effective boolean value.
pub(crate) fn ebv<C: DocumentCursor>(seq: &XdmSequence<C>) -> bool {
    match seq.first() {
        None => false,
        Some(XdmItem::Node(_)) => true,
        Some(XdmItem::Atomic(a)) => match a {
            AtomicValue::Boolean(b) => *b,
            AtomicValue::Number(n) => *n != 0.0 && !n.is_nan(),
            AtomicValue::String(s) => !s.is_empty(),
        },
    }
}

/// A numeric predicate value is a position filter; anything else is a truth
/// test.
fn predicate_truthy<C: DocumentCursor>(seq: &XdmSequence<C>, position: i64) -> bool {
    if let [XdmItem::Atomic(AtomicValue::Number(n))] = seq.as_slice() {
        return n.trunc() as i64 == position && n.fract() == 0.0;
    }
    ebv(seq)
}

/// `string()` of a sequence: string value of the first item, "" when empty.
pub(crate) fn seq_string<C: DocumentCursor>(seq: &XdmSequence<C>) -> String {
    match seq.first() {
        None => String::new(),
        Some(XdmItem::Node(n)) => n.string_value(),
        Some(XdmItem::Atomic(a)) => a.as_string(),
    }
}

pub(crate) fn seq_number<C: DocumentCursor>(seq: &XdmSequence<C>) -> f64 {
    match seq.first() {
        None => f64::NAN,
        Some(XdmItem::Node(n)) => {
            n.string_value().trim().parse::<f64>().unwrap_or(f64::NAN)
        }
        Some(XdmItem::Atomic(a)) => a.as_number(),
    }
}

enum Side<C> {
    Nodes(Vec<C>),
    Atomic(AtomicValue),
}

fn side_of<C: DocumentCursor>(seq: &XdmSequence<C>) -> Side<C> {
    match seq.first() {
        Some(XdmItem::Atomic(a)) => Side::Atomic(a.clone()),
        _ => Side::Nodes(
            seq.iter()
                .filter_map(|it| match it {
                    XdmItem::Node(n) => Some(n.clone()),
                    XdmItem::Atomic(_) => None,
                })
                .collect(),
        ),
    }
}

/// XPath 1.0 general comparison: existential over node-sets, with boolean >
/// number > string coercion priority for equality and numeric coercion for
/// the relational operators.
fn compare<C: DocumentCursor>(l: &XdmSequence<C>, r: &XdmSequence<C>, op: ComparisonOp) -> bool {
    match (side_of(l), side_of(r)) {
        (Side::Atomic(a), Side::Atomic(b)) => compare_atomic(&a, &b, op),
        (Side::Nodes(nodes), Side::Atomic(b)) => {
            if matches!(b, AtomicValue::Boolean(_)) && matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) {
                return compare_atomic(&AtomicValue::Boolean(!nodes.is_empty()), &b, op);
            }
            nodes
                .iter()
                .any(|n| compare_atomic(&AtomicValue::String(n.string_value()), &b, op))
        }
        (Side::Atomic(a), Side::Nodes(nodes)) => {
            if matches!(a, AtomicValue::Boolean(_)) && matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) {
                return compare_atomic(&a, &AtomicValue::Boolean(!nodes.is_empty()), op);
            }
            nodes
                .iter()
                .any(|n| compare_atomic(&a, &AtomicValue::String(n.string_value()), op))
        }
        (Side::Nodes(a), Side::Nodes(b)) => a.iter().any(|x| {
            let xs = AtomicValue::String(x.string_value());
            b.iter()
                .any(|y| compare_atomic(&xs, &AtomicValue::String(y.string_value()), op))
        }),
    }
}

fn compare_atomic(a: &AtomicValue, b: &AtomicValue, op: ComparisonOp) -> bool {
    use ComparisonOp::*;
    match op {
        Lt | Le | Gt | Ge => {
            let (x, y) = (a.as_number(), b.as_number());
            match op {
                Lt => x < y,
                Le => x <= y,
                Gt => x > y,
                Ge => x >= y,
                _ => unreachable!(),
            }
        }
        Eq | Ne => {
            let eq = if matches!(a, AtomicValue::Boolean(_)) || matches!(b, AtomicValue::Boolean(_))
            {
                to_boolean(a) == to_boolean(b)
            } else if matches!(a, AtomicValue::Number(_)) || matches!(b, AtomicValue::Number(_)) {
                a.as_number() == b.as_number()
            } else {
                a.as_string() == b.as_string()
            };
            if matches!(op, Eq) { eq } else { !eq }
        }
    }
}

fn to_boolean(a: &AtomicValue) -> bool {
    match a {
        AtomicValue::Boolean(b) => *b,
        AtomicValue::Number(n) => *n != 0.0 && !n.is_nan(),
        AtomicValue::String(s) => !s.is_empty(),
    }
}
