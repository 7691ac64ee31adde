//! Core function library available inside path expressions.

use crate::error::XPathError;
use crate::evaluator::{Scope, ebv, eval_expr, seq_number, seq_string};
use crate::model::DocumentCursor;
use crate::parser::ast::Expr;
use crate::xdm::{AtomicValue, XdmItem, XdmSequence};

pub(crate) fn call<C: DocumentCursor>(
    name: &str,
    args: &[Expr],
    scope: &Scope<'_, C>,
) -> Result<XdmSequence<C>, XPathError> {
    match (name, args.len()) {
        ("position", 0) => Ok(number(scope.position as f64)),
        ("last", 0) => Ok(number(scope.size as f64)),
        ("true", 0) => Ok(boolean(true)),
        ("false", 0) => Ok(boolean(false)),
        ("count", 1) => {
            let seq = eval_expr(&args[0], scope)?;
            let n = seq.iter().filter(|it| matches!(it, XdmItem::Node(_))).count();
            Ok(number(n as f64))
        }
        ("not", 1) => {
            let seq = eval_expr(&args[0], scope)?;
            Ok(boolean(!ebv(&seq)))
        }
        ("boolean", 1) => {
            let seq = eval_expr(&args[0], scope)?;
            Ok(boolean(ebv(&seq)))
        }
        ("string", 0) => Ok(string(context_string(scope))),
        ("string", 1) => Ok(string(seq_string(&eval_expr(&args[0], scope)?))),
        ("number", 0) => Ok(number(context_string(scope).trim().parse().unwrap_or(f64::NAN))),
        ("number", 1) => Ok(number(seq_number(&eval_expr(&args[0], scope)?))),
        ("contains", 2) => {
            let haystack = seq_string(&eval_expr(&args[0], scope)?);
            let needle = seq_string(&eval_expr(&args[1], scope)?);
            Ok(boolean(haystack.contains(&needle)))
        }
        ("starts-with", 2) => {
            let haystack = seq_string(&eval_expr(&args[0], scope)?);
            let needle = seq_string(&eval_expr(&args[1], scope)?);
            Ok(boolean(haystack.starts_with(&needle)))
        }
        ("normalize-space", 0) => Ok(string(normalize_space(&context_string(scope)))),
        ("normalize-space", 1) => {
            Ok(string(normalize_space(&seq_string(&eval_expr(&args[0], scope)?))))
        }
        ("string-length", 0) => Ok(number(context_string(scope).chars().count() as f64)),
        ("string-length", 1) => {
            let s = seq_string(&eval_expr(&args[0], scope)?);
            Ok(number(s.chars().count() as f64))
        }
        ("name", 0) => Ok(string(context_name(scope))),
        ("name", 1) => {
            let seq = eval_expr(&args[0], scope)?;
            let name = seq
                .iter()
                .find_map(|it| match it {
                    XdmItem::Node(n) => Some(n.name().map(|q| q.to_string()).unwrap_or_default()),
                    XdmItem::Atomic(_) => None,
                })
                .unwrap_or_default();
            Ok(string(name))
        }
        (other, arity) => Err(XPathError::Eval(format!(
            "unknown function {other}() with {arity} argument(s)"
        ))),
    }
}

fn context_string<C: DocumentCursor>(scope: &Scope<'_, C>) -> String {
    match &scope.item {
        XdmItem::Node(n) => n.string_value(),
        XdmItem::Atomic(a) => a.as_string(),
    }
}

fn context_name<C: DocumentCursor>(scope: &Scope<'_, C>) -> String {
    match &scope.item {
        XdmItem::Node(n) => n.name().map(|q| q.to_string()).unwrap_or_default(),
        XdmItem::Atomic(_) => String::new(),
    }
}

fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn number<C>(n: f64) -> XdmSequence<C> {
    vec![XdmItem::Atomic(AtomicValue::Number(n))]
}

fn boolean<C>(b: bool) -> XdmSequence<C> {
    vec![XdmItem::Atomic(AtomicValue::Boolean(b))]
}

fn string<C>(s: String) -> XdmSequence<C> {
    vec![XdmItem::Atomic(AtomicValue::String(s))]
}
