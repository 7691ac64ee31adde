use core::fmt;

/// Atomic value produced by expression evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomicValue {
    Boolean(bool),
    Number(f64),
    String(String),
}

/// One evaluation result item: a node addressed by a cursor, or an atomic.
#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<C> {
    Node(C),
    Atomic(AtomicValue),
}

pub type XdmSequence<C> = Vec<XdmItem<C>>;

impl<C: fmt::Debug> fmt::Display for XdmItem<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(_) => write!(f, "<node>"),
            XdmItem::Atomic(a) => write!(f, "{a:?}"),
        }
    }
}

impl AtomicValue {
    /// XPath 1.0 `string()` of an atomic value. Whole numbers print without a
    /// decimal point.
    pub fn as_string(&self) -> String {
        match self {
            AtomicValue::Boolean(b) => {
                if *b { "true".into() } else { "false".into() }
            }
            AtomicValue::Number(n) => format_number(*n),
            AtomicValue::String(s) => s.clone(),
        }
    }

    /// XPath 1.0 `number()` of an atomic value; unparseable strings are NaN.
    pub fn as_number(&self) -> f64 {
        match self {
            AtomicValue::Boolean(b) => {
                if *b { 1.0 } else { 0.0 }
            }
            AtomicValue::Number(n) => *n,
            AtomicValue::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity".into() } else { "-Infinity".into() };
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
