use pest::Parser;
use pest::iterators::Pair;

use crate::error::XPathError;

pub mod ast;

#[derive(pest_derive::Parser)]
#[grammar = "xpath.pest"]
pub struct XPathParser;

/// Parse an expression into the internal AST.
pub fn parse_xpath(input: &str) -> Result<ast::Expr, XPathError> {
    let mut pairs = XPathParser::parse(Rule::xpath, input)
        .map_err(|e| XPathError::Parse(format!("{input:?}: {e}")))?;
    let root = pairs.next().ok_or_else(|| XPathError::Parse("empty input".into()))?;
    debug_assert_eq!(root.as_rule(), Rule::xpath);
    let expr = root
        .into_inner()
        .find(|p| p.as_rule() == Rule::expr)
        .ok_or_else(|| XPathError::Parse("missing expression".into()))?;
    build_expr(&expr)
}

fn build_expr(pair: &Pair<Rule>) -> Result<ast::Expr, XPathError> {
    match pair.as_rule() {
        Rule::expr | Rule::value_expr | Rule::paren_expr => {
            let inner = pair
                .clone()
                .into_inner()
                .find(|p| !is_token(p.as_rule()))
                .ok_or_else(|| XPathError::Parse("empty expression".into()))?;
            build_expr(&inner)
        }
        Rule::or_expr => fold_binary(pair, ast::BinaryOp::Or),
        Rule::and_expr => fold_binary(pair, ast::BinaryOp::And),
        Rule::comparison_expr => build_comparison(pair),
        Rule::additive_expr | Rule::multiplicative_expr => fold_arith(pair),
        Rule::unary_expr => build_unary(pair),
        Rule::string_literal => Ok(ast::Expr::Literal(ast::Literal::String(
            pair.clone()
                .into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
        ))),
        Rule::number_literal => {
            let v = pair
                .as_str()
                .parse::<f64>()
                .map_err(|_| XPathError::Parse(format!("invalid number literal {:?}", pair.as_str())))?;
            Ok(ast::Expr::Literal(ast::Literal::Number(v)))
        }
        Rule::function_call => {
            let mut inner = pair.clone().into_inner();
            let name = inner
                .next()
                .ok_or_else(|| XPathError::Parse("missing function name".into()))?
                .as_str()
                .to_string();
            let mut args = Vec::new();
            for p in inner {
                if p.as_rule() == Rule::expr {
                    args.push(build_expr(&p)?);
                }
            }
            Ok(ast::Expr::FunctionCall { name, args })
        }
        Rule::path_expr => build_path(pair),
        other => Err(XPathError::Parse(format!("unsupported construct {other:?}"))),
    }
}

fn is_token(rule: Rule) -> bool {
    matches!(rule, Rule::LPAREN | Rule::RPAREN | Rule::LBRACK | Rule::RBRACK | Rule::COMMA)
}

/// Left-fold a chain like `a op b op c` where the rule alternates operand and
/// operator pairs.
fn fold_binary(pair: &Pair<Rule>, op: ast::BinaryOp) -> Result<ast::Expr, XPathError> {
    let mut inner = pair.clone().into_inner().filter(|p| {
        !matches!(p.as_rule(), Rule::K_OR | Rule::K_AND)
    });
    let first = inner.next().ok_or_else(|| XPathError::Parse("empty operand".into()))?;
    let mut expr = build_expr(&first)?;
    for operand in inner {
        let right = build_expr(&operand)?;
        expr = ast::Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
    }
    Ok(expr)
}

fn fold_arith(pair: &Pair<Rule>) -> Result<ast::Expr, XPathError> {
    let mut inner = pair.clone().into_inner();
    let first = inner.next().ok_or_else(|| XPathError::Parse("empty operand".into()))?;
    let mut expr = build_expr(&first)?;
    while let Some(op_pair) = inner.next() {
        let op = match first_token(&op_pair) {
            Rule::OP_PLUS => ast::BinaryOp::Add,
            Rule::OP_MINUS => ast::BinaryOp::Sub,
            Rule::OP_STAR => ast::BinaryOp::Mul,
            Rule::K_DIV => ast::BinaryOp::Div,
            Rule::K_MOD => ast::BinaryOp::Mod,
            other => return Err(XPathError::Parse(format!("unexpected operator {other:?}"))),
        };
        let right_pair = inner
            .next()
            .ok_or_else(|| XPathError::Parse("missing right operand".into()))?;
        let right = build_expr(&right_pair)?;
        expr = ast::Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
    }
    Ok(expr)
}

fn build_comparison(pair: &Pair<Rule>) -> Result<ast::Expr, XPathError> {
    let mut inner = pair.clone().into_inner();
    let left_pair = inner.next().ok_or_else(|| XPathError::Parse("empty comparison".into()))?;
    let left = build_expr(&left_pair)?;
    let Some(op_pair) = inner.next() else {
        return Ok(left);
    };
    let op = match first_token(&op_pair) {
        Rule::OP_EQ => ast::ComparisonOp::Eq,
        Rule::OP_NE => ast::ComparisonOp::Ne,
        Rule::OP_LT => ast::ComparisonOp::Lt,
        Rule::OP_LTE => ast::ComparisonOp::Le,
        Rule::OP_GT => ast::ComparisonOp::Gt,
        Rule::OP_GTE => ast::ComparisonOp::Ge,
        other => return Err(XPathError::Parse(format!("unexpected comparison {other:?}"))),
    };
    let right_pair = inner
        .next()
        .ok_or_else(|| XPathError::Parse("missing comparison operand".into()))?;
    let right = build_expr(&right_pair)?;
    Ok(ast::Expr::Comparison { left: Box::new(left), op, right: Box::new(right) })
}

fn build_unary(pair: &Pair<Rule>) -> Result<ast::Expr, XPathError> {
    let mut negate = false;
    let mut value = None;
    for p in pair.clone().into_inner() {
        if p.as_rule() == Rule::OP_MINUS {
            negate = !negate;
        } else {
            value = Some(build_expr(&p)?);
        }
    }
    let expr = value.ok_or_else(|| XPathError::Parse("missing operand".into()))?;
    Ok(if negate { ast::Expr::Negate(Box::new(expr)) } else { expr })
}

fn build_path(pair: &Pair<Rule>) -> Result<ast::Expr, XPathError> {
    debug_assert_eq!(pair.as_rule(), Rule::path_expr);
    let inner = pair
        .clone()
        .into_inner()
        .next()
        .ok_or_else(|| XPathError::Parse("empty path".into()))?;
    match inner.as_rule() {
        Rule::absolute_path => {
            let mut steps = Vec::new();
            let mut parts = inner.into_inner();
            let lead = parts.next().ok_or_else(|| XPathError::Parse("empty path".into()))?;
            if lead.as_rule() == Rule::OP_DSLASH {
                steps.push(descendant_step());
            }
            if let Some(rel) = parts.next() {
                collect_steps(&rel, &mut steps)?;
            }
            Ok(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Root, steps }))
        }
        Rule::relative_path => {
            let mut steps = Vec::new();
            collect_steps(&inner, &mut steps)?;
            Ok(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Relative, steps }))
        }
        other => Err(XPathError::Parse(format!("unexpected path form {other:?}"))),
    }
}

fn descendant_step() -> ast::Step {
    ast::Step {
        axis: ast::Axis::DescendantOrSelf,
        test: ast::NodeTest::AnyKind,
        predicates: Vec::new(),
    }
}

fn collect_steps(pair: &Pair<Rule>, out: &mut Vec<ast::Step>) -> Result<(), XPathError> {
    debug_assert_eq!(pair.as_rule(), Rule::relative_path);
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::step => out.push(build_step(&p)?),
            Rule::path_sep => {
                if first_token(&p) == Rule::OP_DSLASH {
                    out.push(descendant_step());
                }
            }
            other => return Err(XPathError::Parse(format!("unexpected step part {other:?}"))),
        }
    }
    Ok(())
}

fn build_step(pair: &Pair<Rule>) -> Result<ast::Step, XPathError> {
    debug_assert_eq!(pair.as_rule(), Rule::step);
    let mut axis = ast::Axis::Child;
    let mut test = ast::NodeTest::AnyKind;
    let mut predicates = Vec::new();
    for p in pair.clone().into_inner() {
        match p.as_rule() {
            Rule::OP_DOT => {
                axis = ast::Axis::SelfAxis;
                test = ast::NodeTest::AnyKind;
            }
            Rule::OP_DOTDOT => {
                axis = ast::Axis::Parent;
                test = ast::NodeTest::AnyKind;
            }
            Rule::attr_test => {
                axis = ast::Axis::Attribute;
                let inner = p
                    .into_inner()
                    .find(|q| matches!(q.as_rule(), Rule::wildcard | Rule::qname))
                    .ok_or_else(|| XPathError::Parse("missing attribute test".into()))?;
                test = name_or_wildcard(&inner);
            }
            Rule::node_test => {
                let inner = p
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| XPathError::Parse("empty node test".into()))?;
                test = match inner.as_rule() {
                    Rule::text_test => ast::NodeTest::Text,
                    Rule::any_kind_test => ast::NodeTest::AnyKind,
                    _ => name_or_wildcard(&inner),
                };
            }
            Rule::predicate => {
                let expr = p
                    .into_inner()
                    .find(|q| q.as_rule() == Rule::expr)
                    .ok_or_else(|| XPathError::Parse("empty predicate".into()))?;
                predicates.push(build_expr(&expr)?);
            }
            _ => {}
        }
    }
    Ok(ast::Step { axis, test, predicates })
}

fn name_or_wildcard(pair: &Pair<Rule>) -> ast::NodeTest {
    if pair.as_rule() == Rule::wildcard {
        ast::NodeTest::Wildcard
    } else {
        let s = pair.as_str();
        let (prefix, local) = match s.find(':') {
            Some(idx) => (Some(s[..idx].to_string()), s[idx + 1..].to_string()),
            None => (None, s.to_string()),
        };
        ast::NodeTest::Name(ast::NameTest { prefix, local })
    }
}

/// Walk down to the first terminal token rule of a pair.
fn first_token(pair: &Pair<Rule>) -> Rule {
    let mut current = pair.clone();
    loop {
        let mut inner = current.clone().into_inner();
        if let Some(next) = inner.next() {
            current = next;
        } else {
            return current.as_rule();
        }
    }
}
