//! Expression evaluation over a parsed document tree

use super::parser::{Axis, CmpOp, Expr, NodeTest, Step};
use super::XPathError;
use ego_tree::{NodeId, NodeRef};
use scraper::Node;
use std::collections::HashMap;

/// A member of a node-set: a tree node or one attribute of an element
#[derive(Debug, Clone, Copy)]
pub(crate) enum Item<'a> {
    Node(NodeRef<'a, Node>),
    Attr {
        owner: NodeRef<'a, Node>,
        index: usize,
        name: &'a str,
        value: &'a str,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum Value<'a> {
    Nodes(Vec<Item<'a>>),
    Str(String),
    Num(f64),
    Bool(bool),
}

#[derive(Clone, Copy)]
struct Context<'a> {
    item: Item<'a>,
    position: usize,
    size: usize,
}

pub(crate) struct Evaluator<'a> {
    root: NodeRef<'a, Node>,
    order: HashMap<NodeId, usize>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(root: NodeRef<'a, Node>) -> Self {
        let order = root
            .descendants()
            .enumerate()
            .map(|(i, node)| (node.id(), i))
            .collect();
        Self { root, order }
    }

    /// Evaluates `expr` with the document node as context
    pub(crate) fn evaluate(&self, expr: &Expr) -> Result<Value<'a>, XPathError> {
        let ctx = Context {
            item: Item::Node(self.root),
            position: 1,
            size: 1,
        };
        self.eval(expr, &ctx)
    }

    fn eval(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Value<'a>, XPathError> {
        match expr {
            Expr::Literal(s) => Ok(Value::Str(s.clone())),
            Expr::Number(n) => Ok(Value::Num(*n)),
            Expr::Or(l, r) => {
                if self.eval(l, ctx)?.to_bool() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(r, ctx)?.to_bool()))
            }
            Expr::And(l, r) => {
                if !self.eval(l, ctx)?.to_bool() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(r, ctx)?.to_bool()))
            }
            Expr::Compare(op, l, r) => {
                let left = self.eval(l, ctx)?;
                let right = self.eval(r, ctx)?;
                Ok(Value::Bool(compare(*op, &left, &right)))
            }
            Expr::Add(l, r) => Ok(Value::Num(
                self.eval(l, ctx)?.to_number() + self.eval(r, ctx)?.to_number(),
            )),
            Expr::Sub(l, r) => Ok(Value::Num(
                self.eval(l, ctx)?.to_number() - self.eval(r, ctx)?.to_number(),
            )),
            Expr::Negate(inner) => Ok(Value::Num(-self.eval(inner, ctx)?.to_number())),
            Expr::Union(l, r) => {
                let mut items = self.node_set(l, ctx)?;
                items.extend(self.node_set(r, ctx)?);
                self.sort_dedup(&mut items);
                Ok(Value::Nodes(items))
            }
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    Item::Node(self.root)
                } else {
                    ctx.item
                };
                Ok(Value::Nodes(self.apply_steps(vec![start], steps)?))
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut items = self.node_set(primary, ctx)?;
                self.sort_dedup(&mut items);
                for predicate in predicates {
                    items = self.filter(items, predicate)?;
                }
                if steps.is_empty() {
                    Ok(Value::Nodes(items))
                } else {
                    Ok(Value::Nodes(self.apply_steps(items, steps)?))
                }
            }
            Expr::Function(name, args) => self.call(name, args, ctx),
        }
    }

    fn node_set(&self, expr: &Expr, ctx: &Context<'a>) -> Result<Vec<Item<'a>>, XPathError> {
        match self.eval(expr, ctx)? {
            Value::Nodes(items) => Ok(items),
            other => Err(XPathError::NotANodeSet(other.type_name().to_string())),
        }
    }

    fn apply_steps(
        &self,
        mut items: Vec<Item<'a>>,
        steps: &[Step],
    ) -> Result<Vec<Item<'a>>, XPathError> {
        for step in steps {
            let mut next = Vec::new();
            for item in &items {
                let mut candidates: Vec<Item<'a>> = axis_items(*item, step.axis)
                    .into_iter()
                    .filter(|candidate| matches_test(candidate, step.axis, &step.test))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            self.sort_dedup(&mut next);
            items = next;
        }
        Ok(items)
    }

    /// Keeps the items for which `predicate` holds; positions follow the input order
    fn filter(&self, items: Vec<Item<'a>>, predicate: &Expr) -> Result<Vec<Item<'a>>, XPathError> {
        let size = items.len();
        let mut kept = Vec::with_capacity(size);
        for (i, item) in items.into_iter().enumerate() {
            let ctx = Context {
                item,
                position: i + 1,
                size,
            };
            let keep = match self.eval(predicate, &ctx)? {
                Value::Num(n) => n == (i + 1) as f64,
                other => other.to_bool(),
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    fn doc_key(&self, item: &Item<'a>) -> (usize, usize) {
        let (node, sub) = match item {
            Item::Node(node) => (node, 0),
            Item::Attr { owner, index, .. } => (owner, index + 1),
        };
        let order = self.order.get(&node.id()).copied().unwrap_or(usize::MAX);
        (order, sub)
    }

    fn sort_dedup(&self, items: &mut Vec<Item<'a>>) {
        items.sort_by_key(|item| self.doc_key(item));
        items.dedup_by_key(|item| self.doc_key(item));
    }

    fn call(&self, name: &str, args: &[Expr], ctx: &Context<'a>) -> Result<Value<'a>, XPathError> {
        let arity = |min: usize, max: usize| -> Result<(), XPathError> {
            if args.len() < min || args.len() > max {
                Err(XPathError::Arity {
                    function: name.to_string(),
                    found: args.len(),
                })
            } else {
                Ok(())
            }
        };
        let string_arg = |i: usize| -> Result<String, XPathError> {
            match args.get(i) {
                Some(arg) => Ok(self.eval(arg, ctx)?.to_xpath_string()),
                None => Ok(string_value(&ctx.item)),
            }
        };

        match name {
            "contains" => {
                arity(2, 2)?;
                Ok(Value::Bool(string_arg(0)?.contains(&string_arg(1)?)))
            }
            "starts-with" => {
                arity(2, 2)?;
                Ok(Value::Bool(string_arg(0)?.starts_with(&string_arg(1)?)))
            }
            "ends-with" => {
                arity(2, 2)?;
                Ok(Value::Bool(string_arg(0)?.ends_with(&string_arg(1)?)))
            }
            "normalize-space" => {
                arity(0, 1)?;
                let s = string_arg(0)?;
                Ok(Value::Str(s.split_whitespace().collect::<Vec<_>>().join(" ")))
            }
            "string" => {
                arity(0, 1)?;
                Ok(Value::Str(string_arg(0)?))
            }
            "concat" => {
                if args.len() < 2 {
                    return Err(XPathError::Arity {
                        function: name.to_string(),
                        found: args.len(),
                    });
                }
                let mut out = String::new();
                for i in 0..args.len() {
                    out.push_str(&string_arg(i)?);
                }
                Ok(Value::Str(out))
            }
            "translate" => {
                arity(3, 3)?;
                let source = string_arg(0)?;
                let from: Vec<char> = string_arg(1)?.chars().collect();
                let to: Vec<char> = string_arg(2)?.chars().collect();
                let out = source
                    .chars()
                    .filter_map(|c| match from.iter().position(|f| *f == c) {
                        Some(i) => to.get(i).copied(),
                        None => Some(c),
                    })
                    .collect();
                Ok(Value::Str(out))
            }
            "string-length" => {
                arity(0, 1)?;
                Ok(Value::Num(string_arg(0)?.chars().count() as f64))
            }
            "substring" => {
                arity(2, 3)?;
                let source = string_arg(0)?;
                let start = xpath_round(self.eval(&args[1], ctx)?.to_number());
                let end = match args.get(2) {
                    Some(len) => start + xpath_round(self.eval(len, ctx)?.to_number()),
                    None => f64::INFINITY,
                };
                let out = source
                    .chars()
                    .enumerate()
                    .filter(|(i, _)| {
                        let pos = (*i + 1) as f64;
                        pos >= start && pos < end
                    })
                    .map(|(_, c)| c)
                    .collect();
                Ok(Value::Str(out))
            }
            "substring-before" => {
                arity(2, 2)?;
                let source = string_arg(0)?;
                let needle = string_arg(1)?;
                Ok(Value::Str(
                    source
                        .find(&needle)
                        .map(|i| source[..i].to_string())
                        .unwrap_or_default(),
                ))
            }
            "substring-after" => {
                arity(2, 2)?;
                let source = string_arg(0)?;
                let needle = string_arg(1)?;
                Ok(Value::Str(
                    source
                        .find(&needle)
                        .map(|i| source[i + needle.len()..].to_string())
                        .unwrap_or_default(),
                ))
            }
            "name" | "local-name" => {
                arity(0, 1)?;
                let target = match args.first() {
                    Some(arg) => {
                        let mut items = self.node_set(arg, ctx)?;
                        self.sort_dedup(&mut items);
                        items.first().copied()
                    }
                    None => Some(ctx.item),
                };
                Ok(Value::Str(target.map(|i| item_name(&i)).unwrap_or_default()))
            }
            "position" => {
                arity(0, 0)?;
                Ok(Value::Num(ctx.position as f64))
            }
            "last" => {
                arity(0, 0)?;
                Ok(Value::Num(ctx.size as f64))
            }
            "count" => {
                arity(1, 1)?;
                Ok(Value::Num(self.node_set(&args[0], ctx)?.len() as f64))
            }
            "not" => {
                arity(1, 1)?;
                Ok(Value::Bool(!self.eval(&args[0], ctx)?.to_bool()))
            }
            "true" => {
                arity(0, 0)?;
                Ok(Value::Bool(true))
            }
            "false" => {
                arity(0, 0)?;
                Ok(Value::Bool(false))
            }
            "boolean" => {
                arity(1, 1)?;
                Ok(Value::Bool(self.eval(&args[0], ctx)?.to_bool()))
            }
            "number" => {
                arity(0, 1)?;
                match args.first() {
                    Some(arg) => Ok(Value::Num(self.eval(arg, ctx)?.to_number())),
                    None => Ok(Value::Num(str_to_number(&string_value(&ctx.item)))),
                }
            }
            other => Err(XPathError::UnknownFunction(other.to_string())),
        }
    }
}

impl<'a> Value<'a> {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Nodes(_) => "node-set",
            Value::Str(_) => "string",
            Value::Num(_) => "number",
            Value::Bool(_) => "boolean",
        }
    }

    pub(crate) fn to_bool(&self) -> bool {
        match self {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    pub(crate) fn to_number(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            other => str_to_number(&other.to_xpath_string()),
        }
    }

    pub(crate) fn to_xpath_string(&self) -> String {
        match self {
            Value::Nodes(items) => items.first().map(string_value).unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => number_to_string(*n),
            Value::Bool(b) => b.to_string(),
        }
    }
}

fn axis_items<'a>(item: Item<'a>, axis: Axis) -> Vec<Item<'a>> {
    let node = match item {
        Item::Node(node) => node,
        Item::Attr { owner, .. } => {
            return match axis {
                Axis::SelfAxis => vec![item],
                Axis::Parent => vec![Item::Node(owner)],
                Axis::Ancestor => std::iter::once(owner)
                    .chain(owner.ancestors())
                    .map(Item::Node)
                    .collect(),
                Axis::AncestorOrSelf => std::iter::once(item)
                    .chain(std::iter::once(owner).chain(owner.ancestors()).map(Item::Node))
                    .collect(),
                _ => Vec::new(),
            };
        }
    };

    match axis {
        Axis::Child => node.children().map(Item::Node).collect(),
        Axis::Descendant => node.descendants().skip(1).map(Item::Node).collect(),
        Axis::DescendantOrSelf => node.descendants().map(Item::Node).collect(),
        Axis::SelfAxis => vec![item],
        Axis::Parent => node.parent().map(Item::Node).into_iter().collect(),
        Axis::Ancestor => node.ancestors().map(Item::Node).collect(),
        Axis::AncestorOrSelf => std::iter::once(node)
            .chain(node.ancestors())
            .map(Item::Node)
            .collect(),
        Axis::FollowingSibling => node.next_siblings().map(Item::Node).collect(),
        Axis::PrecedingSibling => node.prev_siblings().map(Item::Node).collect(),
        Axis::Attribute => match node.value() {
            Node::Element(element) => element
                .attrs()
                .enumerate()
                .map(|(index, (name, value))| Item::Attr {
                    owner: node,
                    index,
                    name,
                    value,
                })
                .collect(),
            _ => Vec::new(),
        },
    }
}

fn matches_test(item: &Item<'_>, axis: Axis, test: &NodeTest) -> bool {
    match item {
        Item::Attr { name, .. } => match test {
            NodeTest::Name(wanted) => axis == Axis::Attribute && name.eq_ignore_ascii_case(wanted),
            NodeTest::Any => axis == Axis::Attribute,
            NodeTest::Node => true,
            NodeTest::Text | NodeTest::Comment => false,
        },
        Item::Node(node) => match (test, node.value()) {
            (NodeTest::Node, _) => true,
            (NodeTest::Text, Node::Text(_)) => true,
            (NodeTest::Comment, Node::Comment(_)) => true,
            (NodeTest::Any, Node::Element(_)) => axis != Axis::Attribute,
            (NodeTest::Name(wanted), Node::Element(element)) => {
                axis != Axis::Attribute && element.name().eq_ignore_ascii_case(wanted)
            }
            _ => false,
        },
    }
}

/// String value of a node-set member
pub(crate) fn string_value(item: &Item<'_>) -> String {
    match item {
        Item::Attr { value, .. } => value.to_string(),
        Item::Node(node) => match node.value() {
            Node::Text(text) => text.text.to_string(),
            Node::Comment(comment) => comment.comment.to_string(),
            _ => {
                let mut out = String::new();
                for descendant in node.descendants() {
                    if let Node::Text(text) = descendant.value() {
                        out.push_str(&text.text);
                    }
                }
                out
            }
        },
    }
}

fn item_name(item: &Item<'_>) -> String {
    match item {
        Item::Attr { name, .. } => name.to_string(),
        Item::Node(node) => match node.value() {
            Node::Element(element) => element.name().to_string(),
            _ => String::new(),
        },
    }
}

fn compare(op: CmpOp, left: &Value<'_>, right: &Value<'_>) -> bool {
    match (left, right) {
        (Value::Nodes(items), Value::Bool(b)) => {
            compare_atoms(op, &Value::Bool(!items.is_empty()), &Value::Bool(*b))
        }
        (Value::Bool(b), Value::Nodes(items)) => {
            compare_atoms(op, &Value::Bool(*b), &Value::Bool(!items.is_empty()))
        }
        (Value::Nodes(ls), Value::Nodes(rs)) => ls.iter().any(|l| {
            let l = Value::Str(string_value(l));
            rs.iter()
                .any(|r| compare_atoms(op, &l, &Value::Str(string_value(r))))
        }),
        (Value::Nodes(ls), atom) => ls
            .iter()
            .any(|l| compare_atoms(op, &Value::Str(string_value(l)), atom)),
        (atom, Value::Nodes(rs)) => rs
            .iter()
            .any(|r| compare_atoms(op, atom, &Value::Str(string_value(r)))),
        (l, r) => compare_atoms(op, l, r),
    }
}

fn compare_atoms(op: CmpOp, left: &Value<'_>, right: &Value<'_>) -> bool {
    match op {
        CmpOp::Eq | CmpOp::NotEq => {
            let equal = match (left, right) {
                (Value::Bool(_), _) | (_, Value::Bool(_)) => left.to_bool() == right.to_bool(),
                (Value::Num(_), _) | (_, Value::Num(_)) => left.to_number() == right.to_number(),
                _ => left.to_xpath_string() == right.to_xpath_string(),
            };
            (op == CmpOp::Eq) == equal
        }
        CmpOp::Lt => left.to_number() < right.to_number(),
        CmpOp::LtEq => left.to_number() <= right.to_number(),
        CmpOp::Gt => left.to_number() > right.to_number(),
        CmpOp::GtEq => left.to_number() >= right.to_number(),
    }
}

fn str_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    let valid = !trimmed.is_empty()
        && trimmed
            .trim_start_matches('-')
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.');
    if valid {
        trimmed.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn xpath_round(n: f64) -> f64 {
    (n + 0.5).floor()
}
