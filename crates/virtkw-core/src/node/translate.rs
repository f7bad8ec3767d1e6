// Lowering of compiled methods into structural nodes
// The reflection layer asks a Translator for the body of every method it
// captures; the default AstTranslator works from the typed method AST.

use super::{tags, Atom, Child, Node};
use crate::ast::{LValue, MethodAst, MethodDef};

/// Turns a compiled method into its structural representation
pub trait Translator: Send + Sync {
    fn translate(&self, method: &MethodDef) -> Node;

    /// Get translator name for debugging
    fn name(&self) -> &'static str;
}

/// Default translator over [`MethodDef`] ASTs.
///
/// Output is faithful but not canonical: a missing `else` becomes an empty
/// block and nested `Block`s stay nested. The codec's unifier removes both.
#[derive(Debug, Default, Clone, Copy)]
pub struct AstTranslator;

impl AstTranslator {
    pub fn new() -> Self {
        Self
    }
}

impl Translator for AstTranslator {
    fn translate(&self, method: &MethodDef) -> Node {
        let args = Node::new(
            tags::ARGS,
            method
                .params
                .iter()
                .map(|p| Atom::Name(p.clone()).into())
                .collect(),
        );
        Node::new(
            tags::DEFN,
            vec![
                Atom::Name(method.name.clone()).into(),
                args.into(),
                block(&method.body).into(),
            ],
        )
    }

    fn name(&self) -> &'static str {
        "ast"
    }
}

fn block(statements: &[MethodAst]) -> Node {
    Node::block(statements.iter().map(lower).collect())
}

fn name(n: &str) -> Child {
    Atom::Name(n.to_string()).into()
}

fn node(tag: &str, children: Vec<Child>) -> Node {
    Node::new(tag, children)
}

fn lower_all(items: &[MethodAst]) -> impl Iterator<Item = Child> + '_ {
    items.iter().map(|item| lower(item).into())
}

/// Lower a single AST node
pub fn lower(ast: &MethodAst) -> Node {
    match ast {
        MethodAst::Number(n) => Node::lit(Atom::Int(*n)),
        MethodAst::Float(x) => Node::lit(Atom::Float(*x)),
        MethodAst::String(s) => Node::lit(Atom::Str(s.clone())),
        MethodAst::Boolean(b) => Node::lit(Atom::Bool(*b)),
        MethodAst::Null => Node::lit(Atom::Nil),

        MethodAst::Identifier(n) => node(tags::LVAR, vec![name(n)]),
        MethodAst::SelfRef => Node::leaf(tags::SELF),

        MethodAst::Binary { op, left, right } => node(
            tags::BINOP,
            vec![name(op.symbol()), lower(left).into(), lower(right).into()],
        ),
        MethodAst::And { left, right } => {
            node(tags::AND, vec![lower(left).into(), lower(right).into()])
        }
        MethodAst::Or { left, right } => {
            node(tags::OR, vec![lower(left).into(), lower(right).into()])
        }
        MethodAst::Not { operand } => node(tags::NOT, vec![lower(operand).into()]),
        MethodAst::UnaryMinus { operand } => node(tags::NEG, vec![lower(operand).into()]),

        MethodAst::Assignment { target, value } => match target {
            LValue::Variable(var) => node(tags::LASGN, vec![name(var), lower(value).into()]),
            LValue::Property { object, property } => node(
                tags::PROPASGN,
                vec![lower(object).into(), name(property), lower(value).into()],
            ),
        },

        MethodAst::PropertyAccess { object, property } => {
            node(tags::PROP, vec![lower(object).into(), name(property)])
        }
        MethodAst::MethodCall {
            object,
            method,
            args,
        } => {
            let mut children = vec![lower(object).into(), name(method)];
            children.extend(lower_all(args));
            node(tags::CALL, children)
        }
        MethodAst::FunctionCall { name: func, args } => {
            let mut children = vec![Atom::Nil.into(), name(func)];
            children.extend(lower_all(args));
            node(tags::CALL, children)
        }
        MethodAst::Invoke { callee, args } => {
            let mut children = vec![lower(callee).into()];
            children.extend(lower_all(args));
            node(tags::INVOKE, children)
        }

        MethodAst::KeywordLookup { receiver, keyword } => node(
            tags::KEYWORD,
            vec![
                lower(receiver).into(),
                Atom::Str(keyword.as_str().to_string()).into(),
            ],
        ),
        MethodAst::Thunk { body } => node(tags::THUNK, vec![block(body).into()]),

        MethodAst::List { elements } => node(tags::LIST, lower_all(elements).collect()),

        MethodAst::If {
            condition,
            then_branch,
            else_branch,
        } => {
            let else_child = block(else_branch.as_deref().unwrap_or_default());
            node(
                tags::IF,
                vec![
                    lower(condition).into(),
                    block(then_branch).into(),
                    else_child.into(),
                ],
            )
        }
        MethodAst::While { condition, body } => node(
            tags::WHILE,
            vec![lower(condition).into(), block(body).into()],
        ),

        MethodAst::Return { value } => {
            let child = match value {
                Some(v) => lower(v).into(),
                None => Atom::Nil.into(),
            };
            node(tags::RETURN, vec![child])
        }
        MethodAst::Break => Node::leaf(tags::BREAK),
        MethodAst::Continue => Node::leaf(tags::NEXT),

        MethodAst::Block(statements) => block(statements),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOp;

    #[test]
    fn test_defn_shape() {
        let method = MethodDef::new(
            "add",
            vec!["a".into(), "b".into()],
            vec![MethodAst::Return {
                value: Some(Box::new(MethodAst::Binary {
                    op: BinaryOp::Add,
                    left: Box::new(MethodAst::Identifier("a".into())),
                    right: Box::new(MethodAst::Identifier("b".into())),
                })),
            }],
        );
        let node = AstTranslator.translate(&method);
        assert_eq!(
            node.to_string(),
            "(defn :add (args :a :b) (block (return (binop :+ (lvar :a) (lvar :b)))))"
        );
    }

    #[test]
    fn test_if_without_else_gets_empty_block() {
        let ast = MethodAst::If {
            condition: Box::new(MethodAst::Boolean(true)),
            then_branch: vec![MethodAst::Number(1)],
            else_branch: None,
        };
        assert_eq!(
            lower(&ast).to_string(),
            "(if (lit true) (block (lit 1)) (block))"
        );
    }

    #[test]
    fn test_function_call_has_nil_receiver() {
        let ast = MethodAst::FunctionCall {
            name: "log".into(),
            args: vec![MethodAst::String("x".into())],
        };
        assert_eq!(lower(&ast).to_string(), r#"(call nil :log (lit "x"))"#);
    }
}
