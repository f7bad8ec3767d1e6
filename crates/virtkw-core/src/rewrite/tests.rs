use pretty_assertions::assert_eq;

use super::*;
use crate::{
    node::{tags, Atom, AstTranslator, Translator},
    parser::{MethodParser, Parser},
};

/// Structural form of a method given as source
fn tree(source: &str) -> Node {
    let def = MethodParser::new().parse_method(source).unwrap();
    AstTranslator.translate(&def)
}

fn body(node: &Node) -> &Node {
    node.node_at(2).unwrap()
}

#[test]
fn test_if_becomes_three_thunk_dispatch() {
    let node = tree("method m() if (c) a; else b; endif endmethod");
    let rewritten = IfRewriter.rewrite(body(&node)).unwrap();
    assert_eq!(
        rewritten.to_string(),
        concat!(
            r#"(block (invoke (keyword (self) "if") "#,
            "(thunk (block (lvar :c))) ",
            "(thunk (block (lvar :a))) ",
            "(thunk (block (lvar :b)))))"
        )
    );
}

#[test]
fn test_missing_else_becomes_empty_thunk() {
    // Both the translator's empty block and the unified nil form
    let node = tree("method m() if (c) a; endif endmethod");
    let from_block = IfRewriter.rewrite(body(&node)).unwrap();

    let unified = crate::codec::unify(&node);
    let from_nil = IfRewriter.rewrite(body(&unified)).unwrap();

    assert_eq!(from_block, from_nil);
    let invoke = from_block.node_at(0).unwrap();
    assert_eq!(invoke.arity(), 4);
    assert_eq!(invoke.node_at(3).unwrap().to_string(), "(thunk (block))");
}

#[test]
fn test_and_or_while_take_two_thunks() {
    let node = tree("method m() while (a && b || c) x = 1; endwhile endmethod");
    let rewritten = RewriterSet::standard().rewrite_all(&node).unwrap();

    assert_eq!(rewritten.count_tag(tags::WHILE), 0);
    assert_eq!(rewritten.count_tag(tags::AND), 0);
    assert_eq!(rewritten.count_tag(tags::OR), 0);
    assert_eq!(rewritten.count_tag(tags::INVOKE), 3);

    let outer = body(&rewritten).node_at(0).unwrap();
    assert_eq!(outer.arity(), 3);
    assert_eq!(
        outer.node_at(0).unwrap().to_string(),
        r#"(keyword (self) "while")"#
    );
}

#[test]
fn test_nested_rewrites_inside_out() {
    let node = tree("method m() if (if (a) b; endif) c; endif endmethod");
    let rewritten = IfRewriter.rewrite(body(&node)).unwrap();

    assert_eq!(rewritten.count_tag(tags::IF), 0);
    assert_eq!(rewritten.count_tag(tags::INVOKE), 2);
    // The inner dispatch sits inside the outer condition thunk
    let outer = rewritten.node_at(0).unwrap();
    let condition_thunk = outer.node_at(1).unwrap();
    assert_eq!(condition_thunk.count_tag(tags::INVOKE), 1);
}

#[test]
fn test_mixed_nesting_if_in_while_in_and() {
    let node = tree(
        "method m() ok = ready && while (n > 0) if (n == 3) break; endif n = n - 1; endwhile; endmethod",
    );
    let rewritten = RewriterSet::standard().rewrite_all(&node).unwrap();
    for tag in [tags::IF, tags::WHILE, tags::AND] {
        assert_eq!(rewritten.count_tag(tag), 0, "{tag} left in {rewritten}");
    }
    // and -> while -> if, each nested in the previous one's thunks
    let and_dispatch = body(&rewritten).node_at(0).unwrap().node_at(1).unwrap();
    let right = and_dispatch.node_at(2).unwrap();
    let while_dispatch = right.node_at(0).unwrap().node_at(0).unwrap();
    assert_eq!(
        while_dispatch.node_at(0).unwrap().atom_at(1),
        Some(&Atom::Str("while".into()))
    );
    assert_eq!(while_dispatch.node_at(2).unwrap().count_tag(tags::INVOKE), 1);
}

#[test]
fn test_rewriting_twice_equals_once() {
    let node = tree(
        "method m() if (a || b) while (c) x = x && y; endwhile else return !d; endif endmethod",
    );
    let set = RewriterSet::standard();
    let once = set.rewrite_all(&node).unwrap();
    let twice = set.rewrite_all(&once).unwrap();
    assert_eq!(twice, once);

    for keyword in Keyword::ALL {
        let single = set.rewrite(keyword, &node).unwrap();
        assert_eq!(set.rewrite(keyword, &single).unwrap(), single);
    }
}

#[test]
fn test_other_constructs_untouched() {
    let node = tree("method m() if (a || b) c; endif endmethod");
    let rewritten = AndRewriter.rewrite(&node).unwrap();
    assert_eq!(rewritten, node);

    let rewritten = OrRewriter.rewrite(&node).unwrap();
    assert_eq!(rewritten.count_tag(tags::IF), 1);
    assert_eq!(rewritten.count_tag(tags::OR), 0);
}

#[test]
fn test_wrong_operand_count_is_unsupported() {
    let lonely = Node::new(
        tags::AND,
        vec![Node::new(tags::LVAR, vec![Atom::Name("a".into()).into()]).into()],
    );
    let err = AndRewriter.rewrite(&lonely).unwrap_err();
    assert!(matches!(
        err,
        VirtkwError::UnsupportedConstruct {
            keyword: Keyword::And,
            ..
        }
    ));

    let too_many = Node::new(tags::IF, vec![Atom::Nil.into(); 4]);
    assert!(IfRewriter.rewrite(&too_many).is_err());

    let atom_condition = Node::new(
        tags::WHILE,
        vec![Atom::Bool(true).into(), Node::block(vec![]).into()],
    );
    assert!(matches!(
        WhileRewriter.rewrite(&atom_condition),
        Err(VirtkwError::UnsupportedConstruct { .. })
    ));
}

#[test]
fn test_rewriter_set_replacement() {
    struct NoopIf;
    impl KeywordRewriter for NoopIf {
        fn name(&self) -> &'static str {
            "noop_if"
        }
        fn description(&self) -> &'static str {
            "leaves if alone"
        }
        fn keyword(&self) -> Keyword {
            Keyword::If
        }
        fn replace(&self, node: &Node) -> crate::Result<Node> {
            Ok(node.clone())
        }
    }

    let set = RewriterSet::standard().with(Arc::new(NoopIf));
    assert_eq!(set.keywords().count(), 4);
    assert_eq!(set.get(Keyword::If).unwrap().name(), "noop_if");

    let node = tree("method m() if (a) b; endif endmethod");
    assert_eq!(set.rewrite(Keyword::If, &node).unwrap(), node);
    assert!(RewriterSet::empty().rewrite(Keyword::If, &node).is_err());
}
