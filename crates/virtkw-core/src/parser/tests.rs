use pretty_assertions::assert_eq;

use super::*;
use crate::ast::{BinaryOp, LValue, MethodAst};
use crate::registry::Keyword;

fn parse(source: &str) -> MethodDef {
    MethodParser::new().parse_method(source).unwrap()
}

fn var(name: &str) -> MethodAst {
    MethodAst::Identifier(name.to_string())
}

#[test]
fn test_parse_simple_method() {
    let def = parse("method add(a, b) return a + b; endmethod");
    assert_eq!(def.name, "add");
    assert_eq!(def.params, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(
        def.body,
        vec![MethodAst::Return {
            value: Some(Box::new(MethodAst::Binary {
                op: BinaryOp::Add,
                left: Box::new(var("a")),
                right: Box::new(var("b")),
            })),
        }]
    );
}

#[test]
fn test_semicolons_are_optional() {
    let with = parse("method m() x = 1; y = 2; endmethod");
    let without = parse(
        r#"
method m()
  x = 1
  y = 2
endmethod
"#,
    );
    assert_eq!(with, without);
    assert_eq!(with.body.len(), 2);
}

#[test]
fn test_precedence() {
    let def = parse("method m() return 1 + 2 * 3 == 7 && !done || fallback; endmethod");
    let MethodAst::Return { value: Some(expr) } = &def.body[0] else {
        panic!("expected return");
    };
    // ((1 + (2 * 3)) == 7 && !done) || fallback
    let MethodAst::Or { left, right } = expr.as_ref() else {
        panic!("expected ||, got {expr:?}");
    };
    assert_eq!(right.as_ref(), &var("fallback"));
    let MethodAst::And { left: eq, right: not } = left.as_ref() else {
        panic!("expected &&");
    };
    assert!(matches!(not.as_ref(), MethodAst::Not { .. }));
    let MethodAst::Binary { op, left: sum, .. } = eq.as_ref() else {
        panic!("expected ==");
    };
    assert_eq!(*op, BinaryOp::Equal);
    assert!(matches!(
        sum.as_ref(),
        MethodAst::Binary {
            op: BinaryOp::Add,
            ..
        }
    ));
}

#[test]
fn test_if_else_and_elseif() {
    let def = parse(
        r#"
method classify(n)
  if (n < 0)
    return "negative";
  elseif (n == 0)
    return "zero";
  else
    return "positive";
  endif
endmethod
"#,
    );
    let MethodAst::If {
        else_branch: Some(else_branch),
        ..
    } = &def.body[0]
    else {
        panic!("expected if with else");
    };
    assert!(matches!(
        else_branch.as_slice(),
        [MethodAst::If {
            else_branch: Some(_),
            ..
        }]
    ));
}

#[test]
fn test_while_break_continue() {
    let def = parse(
        r#"
method count()
  i = 0;
  while (true)
    i = i + 1;
    if (i < 3) continue; endif
    break;
  endwhile
  return i;
endmethod
"#,
    );
    let MethodAst::While { body, .. } = &def.body[1] else {
        panic!("expected while");
    };
    assert_eq!(body.len(), 3);
    assert_eq!(body[2], MethodAst::Break);
}

#[test]
fn test_calls_properties_and_assignment() {
    let def = parse(r#"method m(o) o.name = log("x"); return o:greet(1, [2, 3]).size; endmethod"#);
    assert!(matches!(
        &def.body[0],
        MethodAst::Assignment {
            target: LValue::Property { .. },
            value,
        } if matches!(value.as_ref(), MethodAst::FunctionCall { name, .. } if name == "log")
    ));
    let MethodAst::Return { value: Some(expr) } = &def.body[1] else {
        panic!("expected return");
    };
    let MethodAst::PropertyAccess { object, property } = expr.as_ref() else {
        panic!("expected property access");
    };
    assert_eq!(property, "size");
    assert!(matches!(
        object.as_ref(),
        MethodAst::MethodCall { method, args, .. } if method == "greet" && args.len() == 2
    ));
}

#[test]
fn test_keyword_invocation_syntax() {
    let def = parse(
        r#"method m() keyword(self, "and")(thunk a; endthunk, thunk b; endthunk); endmethod"#,
    );
    let MethodAst::Invoke { callee, args } = &def.body[0] else {
        panic!("expected invoke, got {:?}", def.body[0]);
    };
    assert_eq!(
        callee.as_ref(),
        &MethodAst::KeywordLookup {
            receiver: Box::new(MethodAst::SelfRef),
            keyword: Keyword::And,
        }
    );
    assert_eq!(
        args,
        &vec![
            MethodAst::Thunk {
                body: vec![var("a")]
            },
            MethodAst::Thunk {
                body: vec![var("b")]
            },
        ]
    );
}

#[test]
fn test_literals() {
    let def = parse(r#"method m() [1, -2, 1.5, -0.25, "a\"b\n", true, false, null, self]; endmethod"#);
    assert_eq!(
        def.body[0],
        MethodAst::List {
            elements: vec![
                MethodAst::Number(1),
                MethodAst::Number(-2),
                MethodAst::Float(1.5),
                MethodAst::Float(-0.25),
                MethodAst::String("a\"b\n".to_string()),
                MethodAst::Boolean(true),
                MethodAst::Boolean(false),
                MethodAst::Null,
                MethodAst::SelfRef,
            ]
        }
    );
}

#[test]
fn test_comments_are_skipped() {
    let def = parse(
        r#"
// leading comment
method m() // trailing
  return 1; // done
endmethod
"#,
    );
    assert_eq!(def.body.len(), 1);
}

#[test]
fn test_reserved_words_rejected_as_variables() {
    let err = MethodParser::new()
        .parse_method("method m() while = 1; endmethod")
        .unwrap_err();
    assert!(matches!(err, VirtkwError::Parse(_)));
}

#[test]
fn test_parse_error_reports_position() {
    let err = MethodParser::new()
        .parse_method("method m()\n  x = ;\nendmethod")
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("line 2"), "{message}");
}

#[test]
fn test_unknown_keyword_in_lookup_is_error() {
    let result = MethodParser::new().parse_method(r#"method m() keyword(self, "until"); endmethod"#);
    assert!(result.is_err());
}

#[test]
fn test_parse_methods() {
    let defs = MethodParser::new()
        .parse_methods("method a() return 1; endmethod method b(x) return x; endmethod")
        .unwrap();
    let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_create_parser() {
    assert_eq!(create_parser("moo").unwrap().name(), "method");
    assert!(create_parser("python").is_err());
}
