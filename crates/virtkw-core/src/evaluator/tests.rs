use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::{
    behaviors,
    registry::{Behavior, Keyword, Target},
    world::ClassId,
};

fn create_test_runtime() -> (Runtime, ClassId, ObjectId) {
    let runtime = Runtime::new();
    let class = runtime.world().define_class("Probe", None).unwrap();
    let obj = runtime.world().instantiate(class).unwrap();
    (runtime, class, obj)
}

/// Define `source` on the probe class and call it without arguments
fn run(source: &str) -> Result<Value> {
    let (runtime, class, obj) = create_test_runtime();
    let name = runtime.define_method(class, source)?;
    runtime.call(obj, &name, vec![])
}

#[test]
fn test_arithmetic_and_comparison() {
    assert_eq!(
        run("method m() return (7 + 3) * 2 - 10 / 4 % 3; endmethod").unwrap(),
        Value::Integer(18)
    );
    assert_eq!(
        run("method m() return 1.5 * 2; endmethod").unwrap(),
        Value::Float(3.0)
    );
    assert_eq!(
        run(r#"method m() return "a" + "b" + 1; endmethod"#).unwrap(),
        Value::from("ab1")
    );
    assert_eq!(
        run("method m() return [1 < 2, 2 <= 1, 3 == 3.0, \"x\" != \"y\"]; endmethod").unwrap(),
        Value::List(vec![
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Boolean(true),
            Value::Boolean(true),
        ])
    );
}

#[test]
fn test_integer_arithmetic_wraps_at_the_boundary() {
    let min = "x = -9223372036854775807 - 1;";
    assert_eq!(
        run(&format!("method m() {min} return x / -1; endmethod")).unwrap(),
        Value::Integer(i64::MIN)
    );
    assert_eq!(
        run(&format!("method m() {min} return x % -1; endmethod")).unwrap(),
        Value::Integer(0)
    );
    assert_eq!(
        run(&format!("method m() {min} return -x; endmethod")).unwrap(),
        Value::Integer(i64::MIN)
    );
    assert_eq!(
        run(&format!("method m() {min} return x - 1; endmethod")).unwrap(),
        Value::Integer(i64::MAX)
    );
}

#[test]
fn test_truthiness_and_deciding_operands() {
    // Only null and false are falsy
    assert_eq!(run("method m() return 0 && \"yes\"; endmethod").unwrap(), Value::from("yes"));
    assert_eq!(run("method m() return null || 5; endmethod").unwrap(), Value::Integer(5));
    assert_eq!(run("method m() return false && missing; endmethod").unwrap(), Value::Boolean(false));
    assert_eq!(run("method m() return \"\" || missing; endmethod").unwrap(), Value::from(""));
    assert_eq!(run("method m() return !null; endmethod").unwrap(), Value::Boolean(true));
}

#[test]
fn test_if_evaluates_to_taken_branch() {
    assert_eq!(
        run("method m() x = if (false) 1; else 2; endif; return x; endmethod").unwrap(),
        Value::Integer(2)
    );
    assert_eq!(
        run("method m() if (false) 1; endif endmethod").unwrap(),
        Value::Null
    );
}

#[test]
fn test_last_statement_is_result() {
    assert_eq!(run("method m() 1; 2; 3; endmethod").unwrap(), Value::Integer(3));
    assert_eq!(run("method m() endmethod").unwrap(), Value::Null);
}

#[test]
fn test_while_with_break_and_continue() {
    let source = r#"
method m()
  sum = 0;
  i = 0;
  while (true)
    i = i + 1;
    if (i == 3) continue; endif
    if (i > 5) break; endif
    sum = sum + i;
  endwhile
  return sum;
endmethod
"#;
    // 1 + 2 + 4 + 5
    assert_eq!(run(source).unwrap(), Value::Integer(12));
}

#[test]
fn test_return_from_inside_loop() {
    let source = "method m() i = 0; while (true) i = i + 1; if (i == 4) return i * 10; endif endwhile endmethod";
    assert_eq!(run(source).unwrap(), Value::Integer(40));
}

#[test]
fn test_stray_break_is_an_error() {
    let err = run("method m() break; endmethod").unwrap_err();
    assert!(matches!(
        err,
        VirtkwError::Evaluation(EvalError::StrayJump("break"))
    ));
}

#[test]
fn test_runtime_errors() {
    assert!(matches!(
        run("method m() return nope; endmethod"),
        Err(VirtkwError::Evaluation(EvalError::VariableNotFound { .. }))
    ));
    assert!(matches!(
        run("method m() return 1 / 0; endmethod"),
        Err(VirtkwError::Evaluation(EvalError::DivisionByZero))
    ));
    assert!(matches!(
        run("method m() return 1 + true; endmethod"),
        Err(VirtkwError::Evaluation(EvalError::BinaryTypeError { .. }))
    ));
    assert!(matches!(
        run("method m() return self:absent(); endmethod"),
        Err(VirtkwError::Evaluation(EvalError::MethodNotFound { .. }))
    ));
    assert!(matches!(
        run("method m() return nothing_here(1); endmethod"),
        Err(VirtkwError::Evaluation(EvalError::FunctionNotFound { .. }))
    ));
}

#[test]
fn test_method_calls_and_properties() {
    let (runtime, class, obj) = create_test_runtime();
    runtime
        .define_method(class, "method set(v) self.value = v; endmethod")
        .unwrap();
    runtime
        .define_method(class, "method doubled() return self.value * 2; endmethod")
        .unwrap();
    runtime
        .define_method(class, "method run() self:set(21); return self:doubled(); endmethod")
        .unwrap();

    assert_eq!(runtime.call(obj, "run", vec![]).unwrap(), Value::Integer(42));
    assert_eq!(
        runtime.world().get_property(obj, "value"),
        Some(Value::Integer(21))
    );

    let err = runtime.call(obj, "set", vec![]).unwrap_err();
    assert!(matches!(
        err,
        VirtkwError::Evaluation(EvalError::ArityMismatch {
            expected: 1,
            actual: 0,
            ..
        })
    ));
}

#[test]
fn test_thunk_shares_invocation_scope() {
    let (runtime, class, obj) = create_test_runtime();
    let stash: Arc<Mutex<Option<Thunk>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&stash);
    runtime.define_function("keep", move |args| {
        if let [Value::Thunk(t)] = args {
            *slot.lock() = Some(t.clone());
        }
        Ok(Value::Null)
    });
    runtime
        .define_method(
            class,
            "method m() x = 1; keep(thunk x = x + 1; x; endthunk); return x; endmethod",
        )
        .unwrap();

    assert_eq!(runtime.call(obj, "m", vec![]).unwrap(), Value::Integer(1));
    let thunk = stash.lock().clone().unwrap();
    // Each force re-evaluates against the same captured locals
    assert_eq!(thunk.force().unwrap(), Value::Integer(2));
    assert_eq!(thunk.force().unwrap(), Value::Integer(3));
    assert_eq!(thunk.receiver(), obj);
}

#[test]
fn test_forcing_jumps_yields_signals() {
    let (runtime, _, obj) = create_test_runtime();
    let force = |body: Vec<MethodAst>| Thunk::detached(&runtime, obj, body).force().unwrap();

    assert_eq!(force(vec![MethodAst::Break]), Value::Signal(Signal::Break));
    assert_eq!(force(vec![MethodAst::Continue]), Value::Signal(Signal::Continue));
    assert_eq!(
        force(vec![MethodAst::Return {
            value: Some(Box::new(MethodAst::Number(9))),
        }]),
        Value::Signal(Signal::Return(Box::new(Value::Integer(9))))
    );
    assert_eq!(force(vec![MethodAst::Number(4)]), Value::Integer(4));
}

#[test]
fn test_keyword_dispatch_without_registration() {
    let err = run(r#"method m() return keyword(self, "or")(thunk 1; endthunk, thunk 2; endthunk); endmethod"#)
        .unwrap_err();
    assert!(matches!(
        err,
        VirtkwError::UnvirtualizedKeyword {
            keyword: Keyword::Or,
            ..
        }
    ));
}

#[test]
fn test_dispatch_reraises_returned_signals() {
    let (runtime, class, obj) = create_test_runtime();
    runtime
        .registry()
        .register(Target::Class(class), Keyword::If, behaviors::pass_through(Keyword::If));
    runtime
        .define_method(
            class,
            r#"
method m()
  keyword(self, "if")(thunk true; endthunk, thunk return "early"; endthunk, thunk endthunk);
  return "late";
endmethod
"#,
        )
        .unwrap();
    assert_eq!(runtime.call(obj, "m", vec![]).unwrap(), Value::from("early"));
}

#[test]
fn test_behavior_receives_unforced_thunks() {
    let (runtime, class, obj) = create_test_runtime();
    let seen = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&seen);
    runtime.registry().register(
        Target::Instance(obj),
        Keyword::And,
        Behavior::new(move |thunks| {
            *counter.lock() = thunks.len();
            Ok(Value::from("ignored"))
        }),
    );
    runtime
        .define_method(
            class,
            r#"method m() return keyword(self, "and")(thunk missing_fn(); endthunk, thunk 1 / 0; endthunk); endmethod"#,
        )
        .unwrap();

    assert_eq!(runtime.call(obj, "m", vec![]).unwrap(), Value::from("ignored"));
    assert_eq!(*seen.lock(), 2);
}

#[test]
fn test_invoke_requires_callable() {
    assert!(matches!(
        run("method m() x = 3; return x(1); endmethod"),
        Err(VirtkwError::Evaluation(EvalError::FunctionNotFound { .. }))
    ));
    assert!(matches!(
        run("method m() return (3)(1); endmethod"),
        Err(VirtkwError::Evaluation(EvalError::TypeError { .. }))
    ));
}
