//! Ready-made keyword behaviors
//!
//! Each one reproduces the keyword's native semantics on top of operand
//! thunks. They are the usual starting point for a custom behavior: wrap one,
//! do something extra, delegate.
//!
//! Every thunk result is checked for [`Signal`]s. A signal coming out of an
//! operand is handed back unchanged so the dispatch site can re-raise it; only
//! the loop driver consumes `Break` and `Continue` itself.

use crate::{
    evaluator::{EvalError, Signal, Thunk, Value},
    registry::{Behavior, Keyword},
    Result,
};

/// Check the operand count and borrow the operands as a fixed-size array
pub fn operands<const N: usize>(keyword: Keyword, thunks: &[Thunk]) -> Result<&[Thunk; N]> {
    <&[Thunk; N]>::try_from(thunks).map_err(|_| {
        EvalError::Runtime(format!(
            "'{keyword}' behavior expects {N} operands, got {}",
            thunks.len()
        ))
        .into()
    })
}

/// `if`: force the condition, then exactly one branch
pub fn native_if(thunks: &[Thunk]) -> Result<Value> {
    let [condition, then_branch, else_branch] = operands::<3>(Keyword::If, thunks)?;
    let test = condition.force()?;
    if test.is_signal() {
        return Ok(test);
    }
    if test.is_truthy() {
        then_branch.force()
    } else {
        else_branch.force()
    }
}

/// `and`: the left value if falsy, otherwise the right value
pub fn native_and(thunks: &[Thunk]) -> Result<Value> {
    let [left, right] = operands::<2>(Keyword::And, thunks)?;
    let value = left.force()?;
    if value.is_signal() || !value.is_truthy() {
        return Ok(value);
    }
    right.force()
}

/// `or`: the left value if truthy, otherwise the right value
pub fn native_or(thunks: &[Thunk]) -> Result<Value> {
    let [left, right] = operands::<2>(Keyword::Or, thunks)?;
    let value = left.force()?;
    if value.is_signal() || value.is_truthy() {
        return Ok(value);
    }
    right.force()
}

/// Default `while` driver.
///
/// Forces the condition before every iteration. `Break` from the body ends
/// the loop, `Continue` moves to the next condition check and `Return` is
/// handed back for the dispatch site to re-raise. Evaluates to null.
pub fn drive_while(thunks: &[Thunk]) -> Result<Value> {
    let [condition, body] = operands::<2>(Keyword::While, thunks)?;
    loop {
        let test = condition.force()?;
        if test.is_signal() {
            return Ok(test);
        }
        if !test.is_truthy() {
            break;
        }
        match body.force()? {
            Value::Signal(Signal::Break) => break,
            Value::Signal(Signal::Continue) => continue,
            returned @ Value::Signal(Signal::Return(_)) => return Ok(returned),
            _ => {}
        }
    }
    Ok(Value::Null)
}

/// Behavior with the keyword's native semantics
pub fn pass_through(keyword: Keyword) -> Behavior {
    match keyword {
        Keyword::If => Behavior::new(native_if),
        Keyword::And => Behavior::new(native_and),
        Keyword::Or => Behavior::new(native_or),
        Keyword::While => Behavior::new(drive_while),
    }
}
