// File: src/builtins.rs
//
// Built-in native functions for Rill.
// Natives are plain Rust functions over a borrowed argument slice; they
// cannot hold on to the stack and they report bad arguments by returning
// nil rather than raising.

use std::time::Instant;

use once_cell::sync::Lazy;

use crate::value::{NativeFn, Value};

static START: Lazy<Instant> = Lazy::new(Instant::now);

/// Name/function pairs registered as globals when a VM is created.
pub fn all() -> &'static [(&'static str, NativeFn)] {
    &[
        ("clock", clock),
        ("sqrt", sqrt),
        ("abs", abs),
        ("floor", floor),
        ("min", min),
        ("max", max),
    ]
}

/// Seconds since the first VM in this process started. The epoch is
/// arbitrary; the value never decreases.
pub fn clock(_args: &[Value]) -> Value {
    Value::Number(START.elapsed().as_secs_f64())
}

pub fn sqrt(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Number(n)) => Value::Number(n.sqrt()),
        _ => Value::Nil,
    }
}

pub fn abs(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Number(n)) => Value::Number(n.abs()),
        _ => Value::Nil,
    }
}

pub fn floor(args: &[Value]) -> Value {
    match args.first() {
        Some(Value::Number(n)) => Value::Number(n.floor()),
        _ => Value::Nil,
    }
}

pub fn min(args: &[Value]) -> Value {
    match args {
        [Value::Number(a), Value::Number(b)] => Value::Number(a.min(*b)),
        _ => Value::Nil,
    }
}

pub fn max(args: &[Value]) -> Value {
    match args {
        [Value::Number(a), Value::Number(b)] => Value::Number(a.max(*b)),
        _ => Value::Nil,
    }
}
