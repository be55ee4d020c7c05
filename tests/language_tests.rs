// Integration tests for the Rill interpreter
//
// These tests run complete Rill programs through the VM and check the
// results by reading global state afterwards. Covered areas:
// - Arithmetic, comparison, and equality semantics
// - Truthiness and short-circuit operators
// - Control flow (if/else, while, for)
// - Functions, recursion, closures, and upvalue lifetimes
// - String interning
// - Built-in natives
// - Compile and runtime error surfaces

use rill::errors::RillError;
use rill::value::Value;
use rill::vm::Vm;

fn run_code(code: &str) -> Vm {
    let mut vm = Vm::new();
    if let Err(e) = vm.interpret(code) {
        panic!("interpret failed:\n{}", e);
    }
    vm
}

fn runtime_message(code: &str) -> String {
    let mut vm = Vm::new();
    match vm.interpret(code) {
        Err(RillError::Runtime { message, .. }) => message,
        other => panic!("expected runtime error, got {:?}", other),
    }
}

fn compile_diagnostics(code: &str) -> Vec<String> {
    let mut vm = Vm::new();
    match vm.interpret(code) {
        Err(RillError::Compile(diagnostics)) => diagnostics,
        other => panic!("expected compile error, got {:?}", other),
    }
}

fn global_number(vm: &Vm, name: &str) -> f64 {
    match vm.get_global(name) {
        Some(Value::Number(n)) => n,
        other => panic!("expected number in '{}', got {:?}", name, other),
    }
}

fn global_string(vm: &Vm, name: &str) -> String {
    match vm.get_global(name) {
        Some(Value::Str(s)) => s.chars.to_string(),
        other => panic!("expected string in '{}', got {:?}", name, other),
    }
}

fn global_bool(vm: &Vm, name: &str) -> bool {
    match vm.get_global(name) {
        Some(Value::Bool(b)) => b,
        other => panic!("expected bool in '{}', got {:?}", name, other),
    }
}

#[test]
fn test_number_addition_matches_ieee754() {
    let vm = run_code("var r = 1 + 2; var f = 0.1 + 0.2;");
    assert_eq!(global_number(&vm, "r"), 3.0);
    assert_eq!(global_number(&vm, "f"), 0.1 + 0.2);
}

#[test]
fn test_integral_numbers_print_without_fraction() {
    assert_eq!(Value::Number(3.0).to_string(), "3");
    assert_eq!(Value::Number(0.5).to_string(), "0.5");
    assert_eq!(Value::Number(-2.0).to_string(), "-2");
}

#[test]
fn test_string_concatenation_is_byte_concatenation() {
    let vm = run_code("var a = \"st\"; var b = \"r\"; var s = a + b + \"ing\";");
    assert_eq!(global_string(&vm, "s"), "string");
}

#[test]
fn test_mixed_addition_is_a_runtime_error() {
    assert_eq!(runtime_message("var r = 1 + \"s\";"), "Operands must be two numbers or two strings.");
    assert_eq!(runtime_message("var r = \"s\" + 1;"), "Operands must be two numbers or two strings.");
}

#[test]
fn test_equal_string_literals_are_the_same_object() {
    let vm = run_code("var same = \"abc\" == \"abc\";");
    assert!(global_bool(&vm, "same"));

    // Identity, observed through Value equality of the fetched globals.
    let vm = run_code("var a = \"xy\" + \"z\"; var b = \"x\" + \"yz\";");
    let a = vm.get_global("a").unwrap();
    let b = vm.get_global("b").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_double_negation_truth_table() {
    let vm = run_code(
        "var n = !!nil; var f = !!false; var t = !!true; var z = !!0; var e = !!\"\"; var s = !!\"x\";",
    );
    assert!(!global_bool(&vm, "n"));
    assert!(!global_bool(&vm, "f"));
    assert!(global_bool(&vm, "t"));
    assert!(global_bool(&vm, "z"));
    assert!(global_bool(&vm, "e"));
    assert!(global_bool(&vm, "s"));
}

#[test]
fn test_precedence_ladder() {
    let vm = run_code(
        "var a = 1 + 2 * 3;\n\
         var b = (1 + 2) * 3;\n\
         var c = 1 + 2 < 4 == true;\n\
         var d = -2 * 3;\n\
         var e = 10 - 4 - 3;",
    );
    assert_eq!(global_number(&vm, "a"), 7.0);
    assert_eq!(global_number(&vm, "b"), 9.0);
    assert!(global_bool(&vm, "c"));
    assert_eq!(global_number(&vm, "d"), -6.0);
    // Left associative subtraction.
    assert_eq!(global_number(&vm, "e"), 3.0);
}

#[test]
fn test_assignment_is_right_associative_expression() {
    let vm = run_code("var a = 1; var b = 2; a = b = 3;");
    assert_eq!(global_number(&vm, "a"), 3.0);
    assert_eq!(global_number(&vm, "b"), 3.0);
}

#[test]
fn test_if_else_chains() {
    let vm = run_code(
        "fun grade(n) {\n\
           if (n > 90) return \"a\";\n\
           else if (n > 80) return \"b\";\n\
           else return \"c\";\n\
         }\n\
         var hi = grade(95); var mid = grade(85); var lo = grade(10);",
    );
    assert_eq!(global_string(&vm, "hi"), "a");
    assert_eq!(global_string(&vm, "mid"), "b");
    assert_eq!(global_string(&vm, "lo"), "c");
}

#[test]
fn test_for_loop_counts() {
    let vm = run_code(
        "var log = \"\";\n\
         for (var i = 0; i < 3; i = i + 1) log = log + \"x\";",
    );
    assert_eq!(global_string(&vm, "log"), "xxx");
}

#[test]
fn test_while_with_early_state_change() {
    let vm = run_code(
        "var n = 100; var steps = 0;\n\
         while (n > 1) {\n\
           n = n / 2;\n\
           steps = steps + 1;\n\
         }",
    );
    assert_eq!(global_number(&vm, "steps"), 7.0);
}

#[test]
fn test_locals_do_not_leak_out_of_statements() {
    // A variable declared inside each control-flow form stays inside it.
    let vm = run_code(
        "var probe = \"outer\";\n\
         if (true) { var probe = \"if\"; }\n\
         while (false) { var probe = \"while\"; }\n\
         for (var probe = 0; false;) {}\n\
         var after = probe;",
    );
    assert_eq!(global_string(&vm, "after"), "outer");
}

#[test]
fn test_closure_counter_sequence() {
    let vm = run_code(
        "fun make() {\n\
           var x = 0;\n\
           fun inc() { x = x + 1; return x; }\n\
           return inc;\n\
         }\n\
         var c = make();\n\
         var r1 = c(); var r2 = c(); var r3 = c();",
    );
    assert_eq!(global_number(&vm, "r1"), 1.0);
    assert_eq!(global_number(&vm, "r2"), 2.0);
    assert_eq!(global_number(&vm, "r3"), 3.0);
}

#[test]
fn test_independent_counters_do_not_share_state() {
    let vm = run_code(
        "fun make() { var x = 0; fun inc() { x = x + 1; return x; } return inc; }\n\
         var a = make(); var b = make();\n\
         a(); a();\n\
         var ra = a(); var rb = b();",
    );
    assert_eq!(global_number(&vm, "ra"), 3.0);
    assert_eq!(global_number(&vm, "rb"), 1.0);
}

#[test]
fn test_assignment_after_return_is_seen_by_all_sharers() {
    let vm = run_code(
        "var set; var get;\n\
         fun make() {\n\
           var v = \"before\";\n\
           fun s(x) { v = x; }\n\
           fun g() { return v; }\n\
           set = s; get = g;\n\
         }\n\
         make();\n\
         set(\"after\");\n\
         var seen = get();",
    );
    assert_eq!(global_string(&vm, "seen"), "after");
}

#[test]
fn test_closure_captures_variable_not_value() {
    let vm = run_code(
        "var f;\n\
         {\n\
           var x = 1;\n\
           fun read() { return x; }\n\
           x = 2;\n\
           f = read;\n\
         }\n\
         var r = f();",
    );
    assert_eq!(global_number(&vm, "r"), 2.0);
}

#[test]
fn test_recursive_closure_through_global() {
    let vm = run_code(
        "fun countdown(n) { if (n <= 0) return 0; return countdown(n - 1); }\n\
         var r = countdown(50);",
    );
    assert_eq!(global_number(&vm, "r"), 0.0);
}

#[test]
fn test_functions_are_first_class_values() {
    let vm = run_code(
        "fun twice(f, v) { return f(f(v)); }\n\
         fun inc(n) { return n + 1; }\n\
         var r = twice(inc, 40);",
    );
    assert_eq!(global_number(&vm, "r"), 42.0);
}

#[test]
fn test_function_display_forms() {
    let vm = run_code("fun named() {} var f = named; var n = clock;");
    assert_eq!(vm.get_global("f").unwrap().to_string(), "<fn named>");
    assert_eq!(vm.get_global("n").unwrap().to_string(), "<native fn>");
}

#[test]
fn test_native_clock_is_monotonic_within_a_program() {
    let vm = run_code(
        "var t1 = clock();\n\
         var spin = 0;\n\
         for (var i = 0; i < 1000; i = i + 1) spin = spin + i;\n\
         var t2 = clock();\n\
         var ok = t2 >= t1;",
    );
    assert!(global_bool(&vm, "ok"));
}

#[test]
fn test_scenario_undefined_variable() {
    let mut vm = Vm::new();
    let err = vm.interpret("print undefined;").unwrap_err();
    assert_eq!(err.exit_code(), 70);
    match err {
        RillError::Runtime { message, .. } => {
            assert_eq!(message, "Undefined variable 'undefined'.");
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_scenario_arity_mismatch() {
    let mut vm = Vm::new();
    let err = vm.interpret("fun f(a,b){return a;} print f(1);").unwrap_err();
    assert_eq!(err.exit_code(), 70);
    match err {
        RillError::Runtime { message, .. } => {
            assert_eq!(message, "Expected 2 arguments but got 1.");
        }
        other => panic!("expected runtime error, got {:?}", other),
    }
}

#[test]
fn test_runtime_trace_format() {
    let mut vm = Vm::new();
    let err = vm
        .interpret(
            "fun boom() { return nil - 1; }\n\
             boom();",
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Operands must be numbers.\n[line 1] in boom()\n[line 2] in script"
    );
}

#[test]
fn test_compile_error_exit_code_and_format() {
    let mut vm = Vm::new();
    let err = vm.interpret("print ;").unwrap_err();
    assert_eq!(err.exit_code(), 65);
    assert_eq!(err.to_string(), "[line 1] Error at ';': Expect expression.");
}

#[test]
fn test_compile_errors_accumulate_across_statements() {
    let diagnostics = compile_diagnostics("print ;\nvar 2 = 3;\n");
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics[0].starts_with("[line 1] Error at ';'"));
    assert!(diagnostics[1].starts_with("[line 2] Error at '2'"));
}

#[test]
fn test_deep_but_bounded_recursion_is_fine() {
    // 63 nested calls fit; the 64-frame bound only trips unbounded loops.
    let vm = run_code(
        "fun down(n) { if (n == 0) return 0; return down(n - 1); }\n\
         var r = down(60);",
    );
    assert_eq!(global_number(&vm, "r"), 0.0);
}

#[test]
fn test_unbounded_recursion_overflows_cleanly() {
    assert_eq!(runtime_message("fun f() { return f(); } f();"), "Stack overflow.");
}

#[test]
fn test_fib_stresses_calls_and_arithmetic() {
    let vm = run_code(
        "fun fib(n) { if (n < 2) return n; return fib(n - 2) + fib(n - 1); }\n\
         var r = fib(15);",
    );
    assert_eq!(global_number(&vm, "r"), 610.0);
}

#[test]
fn test_nil_comparisons_are_errors_but_equality_is_not() {
    assert_eq!(runtime_message("var r = nil < 1;"), "Operands must be numbers.");
    let vm = run_code("var r = nil == 1; var s = nil == nil;");
    assert!(!global_bool(&vm, "r"));
    assert!(global_bool(&vm, "s"));
}

#[test]
fn test_division_produces_ieee_infinities() {
    let vm = run_code("var inf = 1 / 0; var ok = inf > 1000000;");
    assert!(global_bool(&vm, "ok"));
}
