// File: src/vm.rs
//
// The Rill virtual machine.
// A stack machine dispatching over byte-encoded chunks: one operand stack,
// one call-frame stack, a global table, the string intern table, and the
// list of open upvalues that bridges stack slots and heap cells.

use std::cell::RefCell;
use std::rc::Rc;

use crate::builtins;
use crate::chunk::OpCode;
use crate::compiler;
use crate::debug;
use crate::errors::RillError;
use crate::table::Table;
use crate::value::{hash_str, Closure, Native, NativeFn, StrObj, Upvalue, Value};

pub const FRAMES_MAX: usize = 64;
pub const STACK_MAX: usize = FRAMES_MAX * 256;

/// One live activation: the closure being executed, its instruction offset,
/// and the base of its window on the operand stack. `slots` holds the callee
/// itself; arguments and locals follow.
struct CallFrame {
    closure: Rc<Closure>,
    ip: usize,
    slots: usize,
}

pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table,
    /// One canonical object per string; owned per-VM, never shared.
    strings: Table,
    /// Cells aliasing live stack slots, sorted by descending slot. At most
    /// one cell per slot.
    open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
    trace: bool,
}

impl Vm {
    /// A fresh VM: empty stacks, its own intern table, natives registered.
    pub fn new() -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals: Table::new(),
            strings: Table::new(),
            open_upvalues: Vec::new(),
            trace: std::env::var("RILL_TRACE").is_ok(),
        };
        for (name, function) in builtins::all() {
            vm.define_native(name, *function);
        }
        vm
    }

    fn define_native(&mut self, name: &str, function: NativeFn) {
        let name = self.strings.intern(name);
        let native = Value::Native(Rc::new(Native { name: Rc::clone(&name), function }));
        self.globals.set(name, native);
    }

    /// Read a global by name. Embedding/testing hook; returns `None` for
    /// names the program never defined.
    pub fn get_global(&self, name: &str) -> Option<Value> {
        let key = self.strings.find_string(name, hash_str(name))?;
        self.globals.get(&key)
    }

    /// Compile and execute `source`. Compile failures carry their collected
    /// diagnostics; runtime failures carry the message and a stack trace,
    /// after which the VM's stacks are reset and it is ready for more input.
    pub fn interpret(&mut self, source: &str) -> Result<(), RillError> {
        let function = compiler::compile(source, &mut self.strings).map_err(RillError::Compile)?;

        let closure = Rc::new(Closure { function, upvalues: Vec::new() });
        self.stack.push(Value::Closure(Rc::clone(&closure)));
        self.frames.push(CallFrame { closure, ip: 0, slots: 0 });

        self.run().map_err(|message| self.runtime_error(message))
    }

    /// Format the stack trace for a failure, then reset all execution state.
    fn runtime_error(&mut self, message: String) -> RillError {
        let mut trace = Vec::new();
        for frame in self.frames.iter().rev() {
            let function = &frame.closure.function;
            let line = function.chunk.lines[frame.ip.saturating_sub(1)];
            match &function.name {
                Some(name) => trace.push(format!("[line {}] in {}()", line, name.chars)),
                None => trace.push(format!("[line {}] in script", line)),
            }
        }
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
        RillError::Runtime { message, trace }
    }

    // === Stack primitives ===

    fn push(&mut self, value: Value) -> Result<(), String> {
        if self.stack.len() == STACK_MAX {
            return Err("Stack overflow.".to_string());
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().unwrap()
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    // === Instruction stream ===

    fn frame(&self) -> &CallFrame {
        self.frames.last().unwrap()
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let byte = frame.closure.function.chunk.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let hi = u16::from(self.read_byte());
        let lo = u16::from(self.read_byte());
        (hi << 8) | lo
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte() as usize;
        self.frame().closure.function.chunk.constants[index].clone()
    }

    fn read_string(&mut self) -> Rc<StrObj> {
        match self.read_constant() {
            Value::Str(s) => s,
            _ => unreachable!("name operand must index a string constant"),
        }
    }

    // === Dispatch loop ===

    fn run(&mut self) -> Result<(), String> {
        loop {
            if self.trace {
                self.trace_instruction();
            }
            let byte = self.read_byte();
            let op = OpCode::try_from(byte).map_err(|_| format!("Unknown opcode {}.", byte))?;
            match op {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.stack[self.frame().slots + slot].clone();
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0).clone();
                    let base = self.frame().slots;
                    self.stack[base + slot] = value;
                }
                OpCode::GetGlobal => {
                    let name = self.read_string();
                    match self.globals.get(&name) {
                        Some(value) => self.push(value)?,
                        None => return Err(format!("Undefined variable '{}'.", name.chars)),
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0).clone();
                    self.globals.set(name, value);
                    self.pop();
                }
                OpCode::SetGlobal => {
                    let name = self.read_string();
                    let value = self.peek(0).clone();
                    // Assignment never creates: undo the insert and report.
                    if self.globals.set(Rc::clone(&name), value) {
                        self.globals.delete(&name);
                        return Err(format!("Undefined variable '{}'.", name.chars));
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let cell = Rc::clone(&self.frame().closure.upvalues[slot]);
                    let value = match &*cell.borrow() {
                        Upvalue::Open(location) => self.stack[*location].clone(),
                        Upvalue::Closed(value) => value.clone(),
                    };
                    self.push(value)?;
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let cell = Rc::clone(&self.frame().closure.upvalues[slot]);
                    let value = self.peek(0).clone();
                    match &mut *cell.borrow_mut() {
                        Upvalue::Open(location) => self.stack[*location] = value,
                        Upvalue::Closed(closed) => *closed = value,
                    };
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => match (self.peek(1).clone(), self.peek(0).clone()) {
                    (Value::Number(a), Value::Number(b)) => {
                        self.pop();
                        self.pop();
                        self.push(Value::Number(a + b))?;
                    }
                    (Value::Str(a), Value::Str(b)) => {
                        self.pop();
                        self.pop();
                        self.concatenate(&a, &b)?;
                    }
                    _ => return Err("Operands must be two numbers or two strings.".to_string()),
                },
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                OpCode::Negate => {
                    let Value::Number(n) = self.peek(0) else {
                        return Err("Operand must be a number.".to_string());
                    };
                    let n = -*n;
                    self.pop();
                    self.push(Value::Number(n))?;
                }
                OpCode::Print => {
                    let value = self.pop();
                    println!("{}", value);
                }
                OpCode::Jump => {
                    let offset = self.read_short() as usize;
                    self.frames.last_mut().unwrap().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_short() as usize;
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_short() as usize;
                    self.frames.last_mut().unwrap().ip -= offset;
                }
                OpCode::Call => {
                    let arg_count = self.read_byte() as usize;
                    self.call_value(arg_count)?;
                }
                OpCode::Closure => {
                    let function = match self.read_constant() {
                        Value::Function(function) => function,
                        _ => unreachable!("closure operand must index a function constant"),
                    };
                    let mut upvalues = Vec::with_capacity(function.upvalue_count);
                    for _ in 0..function.upvalue_count {
                        let is_local = self.read_byte() != 0;
                        let index = self.read_byte() as usize;
                        if is_local {
                            let slot = self.frame().slots + index;
                            upvalues.push(self.capture_upvalue(slot));
                        } else {
                            upvalues.push(Rc::clone(&self.frame().closure.upvalues[index]));
                        }
                    }
                    self.push(Value::Closure(Rc::new(Closure { function, upvalues })))?;
                }
                OpCode::CloseUpvalue => {
                    self.close_upvalues(self.stack.len() - 1);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().unwrap();
                    self.close_upvalues(frame.slots);
                    if self.frames.is_empty() {
                        // The script closure is still sitting at slot 0.
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(frame.slots);
                    self.push(result)?;
                }
            }
        }
    }

    fn binary_number_op(&mut self, op: fn(f64, f64) -> Value) -> Result<(), String> {
        let (a, b) = match (self.peek(1), self.peek(0)) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => return Err("Operands must be numbers.".to_string()),
        };
        self.pop();
        self.pop();
        self.push(op(a, b))
    }

    /// Concatenation allocates through the intern table, so the result obeys
    /// the one-object-per-byte-sequence invariant like any literal.
    fn concatenate(&mut self, a: &StrObj, b: &StrObj) -> Result<(), String> {
        let mut text = String::with_capacity(a.chars.len() + b.chars.len());
        text.push_str(&a.chars);
        text.push_str(&b.chars);
        let object = self.strings.intern(&text);
        self.push(Value::Str(object))
    }

    // === Calls ===

    fn call_value(&mut self, arg_count: usize) -> Result<(), String> {
        let callee = self.peek(arg_count).clone();
        match callee {
            Value::Closure(closure) => self.call(closure, arg_count),
            Value::Native(native) => {
                let first_arg = self.stack.len() - arg_count;
                let result = (native.function)(&self.stack[first_arg..]);
                // Drop the arguments and the native itself.
                self.stack.truncate(first_arg - 1);
                self.push(result)
            }
            _ => Err("Can only call functions.".to_string()),
        }
    }

    fn call(&mut self, closure: Rc<Closure>, arg_count: usize) -> Result<(), String> {
        let arity = closure.function.arity;
        if arg_count != arity {
            return Err(format!("Expected {} arguments but got {}.", arity, arg_count));
        }
        if self.frames.len() == FRAMES_MAX {
            return Err("Stack overflow.".to_string());
        }
        let slots = self.stack.len() - arg_count - 1;
        self.frames.push(CallFrame { closure, ip: 0, slots });
        Ok(())
    }

    // === Upvalue lifecycle ===

    /// The open cell for `slot`, reusing an existing one so every closure
    /// capturing the same variable shares one cell.
    fn capture_upvalue(&mut self, slot: usize) -> Rc<RefCell<Upvalue>> {
        let mut insert_at = self.open_upvalues.len();
        for (i, cell) in self.open_upvalues.iter().enumerate() {
            let location = match &*cell.borrow() {
                Upvalue::Open(location) => *location,
                Upvalue::Closed(_) => unreachable!("closed cell left in open list"),
            };
            if location == slot {
                return Rc::clone(cell);
            }
            if location < slot {
                // Passed the insertion point; keep the list sorted.
                insert_at = i;
                break;
            }
        }
        let created = Rc::new(RefCell::new(Upvalue::Open(slot)));
        self.open_upvalues.insert(insert_at, Rc::clone(&created));
        created
    }

    /// Close every open upvalue at or above `from_slot`: copy the stack
    /// value into the cell and drop the cell from the open list. Closures
    /// holding the cell keep seeing the shared, now heap-owned value.
    fn close_upvalues(&mut self, from_slot: usize) {
        while let Some(cell) = self.open_upvalues.first() {
            let location = match &*cell.borrow() {
                Upvalue::Open(location) => *location,
                Upvalue::Closed(_) => unreachable!("closed cell left in open list"),
            };
            if location < from_slot {
                break;
            }
            let cell = self.open_upvalues.remove(0);
            let value = self.stack[location].clone();
            *cell.borrow_mut() = Upvalue::Closed(value);
        }
    }

    fn trace_instruction(&self) {
        eprint!("          ");
        for value in &self.stack {
            eprint!("[ {} ]", value);
        }
        eprintln!();
        let frame = self.frame();
        debug::disassemble_instruction(&frame.closure.function.chunk, frame.ip);
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
