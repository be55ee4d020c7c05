// File: src/debug.rs
//
// Bytecode disassembler for Rill chunks.
// Output goes to stderr so it never mixes with program output. The compiler
// dumps each finished chunk when RILL_DUMP_CODE is set; the VM traces every
// instruction when RILL_TRACE is set.

use crate::chunk::{Chunk, OpCode};
use crate::value::Value;

pub fn disassemble_chunk(chunk: &Chunk, name: &str) {
    eprintln!("== {} ==", name);
    let mut offset = 0;
    while offset < chunk.code.len() {
        offset = disassemble_instruction(chunk, offset);
    }
}

/// Print one instruction and return the offset of the next.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> usize {
    eprint!("{:04} ", offset);
    if offset > 0 && chunk.lines[offset] == chunk.lines[offset - 1] {
        eprint!("   | ");
    } else {
        eprint!("{:4} ", chunk.lines[offset]);
    }

    let byte = chunk.code[offset];
    let Ok(op) = OpCode::try_from(byte) else {
        eprintln!("Unknown opcode {}", byte);
        return offset + 1;
    };

    match op {
        OpCode::Constant | OpCode::GetGlobal | OpCode::DefineGlobal | OpCode::SetGlobal => {
            constant_instruction(op, chunk, offset)
        }
        OpCode::GetLocal | OpCode::SetLocal | OpCode::GetUpvalue | OpCode::SetUpvalue
        | OpCode::Call => byte_instruction(op, chunk, offset),
        OpCode::Jump | OpCode::JumpIfFalse => jump_instruction(op, 1, chunk, offset),
        OpCode::Loop => jump_instruction(op, -1, chunk, offset),
        OpCode::Closure => closure_instruction(chunk, offset),
        _ => {
            eprintln!("{}", op_name(op));
            offset + 1
        }
    }
}

fn op_name(op: OpCode) -> String {
    format!("{:?}", op)
}

fn constant_instruction(op: OpCode, chunk: &Chunk, offset: usize) -> usize {
    let index = chunk.code[offset + 1] as usize;
    eprintln!("{:<16} {:4} '{}'", op_name(op), index, chunk.constants[index]);
    offset + 2
}

fn byte_instruction(op: OpCode, chunk: &Chunk, offset: usize) -> usize {
    let slot = chunk.code[offset + 1];
    eprintln!("{:<16} {:4}", op_name(op), slot);
    offset + 2
}

fn jump_instruction(op: OpCode, sign: isize, chunk: &Chunk, offset: usize) -> usize {
    let jump = ((chunk.code[offset + 1] as usize) << 8) | chunk.code[offset + 2] as usize;
    let target = (offset as isize + 3) + sign * jump as isize;
    eprintln!("{:<16} {:4} -> {}", op_name(op), offset, target);
    offset + 3
}

fn closure_instruction(chunk: &Chunk, offset: usize) -> usize {
    let index = chunk.code[offset + 1] as usize;
    eprintln!("{:<16} {:4} {}", op_name(OpCode::Closure), index, chunk.constants[index]);

    let upvalue_count = match &chunk.constants[index] {
        Value::Function(function) => function.upvalue_count,
        _ => 0,
    };
    let mut offset = offset + 2;
    for _ in 0..upvalue_count {
        let is_local = chunk.code[offset] != 0;
        let slot = chunk.code[offset + 1];
        eprintln!(
            "{:04}      |                     {} {}",
            offset,
            if is_local { "local" } else { "upvalue" },
            slot
        );
        offset += 2;
    }
    offset
}
