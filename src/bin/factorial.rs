//! Encodes a native factorial function, runs it from mapped memory, and
//! shows the lifetime analyzer's view of the equivalent IR.
//!
//! The relocated byte stream is also written to `factorial.bin`, which can
//! be inspected with `ndisasm -b 64 factorial.bin`.

use mcgen::ir::{Comparison, Function, Immediate, OpKind, Opcode, Operand, TypeInfo, TypeKind};
use mcgen::{Cond, Encoder, FunctionAnalysis, ModrmOp, MulDivOp, Reg};

/// Emits `fn(n: i64) -> i64 { max(1, n!) }` with the argument in rdi.
///
/// Immediate operand forms are not supported, so the constant one lives in
/// r8 for the decrement and the comparison is against a zeroed rdx.
fn emit_factorial(enc: &mut Encoder) {
    let start = enc.add_label();
    let end = enc.add_label();

    enc.modrm_rr(ModrmOp::Xor, Reg::RAX, Reg::RAX);
    enc.mov_imm8(Reg::RAX, 1);
    enc.modrm_rr(ModrmOp::Mov, Reg::R8, Reg::RAX);

    enc.move_label(start);
    enc.modrm_rr(ModrmOp::Xor, Reg::RDX, Reg::RDX);
    enc.modrm_rr(ModrmOp::Cmp, Reg::RDI, Reg::RDX);
    enc.jcc(Cond::Le, end);

    // Single operand imul accumulates into rax.
    enc.muldiv(MulDivOp::Imul, Reg::RDI);
    enc.modrm_rr(ModrmOp::Sub, Reg::RDI, Reg::R8);
    enc.jmp(start);

    enc.move_label(end);
    enc.ret();
}

/// The same factorial as IR, for the analyzer:
/// ```text
/// 0: v0 = 1
/// 1: v1 = arg0
/// 2: goto 6 if v1 <= 0
/// 3: v0 = v0 * v1
/// 4: v1 = v1 - 1
/// 5: goto 2
/// 6: return v0
/// ```
fn factorial_ir() -> Function {
    let i64_ty = TypeInfo::scalar(TypeKind::I64);
    let mut func = Function::new(0, i64_ty);
    func.add_argument(i64_ty);
    let result = func.add_variable(i64_ty);
    let counter = func.add_variable(i64_ty);

    let one = Operand::immediate(Immediate::I64(1));
    let zero = Operand::immediate(Immediate::I64(0));
    func.push(Opcode::copy(Operand::variable(result), one));
    func.push(Opcode::copy(Operand::variable(counter), Operand::argument(0)));
    func.push(Opcode::goto_if(
        Comparison::LessEqual,
        6,
        Operand::variable(counter),
        zero,
    ));
    func.push(Opcode::binary(
        OpKind::Mul,
        Operand::variable(result),
        Operand::variable(result),
        Operand::variable(counter),
    ));
    func.push(Opcode::binary(
        OpKind::Sub,
        Operand::variable(counter),
        Operand::variable(counter),
        one,
    ));
    func.push(Opcode::goto(2));
    func.push(Opcode::ret(Operand::variable(result)));
    func
}

#[cfg(all(unix, target_arch = "x86_64"))]
fn run_native(enc: &Encoder) -> Result<(), Box<dyn std::error::Error>> {
    let len = enc.len();
    unsafe {
        let mem = libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        );
        if mem == libc::MAP_FAILED {
            return Err(Box::new(std::io::Error::last_os_error()));
        }
        let target = std::slice::from_raw_parts_mut(mem.cast::<u8>(), len);
        enc.link_to(target)?;

        let factorial: extern "C" fn(i64) -> i64 = std::mem::transmute(mem);
        for n in 0..15 {
            println!("factorial({n}) = {}", factorial(n));
        }

        libc::munmap(mem, len);
    }
    Ok(())
}

#[cfg(not(all(unix, target_arch = "x86_64")))]
fn run_native(_enc: &Encoder) -> Result<(), Box<dyn std::error::Error>> {
    println!("native execution requires an x86-64 unix host, skipping");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut enc = Encoder::new();
    emit_factorial(&mut enc);
    println!("encoded {} bytes", enc.len());

    run_native(&enc)?;

    // Base zero keeps the stream position independent for the dump.
    enc.apply_relocations(0)?;
    std::fs::write("factorial.bin", enc.code())?;
    println!("wrote factorial.bin");

    let func = factorial_ir();
    let analysis = FunctionAnalysis::analyze(&func)?;
    for (index, info) in analysis.variables.iter().enumerate() {
        match info.live_range(func.opcodes.len()) {
            Some(range) => println!(
                "v{index}: live over opcodes {}..{}{}",
                range.start,
                range.end,
                if info.is_eternal() { " (eternal)" } else { "" }
            ),
            None => println!("v{index}: never referenced"),
        }
    }
    Ok(())
}
