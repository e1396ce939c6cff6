//! mcgen - minimal x86-64 machine code generation toolkit.
//!
//! Two independent components with no shared state:
//!
//! - [`x64::encoder::Encoder`] assembles x86-64 instructions into an
//!   in-memory byte buffer, tracks labels and relocations, and links the
//!   result either in place or into caller-provided (typically executable)
//!   memory.
//! - [`analyzer::FunctionAnalysis`] computes variable lifetimes over the
//!   three-address IR in [`ir`], widening live ranges across backward
//!   jumps and flagging address-taken and read-before-write variables.
//!
//! # Example
//!
//! ```
//! use mcgen::{Cond, Encoder, ModrmOp, Reg};
//!
//! let mut enc = Encoder::new();
//! let done = enc.add_label();
//! enc.modrm_rr(ModrmOp::Cmp, Reg::RDI, Reg::RSI);
//! enc.jcc(Cond::E, done);
//! enc.mov_imm32(Reg::RAX, 1);
//! enc.move_label(done);
//! enc.ret();
//! enc.apply_relocations(0).unwrap();
//! assert!(!enc.code().is_empty());
//! ```
//!
//! # Architecture
//!
//! - [`x64`] - x86-64 specific code (instruction encoder)
//! - [`ir`] - three-address intermediate representation
//! - [`analyzer`] - lifetime analysis over IR functions

pub mod analyzer;
pub mod ir;
pub mod x64;

pub use analyzer::{AnalyzeError, FunctionAnalysis, Lifetime, OpcodeInfo, VarFlags, VariableInfo};
pub use x64::encoder::{Cond, EncodeError, Encoder, Label, ModrmOp, MulDivOp, Reg, RelocKind};
