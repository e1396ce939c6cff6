//! x86-64 specific machine code generation.

pub mod encoder;

pub use encoder::{Cond, EncodeError, Encoder, Label, ModrmOp, MulDivOp, Reg, RelocKind};
