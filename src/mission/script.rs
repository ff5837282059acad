//! Persisted state of the per-object script engine.
//!
//! Only the variables are stored here; the script bytecode itself is
//! reloaded from the scenario data and addressed by `script_offset`.

use crate::savegame::descriptor::{Layout, Scalar};

pub const SCRIPT_VARIABLES: usize = 5;
pub const SCRIPT_STACK: usize = 15;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptEngine {
    pub delay: u16,
    pub script_offset: u16,
    pub return_value: u16,
    pub frame_pointer: u8,
    pub stack_pointer: u8,
    pub variables: [u16; SCRIPT_VARIABLES],
    pub stack: [u16; SCRIPT_STACK],
    pub is_subroutine: u8,
}

impl ScriptEngine {
    /// Frame and stack pointers index into `stack`; anything past its end
    /// cannot be resumed.
    pub fn pointers_valid(&self) -> bool {
        (self.stack_pointer as usize) <= SCRIPT_STACK
            && (self.frame_pointer as usize) <= SCRIPT_STACK + 2
    }

    /// Empty the stack so the script restarts from its current offset.
    pub fn reset_stack(&mut self) {
        self.stack_pointer = SCRIPT_STACK as u8;
        self.frame_pointer = SCRIPT_STACK as u8 + 2;
        self.is_subroutine = 0;
    }
}

pub fn script_layout() -> Layout<ScriptEngine> {
    Layout::<ScriptEngine>::new()
        .entry(Scalar::U16, |s| s.delay as u32, |s, v| s.delay = v as u16)
        // script info pointer, meaningless once reloaded
        .empty(Scalar::U32, 1)
        .entry(Scalar::U16, |s| s.script_offset as u32, |s, v| s.script_offset = v as u16)
        .entry(Scalar::U16, |s| s.return_value as u32, |s, v| s.return_value = v as u16)
        .entry(Scalar::U8, |s| s.frame_pointer as u32, |s, v| s.frame_pointer = v as u8)
        .entry(Scalar::U8, |s| s.stack_pointer as u32, |s, v| s.stack_pointer = v as u8)
        .array(
            Scalar::U16,
            SCRIPT_VARIABLES,
            |s, i| s.variables[i] as u32,
            |s, i, v| s.variables[i] = v as u16,
        )
        .array(
            Scalar::U16,
            SCRIPT_STACK,
            |s, i| s.stack[i] as u32,
            |s, i, v| s.stack[i] = v as u16,
        )
        .entry(Scalar::U8, |s| s.is_subroutine as u32, |s, v| s.is_subroutine = v as u8)
        .empty(Scalar::U8, 1)
}
