use crate::payload::RegisterPayload;
use crate::register_id::RegisterId;

/// A command issued to the [`PipelineOrchestrator`](../../rsim_orchestrator/index.html)
/// (spec §4.8, §6). Variants beyond `Reset`/`Draw`/`End`/`ClearColor`/
/// `ClearZStencil`/`RegWrite` name operations that belong to the
/// out-of-scope GAL/HAL driver layer (spec §1); the orchestrator
/// acknowledges them without touching rasterizer core state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    Reset,
    Draw,
    End,
    ClearColor {
        color: u32,
    },
    ClearZStencil {
        z: f32,
        stencil: u8,
    },
    FlushColor,
    FlushZStencil,
    SaveColorState,
    RestoreColorState,
    SaveZStencilState,
    RestoreZStencilState,
    ResetColorState,
    ResetZStencilState,
    SwapBuffers,
    LoadVertexProgram,
    LoadFragmentProgram,
    RegWrite {
        reg_id: RegisterId,
        subreg: Option<u32>,
        payload: RegisterPayload,
    },
}

impl Command {
    /// True for the commands this core's stages actually act on; the rest
    /// are acknowledged as external-collaborator no-ops (spec §1, §4.8).
    pub const fn touches_core(&self) -> bool {
        matches!(
            self,
            Command::Reset
                | Command::Draw
                | Command::End
                | Command::ClearColor { .. }
                | Command::ClearZStencil { .. }
                | Command::RegWrite { .. }
        )
    }
}
