/// Shared error taxonomy (spec §7). Resource exhaustion (§7.3) is
/// deliberately absent: it self-heals through backpressure (a [`StageStatus`]
/// of `Busy`) and is never surfaced as an error. Domain warnings (§7.5) are
/// also absent: they are logged and the affected draw is dropped, not
/// propagated as an error.
///
/// [`StageStatus`]: crate::StageStatus
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// An illegal parameter was supplied at construction time (spec §7.1).
    /// Fatal; there is no recovery path.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A command or register write arrived while a stage was in a state
    /// that cannot accept it (spec §7.2), e.g. `DRAW` while already
    /// `DRAWING`, or `REG_WRITE` while not `READY`.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A reference to state that should exist does not: an unmapped vertex
    /// attribute, an unknown register id, an illegal stream buffer id, or
    /// an unsupported format in a converter (spec §7.4). Fatal.
    #[error("inconsistent binding: {0}")]
    InconsistentBinding(String),
}
