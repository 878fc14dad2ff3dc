//! Non-fatal geometry conditions.
//!
//! These never abort a draping call. They are logged when raised and
//! collected on the result so callers can inspect them.

use glam::DVec2;

/// What kind of degenerate input was filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degenerate {
    /// Fewer than three distinct points.
    ShortContour,
    /// A contour enclosing no area.
    ZeroAreaContour,
    /// A zero-area output triangle.
    ZeroAreaTriangle,
    /// Ear clipping found no ear; the remainder was dropped.
    Stalled,
}

/// The attribute the combine rule could not interpolate cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Height,
    TexCoord,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Diagnostic {
    DegenerateGeometry(Degenerate),
    /// Neither input edge had clean values for `attribute`; the first
    /// known candidate was used.
    TessellationAmbiguity { position: DVec2, attribute: Attribute },
}

impl Diagnostic {
    /// Logs the diagnostic and appends it to `out`.
    pub(crate) fn raise(self, out: &mut Vec<Diagnostic>) {
        match self {
            Self::DegenerateGeometry(Degenerate::ZeroAreaTriangle) => {
                tracing::trace!("dropping zero-area triangle");
            }
            Self::DegenerateGeometry(kind) => tracing::warn!(?kind, "degenerate geometry"),
            Self::TessellationAmbiguity {
                position,
                attribute,
            } => tracing::warn!(
                x = position.x,
                z = position.y,
                ?attribute,
                "ambiguous combine, using first known value"
            ),
        }
        out.push(self);
    }
}
