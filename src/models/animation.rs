//! Cels (named OAM lists) and frame-timed animations.

use super::oam::Oam;

/// A named, ordered collection of OAM records forming one sprite pose.
///
/// Ordering is meaningful: index 0 renders on top, so compositors iterate in
/// reverse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationCel {
    pub name: String,
    pub oams: Vec<Oam>,
}

/// One timeline step: a cel referenced by name, shown for `duration` frames.
///
/// `cel_name` is a weak reference; a missing cel renders nothing. Entries
/// with duration 0 are legal and contribute no visible frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnimationEntry {
    pub cel_name: String,
    pub duration: u8,
}

/// A named, ordered sequence of animation entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Animation {
    pub name: String,
    pub entries: Vec<AnimationEntry>,
}

impl Animation {
    /// Total animation length in frames. Zero is legal and renders nothing.
    pub fn total_frames(&self) -> u32 {
        self.entries.iter().map(|e| e.duration as u32).sum()
    }
}

/// Resolve a cel reference by name. `None` means skip/no-render.
pub fn find_cel<'a>(cels: &'a [AnimationCel], name: &str) -> Option<&'a AnimationCel> {
    cels.iter().find(|c| c.name == name)
}
