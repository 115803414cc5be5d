//! The project aggregate: every collection the editor owns, plus scalar
//! metadata.

use super::animation::{Animation, AnimationCel};
use super::palette::Palette;
use super::tile::TileStore;

/// Scalar project metadata carried in the container's metadata section.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectMeta {
    /// Filename the animation file `#include`s for its cels.
    pub cel_filename: String,
    /// Active palette index. Clamped into range after a container load.
    pub current_palette: i32,
    /// Active animation index, -1 for none.
    pub current_animation: i32,
    /// Playback frame rate in frames per second.
    pub frame_rate: f32,
    /// Whether playback loops.
    pub looped: bool,
}

impl Default for ProjectMeta {
    fn default() -> Self {
        Self {
            cel_filename: String::new(),
            current_palette: 0,
            current_animation: -1,
            frame_rate: 60.0,
            looped: true,
        }
    }
}

/// One tile store, one palette table, all cels and animations, and metadata.
///
/// All mutation goes through the single owner; the core assumes
/// single-threaded access and offers no locking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Project {
    pub tiles: TileStore,
    pub palettes: Vec<Palette>,
    pub cels: Vec<AnimationCel>,
    pub animations: Vec<Animation>,
    pub meta: ProjectMeta,
}

impl Project {
    /// Fresh project with one placeholder palette.
    pub fn new() -> Self {
        Self { palettes: vec![Palette::grayscale()], ..Self::default() }
    }

    /// Rename a cel and cascade the change to every animation entry that
    /// references it by name. Returns false if no cel had the old name.
    pub fn rename_cel(&mut self, old_name: &str, new_name: &str) -> bool {
        let Some(cel) = self.cels.iter_mut().find(|c| c.name == old_name) else {
            return false;
        };
        cel.name = new_name.to_string();

        for anim in &mut self.animations {
            for entry in &mut anim.entries {
                if entry.cel_name == old_name {
                    entry.cel_name = new_name.to_string();
                }
            }
        }
        true
    }

    /// Remove a cel by name. Animation entries keep their dangling name and
    /// simply render nothing until repointed.
    pub fn remove_cel(&mut self, name: &str) -> bool {
        let before = self.cels.len();
        self.cels.retain(|c| c.name != name);
        self.cels.len() != before
    }

    /// Clamp metadata indices into the valid range for the loaded
    /// collections.
    pub fn clamp_indices(&mut self) {
        let max_palette = self.palettes.len() as i32 - 1;
        self.meta.current_palette = self.meta.current_palette.clamp(0, max_palette.max(0));
        let max_anim = self.animations.len() as i32 - 1;
        self.meta.current_animation = self.meta.current_animation.clamp(-1, max_anim);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnimationEntry;

    #[test]
    fn test_new_project_has_placeholder_palette() {
        let project = Project::new();
        assert_eq!(project.palettes.len(), 1);
        assert!(project.tiles.is_empty());
    }

    #[test]
    fn test_rename_cel_cascades_to_animations() {
        let mut project = Project::new();
        project.cels.push(AnimationCel { name: "walk0".into(), oams: vec![] });
        project.animations.push(Animation {
            name: "anim_walk".into(),
            entries: vec![
                AnimationEntry { cel_name: "walk0".into(), duration: 4 },
                AnimationEntry { cel_name: "other".into(), duration: 4 },
            ],
        });

        assert!(project.rename_cel("walk0", "walk_start"));
        assert_eq!(project.cels[0].name, "walk_start");
        assert_eq!(project.animations[0].entries[0].cel_name, "walk_start");
        assert_eq!(project.animations[0].entries[1].cel_name, "other");
    }

    #[test]
    fn test_rename_missing_cel_returns_false() {
        let mut project = Project::new();
        assert!(!project.rename_cel("nope", "still_nope"));
    }

    #[test]
    fn test_clamp_indices() {
        let mut project = Project::new();
        project.meta.current_palette = 9;
        project.meta.current_animation = 3;
        project.clamp_indices();
        assert_eq!(project.meta.current_palette, 0);
        assert_eq!(project.meta.current_animation, -1);
    }
}
