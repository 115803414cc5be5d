//! Text codec for animation cels and animations.
//!
//! Parses and emits the constrained C-like source format the GBA asset
//! pipeline uses. This is a line-oriented hand-written parser for exactly
//! that grammar, not a general C parser:
//!
//! ```text
//! AnimationCel <name>[] = {
//!     /* Len */ <count>,
//!     /* 000 */ 0x0080, 0x4000, 0x0012,
//! };
//!
//! struct Animation <name>[] = {
//!     /* 000 */ { <celName>, <duration> },
//!     /* 001 */ END_ANIMATION,
//! };
//! ```
//!
//! Malformed input degrades rather than fails: bad hex tokens are skipped,
//! bad durations drop the entry with a warning, and an OAM count mismatch is
//! a warning only. Both parsers work on in-memory text so container sections
//! and files share one code path.

use std::fmt::Write as _;
use std::path::Path;

use log::warn;

use crate::models::{Animation, AnimationCel, AnimationEntry, Oam};

/// Header comment emitted at the top of generated files.
const FILE_HEADER: &str = "// Generated by celforge\n\n";

/// Parse animation cels from text in the cel grammar.
///
/// Cels that end up with zero OAMs are dropped silently. An unterminated
/// record at end of input is kept if it holds at least one OAM.
pub fn parse_cels(text: &str) -> Vec<AnimationCel> {
    let mut cels = Vec::new();
    let mut current = AnimationCel::default();
    let mut reading = false;
    let mut next_line_is_count = false;
    let mut expected_oams = 0usize;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if line.contains("AnimationCel") && line.contains('[') {
            if reading && !current.oams.is_empty() {
                cels.push(std::mem::take(&mut current));
            }

            if let Some(name) = cel_name_from_decl(line) {
                current = AnimationCel { name, oams: Vec::new() };
                reading = true;
                next_line_is_count = true;
                expected_oams = 0;
            }
        } else if reading && next_line_is_count {
            expected_oams = first_digit_run(line).unwrap_or(0);
            next_line_is_count = false;
        } else if reading && line.contains("0x") {
            let values = hex_words(line);
            for triple in values.chunks_exact(3) {
                current.oams.push(Oam::unpack([triple[0], triple[1], triple[2]]));
            }
        } else if reading && line.contains("};") {
            if expected_oams > 0 && current.oams.len() != expected_oams {
                warn!(
                    "cel {} declared {} OAMs but parsed {}",
                    current.name,
                    expected_oams,
                    current.oams.len()
                );
            }
            if !current.oams.is_empty() {
                cels.push(std::mem::take(&mut current));
            }
            reading = false;
        }
    }

    if reading && !current.oams.is_empty() {
        cels.push(current);
    }

    cels
}

/// Parse animations from text in the animation grammar.
///
/// `#include` lines are skipped. Entries with an unparsable duration are
/// dropped with a warning. Animations with no entries are discarded.
pub fn parse_animations(text: &str) -> Vec<Animation> {
    let mut animations = Vec::new();
    let mut current = Animation::default();
    let mut reading = false;

    for line in text.lines() {
        if line.trim().is_empty() || line.contains("#include") {
            continue;
        }

        if line.contains("struct Animation") && line.contains('[') {
            if reading && !current.entries.is_empty() {
                animations.push(std::mem::take(&mut current));
            }

            // Names conventionally carry an `anim_` prefix; without one the
            // declaration prefix becomes part of the name, as in the
            // original pipeline.
            let name_start = line.find("anim_").unwrap_or(0);
            if let Some(name_end) = line[name_start..].find("[]") {
                current = Animation {
                    name: line[name_start..name_start + name_end].to_string(),
                    entries: Vec::new(),
                };
                reading = true;
            }
        } else if reading && line.contains('{') && line.contains('}') {
            if line.contains("END_ANIMATION") {
                if !current.entries.is_empty() {
                    animations.push(std::mem::take(&mut current));
                }
                reading = false;
                continue;
            }

            if let Some(entry) = parse_entry_line(line, &current.name) {
                current.entries.push(entry);
            }
        } else if reading && line.contains("};") {
            if !current.entries.is_empty() {
                animations.push(std::mem::take(&mut current));
            }
            reading = false;
        }
    }

    if reading && !current.entries.is_empty() {
        animations.push(current);
    }

    animations
}

/// Read and parse a cel file. Open or read failures log a warning and
/// return an empty list.
pub fn load_cels(path: &Path) -> Vec<AnimationCel> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_cels(&text),
        Err(e) => {
            warn!("failed to open animation cels file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Read and parse an animation file. Open or read failures log a warning
/// and return an empty list.
pub fn load_animations(path: &Path) -> Vec<Animation> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse_animations(&text),
        Err(e) => {
            warn!("failed to open animations file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Serialize cels into the cel grammar. Output round-trips through
/// [`parse_cels`] bit for bit.
pub fn serialize_cels(cels: &[AnimationCel]) -> String {
    let mut out = String::from(FILE_HEADER);

    for cel in cels {
        let _ = writeln!(out, "AnimationCel {}[] = {{", cel.name);
        let _ = writeln!(out, "    /* Len */ {},", cel.oams.len());
        for (i, oam) in cel.oams.iter().enumerate() {
            let [a0, a1, a2] = oam.pack();
            let _ = write!(out, "    /* {:03} */ 0x{:04x}, 0x{:04x}, 0x{:04x}", i, a0, a1, a2);
            if i + 1 < cel.oams.len() {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("};\n\n");
    }

    out
}

/// Serialize animations into the animation grammar, including the
/// `#include` of the cel file they reference.
pub fn serialize_animations(animations: &[Animation], cel_filename: &str) -> String {
    let mut out = String::from(FILE_HEADER);
    out.push_str("#include \"global.h\"\n#include \"graphics.h\"\n\n");
    let _ = writeln!(out, "#include \"{}\"\n", cel_filename);

    for anim in animations {
        let _ = writeln!(out, "struct Animation {}[] = {{", anim.name);
        for (i, entry) in anim.entries.iter().enumerate() {
            let _ = writeln!(
                out,
                "    /* {:03} */ {{ {}, {} }},",
                i, entry.cel_name, entry.duration
            );
        }
        let _ = writeln!(out, "    /* {:03} */ END_ANIMATION,", anim.entries.len());
        out.push_str("};\n\n");
    }

    out
}

/// Write cels to a file in the cel grammar.
pub fn save_cels(path: &Path, cels: &[AnimationCel]) -> std::io::Result<()> {
    std::fs::write(path, serialize_cels(cels))
}

/// Write animations to a file in the animation grammar.
pub fn save_animations(
    path: &Path,
    animations: &[Animation],
    cel_filename: &str,
) -> std::io::Result<()> {
    std::fs::write(path, serialize_animations(animations, cel_filename))
}

/// Extract the cel name between `AnimationCel` and the following `[]`.
fn cel_name_from_decl(line: &str) -> Option<String> {
    let after = line.find("AnimationCel")? + "AnimationCel".len();
    let rest = &line[after..];
    let end = rest.find("[]")?;
    let name = rest[..end].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// First run of ASCII digits anywhere in the line, if any.
fn first_digit_run(line: &str) -> Option<usize> {
    let start = line.find(|c: char| c.is_ascii_digit())?;
    let digits: String =
        line[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// All `0x`-prefixed hex words on a line. Tokens that fail to parse are
/// skipped.
fn hex_words(line: &str) -> Vec<u16> {
    line.split_whitespace()
        .filter_map(|token| {
            let rest = token.strip_prefix("0x")?;
            let digits: String =
                rest.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
            u16::from_str_radix(&digits, 16).ok()
        })
        .collect()
}

/// Parse one `{ celName, duration }` entry line.
fn parse_entry_line(line: &str, anim_name: &str) -> Option<AnimationEntry> {
    let open = line.find('{')? + 1;
    let comma = line[open..].find(',')? + open;
    let close = line[comma..].find('}')? + comma;

    let cel_name = line[open..comma].trim().to_string();
    let duration_str = line[comma + 1..close].trim();

    match duration_str.parse::<u8>() {
        Ok(duration) => Some(AnimationEntry { cel_name, duration }),
        Err(_) => {
            warn!("failed to parse duration {:?} in animation {}", duration_str, anim_name);
            None
        }
    }
}
