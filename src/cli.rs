//! Command-line interface implementation

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::compositor::render_cel_to_image;
use crate::container::load_project;
use crate::convert::{image_to_spritesheet_and_palette, tiles_from_image, tiles_to_image};
use crate::gif_export::{export_gif, GifOptions};
use crate::models::{find_cel, Project};
use crate::paletteio::save_palettes;
use crate::tileio::save_tiles;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// celforge - GBA sprite asset codec and composition toolkit
#[derive(Parser)]
#[command(name = "celforge")]
#[command(about = "celforge - GBA sprite asset codec and composition toolkit")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize the contents of a project container
    Info {
        /// Project container file
        project: PathBuf,
    },

    /// Render one cel to a PNG image
    Render {
        /// Project container file
        project: PathBuf,

        /// Name of the cel to render
        #[arg(short, long)]
        cel: String,

        /// Output PNG path (default: {cel}.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Scale output by integer factor (1-16, default: 1)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=16))]
        scale: u8,
    },

    /// Export one animation as an animated GIF
    Gif {
        /// Project container file
        project: PathBuf,

        /// Name of the animation to export
        #[arg(short, long)]
        anim: String,

        /// Output GIF path (default: {anim}.gif)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Export frame rate in frames per second
        #[arg(long, default_value = "60")]
        fps: f32,

        /// Scale output by integer factor (1-16, default: 1)
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=16))]
        scale: u8,

        /// Play once instead of looping
        #[arg(long)]
        no_loop: bool,
    },

    /// Convert an image into raw 4bpp tiles
    Convert {
        /// Input image (any format the image crate reads)
        image: PathBuf,

        /// Output tiles path (default: tiles.4bpp)
        #[arg(short, long, default_value = "tiles.4bpp")]
        output: PathBuf,

        /// RIFF .pal file to quantize against; omitted, a palette is
        /// derived from the image's most frequent colors
        #[arg(long)]
        pal: Option<PathBuf>,

        /// Palette index whose colors are tried first during quantization
        #[arg(long, default_value = "0")]
        palette_index: i32,

        /// Write the derived palette next to the tiles as a RIFF .pal
        #[arg(long)]
        emit_pal: bool,

        /// Also render the quantized tiles back out as an image, to check
        /// what the palette reduction did
        #[arg(long)]
        preview: Option<PathBuf>,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { project } => run_info(&project),
        Commands::Render { project, cel, output, scale } => {
            run_render(&project, &cel, output.as_deref(), scale as u32)
        }
        Commands::Gif { project, anim, output, fps, scale, no_loop } => {
            run_gif(&project, &anim, output.as_deref(), fps, scale as u32, no_loop)
        }
        Commands::Convert { image, output, pal, palette_index, emit_pal, preview } => {
            run_convert(&image, &output, pal.as_deref(), palette_index, emit_pal, preview.as_deref())
        }
    }
}

fn open_project(path: &Path) -> Option<Project> {
    match load_project(path) {
        Ok(project) => Some(project),
        Err(e) => {
            eprintln!("Error: failed to load {}: {}", path.display(), e);
            None
        }
    }
}

fn run_info(path: &Path) -> ExitCode {
    let Some(project) = open_project(path) else {
        return ExitCode::from(EXIT_ERROR);
    };

    println!("{}", path.display());
    println!("  tiles:      {}", project.tiles.len());
    println!("  palettes:   {}", project.palettes.len());
    println!("  cels:       {}", project.cels.len());
    for cel in &project.cels {
        println!("    {} ({} OAMs)", cel.name, cel.oams.len());
    }
    println!("  animations: {}", project.animations.len());
    for anim in &project.animations {
        println!(
            "    {} ({} entries, {} frames)",
            anim.name,
            anim.entries.len(),
            anim.total_frames()
        );
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn run_render(path: &Path, cel_name: &str, output: Option<&Path>, scale: u32) -> ExitCode {
    let Some(project) = open_project(path) else {
        return ExitCode::from(EXIT_ERROR);
    };
    let Some(cel) = find_cel(&project.cels, cel_name) else {
        eprintln!("Error: no cel named '{}' in {}", cel_name, path.display());
        return ExitCode::from(EXIT_INVALID_ARGS);
    };

    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(format!("{}.png", cel_name)),
    };

    let img = render_cel_to_image(cel, &project.tiles, &project.palettes, scale);
    if let Err(e) = img.save(&out_path) {
        eprintln!("Error: failed to write {}: {}", out_path.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!("Wrote {}", out_path.display());
    ExitCode::from(EXIT_SUCCESS)
}

fn run_gif(
    path: &Path,
    anim_name: &str,
    output: Option<&Path>,
    fps: f32,
    scale: u32,
    no_loop: bool,
) -> ExitCode {
    if fps <= 0.0 {
        eprintln!("Error: --fps must be positive");
        return ExitCode::from(EXIT_INVALID_ARGS);
    }
    let Some(project) = open_project(path) else {
        return ExitCode::from(EXIT_ERROR);
    };
    let Some(anim) = project.animations.iter().find(|a| a.name == anim_name) else {
        eprintln!("Error: no animation named '{}' in {}", anim_name, path.display());
        return ExitCode::from(EXIT_INVALID_ARGS);
    };

    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(format!("{}.gif", anim_name)),
    };

    let options = GifOptions { fps, scale, looped: !no_loop };
    if let Err(e) = export_gif(
        &out_path,
        anim,
        &project.cels,
        &project.tiles,
        &project.palettes,
        options,
    ) {
        eprintln!("Error: failed to export {}: {}", out_path.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }

    println!("Wrote {}", out_path.display());
    ExitCode::from(EXIT_SUCCESS)
}

fn run_convert(
    image: &Path,
    output: &Path,
    pal: Option<&Path>,
    palette_index: i32,
    emit_pal: bool,
    preview: Option<&Path>,
) -> ExitCode {
    let (tiles, palettes) = match pal {
        Some(pal_path) => {
            let palettes = crate::paletteio::load_palettes(pal_path);
            if palettes.is_empty() {
                eprintln!("Error: no palettes loaded from {}", pal_path.display());
                return ExitCode::from(EXIT_ERROR);
            }
            (tiles_from_image(image, &palettes, palette_index), palettes)
        }
        None => {
            let (tiles, palette) = image_to_spritesheet_and_palette(image);
            (tiles, vec![palette])
        }
    };

    if tiles.is_empty() {
        eprintln!("Error: no tiles produced from {}", image.display());
        return ExitCode::from(EXIT_ERROR);
    }

    if let Err(e) = save_tiles(output, &tiles) {
        eprintln!("Error: failed to write {}: {}", output.display(), e);
        return ExitCode::from(EXIT_ERROR);
    }
    println!("Wrote {} ({} tiles)", output.display(), tiles.len());

    if emit_pal {
        let pal_path = output.with_extension("pal");
        if let Err(e) = save_palettes(&pal_path, &palettes) {
            eprintln!("Error: failed to write {}: {}", pal_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
        println!("Wrote {}", pal_path.display());
    }

    if let Some(preview_path) = preview {
        if let Err(e) = tiles_to_image(preview_path, &tiles, &palettes) {
            eprintln!("Error: failed to write {}: {}", preview_path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
        println!("Wrote {}", preview_path.display());
    }

    ExitCode::from(EXIT_SUCCESS)
}
