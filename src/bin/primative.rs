//! Generate one parametric primitive and write it to a mesh file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use polyhedra::{io, primitives};

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Shape {
    Cube,
    Cylinder,
    Uvsphere,
    Icosphere,
}

#[derive(Parser, Debug)]
#[command(name = "primative")]
#[command(about = "Generate a parametric primitive solid")]
struct Args {
    /// Which shape to generate.
    #[arg(value_enum)]
    shape: Shape,

    /// Output file; format by extension.
    #[arg(short, long, default_value = "out.obj")]
    output: PathBuf,

    /// Cube half-extents.
    #[arg(short = 'x', long, default_value_t = 1.0)]
    size_x: f32,
    #[arg(short = 'y', long, default_value_t = 1.0)]
    size_y: f32,
    #[arg(short = 'z', long, default_value_t = 1.0)]
    size_z: f32,

    /// Radius for cylinders and spheres.
    #[arg(short, long, default_value_t = 1.0)]
    radius: f32,

    /// Cylinder height.
    #[arg(long, default_value_t = 2.0)]
    height: f32,

    /// Points per revolution around the cylinder.
    #[arg(long, default_value_t = 16)]
    points_per_rev: u32,

    /// UV sphere longitude segments.
    #[arg(long, default_value_t = 16)]
    segments: u32,

    /// UV sphere latitude rings.
    #[arg(long, default_value_t = 8)]
    rings: u32,

    /// Icosphere subdivision level.
    #[arg(long, default_value_t = 2)]
    subdivisions: u32,
}

fn main() {
    env_logger::init();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };
    if let Err(e) = run(args) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mesh = match args.shape {
        Shape::Cube => primitives::cube(args.size_x, args.size_y, args.size_z),
        Shape::Cylinder => primitives::cylinder(args.radius, args.height, args.points_per_rev),
        Shape::Uvsphere => primitives::uv_sphere(args.radius, args.segments, args.rings),
        Shape::Icosphere => primitives::icosphere(args.radius, args.subdivisions),
    }
    .context("generating primitive")?;

    io::write_vertex_lists(&args.output, std::slice::from_ref(&mesh), 1.0)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}
