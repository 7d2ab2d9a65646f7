//! Mesh pipeline front-end: read, operate, write.
//!
//! Operations always run in a fixed order regardless of flag order:
//! scale (on read), simplify, convex hull, plane cut, approximate convex
//! decomposition, mass properties.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;

use polyhedra::{convex_decomp, convex_hull, io, mass_properties, plane_cut, simplify};

#[derive(Parser, Debug)]
#[command(name = "polyhedra")]
#[command(about = "Analyze and manipulate closed triangulated polyhedra")]
struct Args {
    /// Input mesh files (OBJ or binary STL).
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file; format by extension (OBJ, STL, SVG).
    #[arg(short, long, default_value = "out.obj")]
    output: PathBuf,

    /// Scale applied to every vertex on read.
    #[arg(short, long, default_value_t = 1.0)]
    scale: f32,

    /// Simplify each mesh down to this many faces.
    #[arg(long, value_name = "FACES")]
    simplify: Option<usize>,

    /// Far-pair aggregation distance used while simplifying.
    #[arg(long, default_value_t = 0.0, value_name = "DIST")]
    aggregate: f32,

    /// Replace each mesh with its convex hull.
    #[arg(long)]
    hull: bool,

    /// Cut by the plane nx*x + ny*y + nz*z = d (four values).
    #[arg(long, num_args = 4, value_name = "F", allow_negative_numbers = true)]
    cut: Option<Vec<f32>>,

    /// Approximate convex decomposition with this volume-error threshold.
    #[arg(long, value_name = "THRESHOLD")]
    decompose: Option<f32>,

    /// Print volume, center of mass and inertia of each result.
    #[arg(long)]
    mass: bool,
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
    let mut meshes = Vec::new();
    for input in &args.inputs {
        let read = io::read_vertex_lists(input, args.scale)
            .with_context(|| format!("reading {}", input.display()))?;
        meshes.extend(read);
    }

    if let Some(faces) = args.simplify {
        meshes = meshes
            .iter()
            .map(|m| simplify(m, faces, args.aggregate))
            .collect::<polyhedra::Result<_>>()
            .context("simplifying")?;
    }
    if args.hull {
        meshes = meshes
            .iter()
            .map(convex_hull)
            .collect::<polyhedra::Result<_>>()
            .context("taking convex hulls")?;
    }
    if let Some(plane) = &args.cut {
        let n = Vec3::new(plane[0], plane[1], plane[2]);
        let mut pieces = Vec::new();
        for m in &meshes {
            pieces.extend(plane_cut(m, n, plane[3]).context("cutting")?);
        }
        meshes = pieces;
    }
    if let Some(threshold) = args.decompose {
        let mut parts = Vec::new();
        for m in &meshes {
            parts.extend(convex_decomp(m, threshold).context("decomposing")?);
        }
        meshes = parts;
    }
    if args.mass {
        for (i, m) in meshes.iter().enumerate() {
            let props = mass_properties(m).context("integrating mass properties")?;
            println!("mesh {i}:");
            println!("  volume  {}", props.volume);
            println!("  com     {} {} {}", props.com.x, props.com.y, props.com.z);
            for row in 0..3 {
                println!(
                    "  inertia {} {} {}",
                    props.inertia.col(0)[row],
                    props.inertia.col(1)[row],
                    props.inertia.col(2)[row]
                );
            }
        }
    }

    io::write_vertex_lists(&args.output, &meshes, 1.0)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(())
}
