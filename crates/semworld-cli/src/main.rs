//! `semworld` – command-line front end to the semantic world.
//!
//! Each invocation loads a scene file (frame graph plus one batch of
//! surfaces), pushes the surfaces through the surface bus into a fresh
//! [`SemanticWorld`], runs one query and prints the result as pretty JSON on
//! stdout.  Logs go to stderr.
//!
//! ```text
//! semworld schema
//! semworld tables    <scene> [minx miny minz maxx maxy maxz]
//! semworld place     <scene> <surface> [--markers] [--shape <json>]
//! semworld match     <scene> <x> <y> <z>
//! semworld collision <scene>
//! semworld config    [--write]
//! ```

mod config;
mod scene;
mod telemetry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;
use serde_json::json;
use tracing::{info, warn};

use semworld_middleware::{SurfaceBus, SurfaceFeed};
use semworld_scene::{InMemoryCollisionWorld, ObjectShape, SemanticWorld, place_locations_marker};
use semworld_types::{Quaternion, Transform3D, Vec3};

use crate::config::Config;
use crate::scene::SceneFile;

/// One parsed invocation.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Schema,
    Tables {
        scene: PathBuf,
        region: Option<(Vec3, Vec3)>,
    },
    Place {
        scene: PathBuf,
        surface: String,
        markers: bool,
        /// Object to place; its clearance replaces the configured heights and
        /// edge margin.
        shape: Option<ObjectShape>,
    },
    Match {
        scene: PathBuf,
        position: Vec3,
    },
    Collision {
        scene: PathBuf,
    },
    Config {
        write: bool,
    },
    Help,
}

fn main() {
    let _guard = telemetry::init_tracing("semworld");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Usage error".red(), e);
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };
    if command == Command::Help {
        print_usage();
        return;
    }

    let cfg = match config::load_or_default() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {}", "Config error".red(), e);
            eprintln!("  Using default configuration.");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: failed to start tokio runtime: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };

    match runtime.block_on(run(command, &cfg)) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("{}", "semworld – semantic world queries".bold());
    eprintln!("  {}                                   print the scene file JSON schema", "schema".cyan());
    eprintln!("  {} <scene> [minx miny minz maxx maxy maxz]  surfaces, optionally within a box", "tables".cyan());
    eprintln!("  {} <scene> <surface> [--markers] [--shape <json>]", "place".cyan());
    eprintln!("        place-pose candidates on a surface; without --shape the configured");
    eprintln!("        heights and edge margin are used, with it they come from the shape");
    eprintln!("  {} <scene> <x> <y> <z>                 surface an object rests on", "match".cyan());
    eprintln!("  {} <scene>                         hand surfaces to a collision world", "collision".cyan());
    eprintln!("  {} [--write]                          show (or write) the configuration", "config".cyan());
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument parsing
// ─────────────────────────────────────────────────────────────────────────────

fn parse_f64s<const N: usize>(values: &[String]) -> Result<[f64; N], String> {
    let mut out = [0.0; N];
    for (slot, raw) in out.iter_mut().zip(values) {
        *slot = raw
            .parse::<f64>()
            .map_err(|_| format!("expected a number, got `{raw}`"))?;
    }
    Ok(out)
}

fn parse_place(scene: &str, surface: &str, flags: &[String]) -> Result<Command, String> {
    let mut markers = false;
    let mut shape = None;
    let mut flags = flags.iter();
    while let Some(flag) = flags.next() {
        match flag.as_str() {
            "--markers" => markers = true,
            "--shape" => {
                let raw = flags.next().ok_or("`--shape` needs a JSON object shape")?;
                let parsed: ObjectShape =
                    serde_json::from_str(raw).map_err(|e| format!("invalid `--shape`: {}", e))?;
                shape = Some(parsed);
            }
            other => return Err(format!("unknown flag `{other}` for `place`")),
        }
    }
    Ok(Command::Place {
        scene: PathBuf::from(scene),
        surface: surface.to_string(),
        markers,
        shape,
    })
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(Command::Help);
    };
    match (name.as_str(), rest) {
        ("help" | "--help" | "-h", _) => Ok(Command::Help),
        ("schema", []) => Ok(Command::Schema),
        ("tables", [scene]) => Ok(Command::Tables {
            scene: PathBuf::from(scene),
            region: None,
        }),
        ("tables", [scene, corners @ ..]) if corners.len() == 6 => {
            let [a, b, c, d, e, f] = parse_f64s::<6>(corners)?;
            Ok(Command::Tables {
                scene: PathBuf::from(scene),
                region: Some((Vec3::new(a, b, c), Vec3::new(d, e, f))),
            })
        }
        ("place", [scene, surface, flags @ ..]) => parse_place(scene, surface, flags),
        ("match", [scene, coords @ ..]) if coords.len() == 3 => {
            let [x, y, z] = parse_f64s::<3>(coords)?;
            Ok(Command::Match {
                scene: PathBuf::from(scene),
                position: Vec3::new(x, y, z),
            })
        }
        ("collision", [scene]) => Ok(Command::Collision {
            scene: PathBuf::from(scene),
        }),
        ("config", []) => Ok(Command::Config { write: false }),
        ("config", [flag]) if flag == "--write" => Ok(Command::Config { write: true }),
        (
            "schema" | "tables" | "place" | "match" | "collision" | "config",
            _,
        ) => Err(format!("wrong arguments for `{name}`")),
        (other, _) => Err(format!("unknown command `{other}`")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command execution
// ─────────────────────────────────────────────────────────────────────────────

fn to_json(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize output: {}", e))
}

/// Build a world from `scene` by feeding its surfaces through a bus.
async fn load_world(
    scene_path: &Path,
    cfg: &Config,
) -> Result<(Arc<SemanticWorld>, InMemoryCollisionWorld), String> {
    let scene = SceneFile::load(scene_path)?;
    let fixed_frame = scene.fixed_frame.clone().unwrap_or_else(|| cfg.fixed_frame.clone());
    let collision = InMemoryCollisionWorld::new();
    let world = Arc::new(SemanticWorld::with_collision_world(
        fixed_frame,
        Arc::new(scene.transform_engine()?),
        collision.clone(),
    ));

    let bus = SurfaceBus::new(cfg.feed_capacity);
    let feed = SurfaceFeed::spawn(bus.subscribe(), world.clone());
    bus.publish(scene.surfaces).map_err(|e| e.to_string())?;
    drop(bus);

    let stats = feed.await.map_err(|e| format!("surface feed failed: {}", e))?;
    if stats.applied == 0 {
        return Err(format!(
            "surfaces in {} were rejected (run with RUST_LOG=warn for details)",
            scene_path.display()
        ));
    }
    info!(surfaces = world.registry().len(), "scene loaded");
    Ok((world, collision))
}

async fn run(command: Command, cfg: &Config) -> Result<String, String> {
    match command {
        Command::Help => Ok(String::new()),
        Command::Schema => SceneFile::schema_json(),
        Command::Config { write } => {
            if write {
                let path = config::save(cfg)?;
                eprintln!("{} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
            }
            toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))
        }
        Command::Tables { scene, region } => {
            let (world, _) = load_world(&scene, cfg).await?;
            let surfaces = match region {
                Some((min, max)) => world.tables_in_roi(min, max),
                None => world.snapshot().surfaces().cloned().collect(),
            };
            to_json(&surfaces)
        }
        Command::Place { scene, surface, markers, shape } => {
            let (world, _) = load_world(&scene, cfg).await?;
            let poses = match shape {
                Some(shape) => {
                    world.generate_place_poses_by_name(&surface, &shape, Quaternion::identity(), cfg.resolution)
                }
                None => match world.snapshot().get(&surface) {
                    Some(entry) => {
                        world.generate_place_poses(&entry.surface, Quaternion::identity(), cfg.place_params())
                    }
                    None => {
                        warn!(surface = %surface, "no such surface");
                        Ok(Vec::new())
                    }
                },
            }
            .map_err(|e| e.to_string())?;
            if markers {
                to_json(&place_locations_marker(&poses))
            } else {
                to_json(&poses)
            }
        }
        Command::Match { scene, position } => {
            let (world, _) = load_world(&scene, cfg).await?;
            let pose = Transform3D::new(position, Quaternion::identity());
            let surface = world.find_object_table(&pose, cfg.min_distance_from_edge, cfg.min_vertical_offset);
            to_json(&json!({ "surface": surface }))
        }
        Command::Collision { scene } => {
            let (world, collision) = load_world(&scene, cfg).await?;
            let complete = world
                .add_tables_to_collision_world(cfg.surface_thickness)
                .map_err(|e| e.to_string())?;
            to_json(&json!({ "complete": complete, "objects": collision.objects() }))
        }
    }
}
