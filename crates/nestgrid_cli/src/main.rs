//! CLI entry point for inspecting domain layouts.
//!
//! # Responsibility
//! - Load a layout file, build the registry and print the domain tree.
//! - Optionally start file logging before the build.
//!
//! Usage: `nestgrid_cli <layout.json> [--log-dir <abs-dir>] [--log-level <level>]`

use nestgrid_core::{core_version, init_logging, DomainLayout, DomainRegistry, LogSettings};
use std::process::ExitCode;

struct CliArgs {
    layout_path: String,
    log_dir: Option<String>,
    log_level: Option<String>,
}

fn main() -> ExitCode {
    match run(std::env::args().skip(1)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("nestgrid_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: impl Iterator<Item = String>) -> Result<(), String> {
    let args = parse_args(args)?;
    if let Some(log_dir) = &args.log_dir {
        let settings = match &args.log_level {
            Some(level) => LogSettings::new(level, log_dir)?,
            None => LogSettings::with_default_level(log_dir)?,
        };
        init_logging(&settings)?;
    }

    let registry = DomainLayout::from_path(&args.layout_path)
        .and_then(|layout| layout.build())
        .map_err(|err| err.to_string())?;

    println!("nestgrid_core version={}", core_version());
    for line in render_tree(&registry)? {
        println!("{line}");
    }
    Ok(())
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut layout_path = None;
    let mut log_dir = None;
    let mut log_level = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--log-dir" => {
                log_dir = Some(args.next().ok_or("--log-dir requires a value")?);
            }
            "--log-level" => {
                log_level = Some(args.next().ok_or("--log-level requires a value")?);
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown option `{other}`"));
            }
            path if layout_path.is_none() => layout_path = Some(path.to_string()),
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }

    Ok(CliArgs {
        layout_path: layout_path.ok_or("missing layout path")?,
        log_dir,
        log_level,
    })
}

fn render_tree(registry: &DomainRegistry) -> Result<Vec<String>, String> {
    let walk = registry
        .walk(registry.root())
        .map_err(|err| err.to_string())?;

    let mut lines = Vec::with_capacity(walk.len());
    for (depth, key) in walk {
        let Some(node) = registry.node(key) else {
            continue;
        };
        let shape = node
            .grid()
            .shape
            .map(|shape| format!("{}x{}x{}", shape.nx, shape.ny, shape.nz))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "{}domain id={} kind={} shape={} static_fields={} dynamic_fields={}",
            "  ".repeat(depth),
            node.id(),
            node.kind().as_str(),
            shape,
            node.static_fields().len(),
            node.dynamic_fields().len()
        ));
    }
    Ok(lines)
}
