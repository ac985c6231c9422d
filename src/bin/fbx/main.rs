//! FBX CLI - Tool for inspecting and re-encoding binary FBX files.

use fbx::prelude::*;
use fbx::scene::object_name;
use std::env;
use std::process::exit;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("FBX_BUILD_DATE"),
    " ",
    env!("FBX_BUILD_TIME"),
    ")"
);

fn init_logging(level: &str) {
    // RUST_LOG wins over the command line flags.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    let Some(&command) = filtered_args.first() else {
        print_help();
        return;
    };

    match command {
        "info" | "i" => cmd_info(require_arg(&filtered_args, 1, "info <file.fbx>")),
        "tree" | "t" => {
            let json = filtered_args.iter().any(|&s| s == "--json" || s == "-j");
            let rest: Vec<&str> = filtered_args
                .iter()
                .copied()
                .filter(|&s| s != "--json" && s != "-j")
                .collect();
            cmd_tree(require_arg(&rest, 1, "tree <file.fbx> [--json]"), json);
        }
        "meshes" | "m" => cmd_meshes(require_arg(&filtered_args, 1, "meshes <file.fbx>")),
        "roundtrip" | "r" => {
            let usage = "roundtrip <in.fbx> <out.fbx>";
            let input = require_arg(&filtered_args, 1, usage);
            let output = require_arg(&filtered_args, 2, usage);
            cmd_roundtrip(input, output);
        }
        "version" | "--version" | "-V" => println!("fbx-cli {}", VERSION),
        "help" | "h" | "--help" | "-h" => print_help(),
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Run 'fbx-cli help' for usage");
            exit(1);
        }
    }
}

fn require_arg<'a>(args: &[&'a str], index: usize, usage: &str) -> &'a str {
    match args.get(index) {
        Some(&arg) => arg,
        None => {
            eprintln!("Error: missing argument");
            eprintln!("Usage: fbx-cli {}", usage);
            exit(1);
        }
    }
}

fn print_help() {
    println!("fbx-cli {} - binary FBX toolkit", VERSION);
    println!();
    println!("USAGE:");
    println!("    fbx-cli [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info      <file>              Show version, width mode and record counts");
    println!("    t, tree      <file> [--json]     Show the full record tree");
    println!("    m, meshes    <file>              List meshes, surfaces and morph targets");
    println!("    r, roundtrip <in> <out>          Load and re-save, report byte identity");
    println!("    version                          Show version");
    println!("    h, help                          Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("RUST_LOG overrides the verbosity flags.");
}

fn open_or_exit(path: &str) -> Document {
    info!("Opening {}", path);
    match Document::open(path) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Failed to open {}: {}", path, e);
            exit(1);
        }
    }
}

fn cmd_info(path: &str) {
    let doc = open_or_exit(path);

    let total: usize = doc.records.iter().map(|r| r.descendants().count()).sum();
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    println!("File:    {} ({} bytes)", path, size);
    println!("Version: {}", doc.version);
    println!("Width:   {:?} ({}-byte record fields)", doc.width(), doc.width().field_len());
    println!("Records: {} top-level, {} total", doc.records.len(), total);
    println!();

    for rec in &doc.records {
        println!("  {:<24} {:>6} children", rec.name, rec.children.len());
    }

    if let Some(objects) = doc.record("Objects") {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for obj in &objects.children {
            match counts.iter_mut().find(|(n, _)| *n == obj.name) {
                Some((_, c)) => *c += 1,
                None => counts.push((obj.name.as_str(), 1)),
            }
        }
        println!();
        println!("Objects:");
        for (name, count) in counts {
            println!("  {:<24} {:>6}", name, count);
        }
    }
}

fn cmd_tree(path: &str, json: bool) {
    let doc = open_or_exit(path);

    if json {
        let records: Vec<serde_json::Value> = doc.records.iter().map(record_json).collect();
        let out = serde_json::json!({
            "file": path,
            "version": doc.version,
            "records": records,
        });
        println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
        return;
    }

    println!("File: {} (version {})", path, doc.version);
    println!();
    for rec in &doc.records {
        print_tree(rec, 0);
    }
}

fn print_tree(rec: &Record, depth: usize) {
    let indent = "  ".repeat(depth);
    let props: Vec<String> = rec.properties.iter().map(|p| p.to_string()).collect();
    if props.is_empty() {
        println!("{}{}", indent, rec.name);
    } else {
        println!("{}{}: {}", indent, rec.name, props.join(", "));
    }
    for child in &rec.children {
        print_tree(child, depth + 1);
    }
}

fn record_json(rec: &Record) -> serde_json::Value {
    let props: Vec<serde_json::Value> = rec.properties.iter().map(property_json).collect();
    let children: Vec<serde_json::Value> = rec.children.iter().map(record_json).collect();
    serde_json::json!({
        "name": rec.name,
        "properties": props,
        "children": children,
    })
}

fn property_json(p: &Property) -> serde_json::Value {
    use serde_json::json;
    match p {
        Property::I16(v) => json!({ "type": "Y", "value": v }),
        Property::U8(v) => json!({ "type": "C", "value": v }),
        Property::I32(v) => json!({ "type": "I", "value": v }),
        Property::I64(v) => json!({ "type": "L", "value": v }),
        Property::F32(v) => json!({ "type": "F", "value": v }),
        Property::F64(v) => json!({ "type": "D", "value": v }),
        Property::String(s) => json!({ "type": "S", "value": object_name(s) }),
        Property::Raw(b) => json!({ "type": "R", "len": b.len() }),
        // Arrays can be huge; only the length is listed.
        other => json!({
            "type": other.type_code().as_char().to_string(),
            "len": other.array_len().unwrap_or(0),
        }),
    }
}

fn cmd_meshes(path: &str) {
    let doc = open_or_exit(path);
    let scene = match import_meshes(&doc) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read meshes from {}: {}", path, e);
            exit(1);
        }
    };
    debug!("{} warnings", scene.warnings.len());

    println!("File: {}", path);
    println!("Meshes: {}", scene.meshes.len());
    for mesh in &scene.meshes {
        let b = mesh.bounds();
        println!();
        println!("{}", mesh.name);
        println!("  vertices: {}  uvs: {}  facets: {}", mesh.vertices.len(), mesh.uvs.len(), mesh.num_facets());
        if !b.is_empty() {
            println!("  bounds:   {:?} .. {:?}", b.min.to_array(), b.max.to_array());
        }
        for s in &mesh.surfaces {
            let texture = s.texture.as_deref().map(|t| format!("  texture: {}", t)).unwrap_or_default();
            println!("  surface {:<20} tris: {:<6} quads: {:<6}{}", s.name, s.tris.len(), s.quads.len(), texture);
        }
        for m in &mesh.morphs {
            println!("  morph   {:<20} deltas: {}", m.name, m.deltas.len());
        }
    }

    if !scene.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &scene.warnings {
            println!("  {}", w);
        }
    }
}

fn cmd_roundtrip(input: &str, output: &str) {
    let bytes = match std::fs::read(input) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to read {}: {}", input, e);
            exit(1);
        }
    };
    let doc = match Document::load(&bytes) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to parse {}: {}", input, e);
            exit(1);
        }
    };
    let saved = match doc.save() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to encode {}: {}", input, e);
            exit(1);
        }
    };
    if let Err(e) = std::fs::write(output, &saved) {
        eprintln!("Failed to write {}: {}", output, e);
        exit(1);
    }

    println!("{} -> {} ({} bytes)", input, output, saved.len());
    if saved == bytes {
        println!("Output is byte-identical to input");
    } else {
        let first = bytes.iter().zip(&saved).position(|(a, b)| a != b);
        match first {
            Some(at) => println!("Output differs from input at byte {}", at),
            None => println!("Output differs from input in length ({} vs {})", saved.len(), bytes.len()),
        }
    }
}
