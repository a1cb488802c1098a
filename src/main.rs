//! Parallel Life CLI - Run a session from JSON configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use parallel_life::{
    schema::{RuleSet, SimulationConfig},
    session::Session,
    snapshot::DirStorage,
};

/// Background the frame is blended onto when written as PPM.
const BACKGROUND: [u8; 3] = [0x10, 0x12, 0x16];

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [ticks]", args[0]);
        eprintln!();
        eprintln!("Run a parallel Game of Life session from JSON configuration.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to simulation configuration file");
        eprintln!("  ticks        Number of generations to run (default: 100)");
        eprintln!();
        eprintln!("The session resumes from <config>.life next to the config file");
        eprintln!("when present, and is saved there on exit. The final frame is");
        eprintln!("written to <config>.ppm.");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let ticks: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let storage_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut storage = DirStorage::open(storage_dir).unwrap_or_else(|e| {
        eprintln!("Error opening snapshot directory: {}", e);
        std::process::exit(1);
    });
    let key = storage_key(&config_path);

    // Resume or start fresh
    let mut session: Session = Session::restore(&storage, &key, config).unwrap_or_else(|e| {
        eprintln!("Error starting session: {}", e);
        std::process::exit(1);
    });

    let config = session.config().clone();
    println!("Parallel Life");
    println!("=============");
    println!("Grid: {}x{}", config.width, config.height);
    println!("Workers: {}", session.worker_count());
    println!("Rules: {}", config.rules);
    println!("Frequency: {} ticks/s", config.frequency);
    println!("Ticks: {}", ticks);
    println!();
    println!("Initial state:");
    println!("  Alive cells: {}", session.alive_count());
    println!();

    // Run the tick loop in chunks so progress can be reported
    println!("Running simulation...");
    let start = Instant::now();
    let chunk = (ticks / 10).max(1);
    let mut done = 0;

    while done < ticks {
        let n = chunk.min(ticks - done);
        if let Err(e) = session.run_ticks(n) {
            eprintln!("Session failed: {}", e);
            std::process::exit(1);
        }
        done += n;

        let elapsed = start.elapsed().as_secs_f32();
        println!(
            "  Generation {}: alive={}, {:.1} ticks/s",
            session.generation(),
            session.alive_count(),
            done as f32 / elapsed
        );
    }

    let elapsed = start.elapsed();
    let errors = session.take_errors();

    println!();
    println!("Final state:");
    println!("  Generation: {}", session.generation());
    println!("  Alive cells: {}", session.alive_count());
    if !errors.is_empty() {
        println!("  Worker errors: {}", errors.len());
    }
    println!(
        "Time: {:.2}s ({:.1} ticks/s)",
        elapsed.as_secs_f32(),
        ticks as f32 / elapsed.as_secs_f32()
    );

    if let Err(e) = session.save(&mut storage, &key) {
        eprintln!("Error saving snapshot: {}", e);
    }

    let frame = session.into_frame();
    let frame_path = config_path.with_extension("ppm");
    let written = File::create(&frame_path).and_then(|file| {
        let mut writer = BufWriter::new(file);
        frame.write_ppm(&mut writer, BACKGROUND)
    });
    match written {
        Ok(()) => println!("Frame: {}", frame_path.display()),
        Err(e) => eprintln!("Error writing frame: {}", e),
    }
}

/// Snapshot key derived from the config file name.
fn storage_key(config_path: &Path) -> String {
    let key: String = config_path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if key.is_empty() {
        "session".to_string()
    } else {
        key
    }
}

fn print_example_config() {
    let config = SimulationConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
    println!();
    println!("Rule presets:");
    for name in RuleSet::preset_names() {
        if let Some(rules) = RuleSet::preset(name) {
            println!("  {:<20} {}", name, rules);
        }
    }
}
