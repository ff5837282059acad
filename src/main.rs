use log::{debug, info};
use missionsave::mission::generate::seeded_mission;
use missionsave::savegame::restore::{read_savegame_version, scan_chunks};
use missionsave::savegame::tag_name;
use missionsave::{LoadOutcome, Mission, SaveConfig, SaveContext, SaveManager};
use std::env;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

fn usage(program: &str) {
    println!("missionsave - inspect and exercise chunked mission savegames");
    println!();
    println!("Usage: {} [--config <file.toml>] <command> <savegame> [args]", program);
    println!("Commands:");
    println!("  inspect <savegame>                  list description, version and chunks");
    println!("  demo <savegame> [description] [seed] write a randomly populated mission");
    println!("  verify <savegame>                   load, re-save and compare the bytes");
}

/// Host tick count at 60 Hz.
fn host_clock() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_millis() * 60 / 1000) as u32)
        .unwrap_or(0)
}

fn open(path: &Path) -> BufReader<File> {
    match File::open(path) {
        Ok(file) => BufReader::new(file),
        Err(e) => {
            match e.kind() {
                std::io::ErrorKind::NotFound => {
                    eprintln!("Error: Savegame not found: {}", path.display())
                }
                std::io::ErrorKind::PermissionDenied => {
                    eprintln!("Error: Permission denied reading savegame: {}", path.display())
                }
                _ => eprintln!("Error: Cannot open savegame '{}': {}", path.display(), e),
            }
            process::exit(1);
        }
    }
}

fn inspect(manager: &SaveManager, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let description = manager.read_description(open(path))?;
    let version = read_savegame_version(open(path))?;
    println!("{}", path.display());
    println!("  description: {:?}", description);
    println!("  version:     0x{:04x}", version);
    println!("  chunks:");
    for header in scan_chunks(open(path))? {
        println!(
            "    '{}' at 0x{:06x}, {} bytes",
            tag_name(&header.tag),
            header.payload_start - 8,
            header.length
        );
    }

    let mut mission = Mission::new();
    let ctx = SaveContext::new(host_clock());
    match manager.load_from(&mut mission, open(path), &ctx)? {
        LoadOutcome::Resumed => {
            println!("  scenario {} (campaign {})", mission.scenario_id, mission.campaign_id);
            match mission.player() {
                Some(house) => {
                    println!("  player:      {} ({} credits)", mission.player_house, house.credits)
                }
                None => println!("  player:      {} (no house record)", mission.player_house),
            }
            println!(
                "  houses {}, units {}, structures {}, teams {}",
                mission.houses.len(),
                mission.units.len(),
                mission.structures.len(),
                mission.teams.len()
            );
        }
        LoadOutcome::RestartRequired => {
            println!(
                "  old savegame: scenario {} (campaign {}) would restart",
                mission.scenario_id, mission.campaign_id
            );
        }
    }
    Ok(())
}

fn demo(
    manager: &SaveManager,
    path: &Path,
    description: &str,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mission = seeded_mission(seed);
    debug!("Generated mission from seed {}", seed);
    let ctx = SaveContext::new(host_clock());
    if !manager.save(&mission, &ctx, path, description) {
        return Err(format!("Failed to write {}", path.display()).into());
    }
    println!(
        "Wrote {} units, {} structures, {} teams to {}",
        mission.units.len(),
        mission.structures.len(),
        mission.teams.len(),
        path.display()
    );
    Ok(())
}

fn verify(manager: &SaveManager, path: &Path) -> Result<bool, Box<dyn std::error::Error>> {
    let original = std::fs::read(path)?;
    let description = manager.read_description(Cursor::new(&original))?;

    let ctx = SaveContext::new(host_clock());
    let mut mission = Mission::new();
    let outcome = manager.load_from(&mut mission, Cursor::new(&original), &ctx)?;
    if outcome == LoadOutcome::RestartRequired {
        println!("{}: old savegame version, nothing to compare", path.display());
        return Ok(false);
    }

    let resaved = manager
        .save_to(&mission, Cursor::new(Vec::new()), &ctx, &description)?
        .into_inner();
    if resaved == original {
        println!("{}: OK ({} bytes)", path.display(), original.len());
        Ok(true)
    } else {
        let first = resaved
            .iter()
            .zip(&original)
            .position(|(a, b)| a != b)
            .unwrap_or(resaved.len().min(original.len()));
        println!(
            "{}: re-saved bytes differ from offset 0x{:x} ({} vs {} bytes)",
            path.display(),
            first,
            resaved.len(),
            original.len()
        );
        Ok(false)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut config = SaveConfig::default();
    if let Some(i) = args.iter().position(|a| a == "--config") {
        if i + 1 >= args.len() {
            eprintln!("Error: --config needs a file");
            process::exit(2);
        }
        let path = PathBuf::from(args.remove(i + 1));
        args.remove(i);
        config = SaveConfig::from_file(&path)?;
    }

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .init();

    if args.len() < 2 {
        usage(&program);
        return Ok(());
    }

    let path = PathBuf::from(&args[1]);
    let manager = SaveManager::new(config);
    info!("Savegame {}", path.display());

    match args[0].as_str() {
        "inspect" => inspect(&manager, &path)?,
        "demo" => {
            let description = args.get(2).map(String::as_str).unwrap_or("Demo mission");
            let seed = match args.get(3) {
                Some(s) => s.parse::<u64>().map_err(|_| format!("Invalid seed: {}", s))?,
                None => host_clock() as u64,
            };
            demo(&manager, &path, description, seed)?;
        }
        "verify" => {
            if !verify(&manager, &path)? {
                process::exit(1);
            }
        }
        other => {
            eprintln!("Error: Unknown command '{}'", other);
            usage(&program);
            process::exit(2);
        }
    }
    Ok(())
}
