use clap::Parser;
use gem_board::config::{ConfigManager, FileContentConfigProvider, Validate};
use gem_board::logger;
use gem_board::{log, BoardConfig, Direction, GemBoard, Position, SessionRng};

#[derive(Parser)]
#[command(name = "gem_board_runner")]
struct Args {
    /// YAML board config; defaults are used when the file does not exist.
    #[arg(long, default_value = "gem_board.yaml")]
    config: String,

    /// Overrides the seed from the config file.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 20)]
    moves: u32,

    /// Writes the effective config back to `--config`.
    #[arg(long)]
    save_config: bool,

    #[arg(long)]
    use_log_prefix: bool,
}

fn load_config(args: &Args) -> Result<BoardConfig, String> {
    let manager: ConfigManager<FileContentConfigProvider, BoardConfig> =
        ConfigManager::from_yaml_file(&args.config);
    let mut config = manager.get_config()?;
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    config.validate()?;

    if args.save_config {
        manager.set_config(&config)?;
        log!("Saved config to {}", args.config);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let prefix = if args.use_log_prefix {
        Some("Runner".to_string())
    } else {
        None
    };
    logger::init_logger(prefix);

    let config = load_config(&args)?;
    let board = GemBoard::new(&config, config.settle())?;
    board.configure(config.dimension)?;
    let initial = board.tick().await;
    if initial > 0 {
        log!("Initial fill settled, {} tokens cleared", initial);
    }

    let mut rng = SessionRng::new(board.seed().wrapping_add(1));
    let dimension = board.dimension();
    let mut total_cleared = 0;
    let mut accepted = 0;

    for turn in 1..=args.moves {
        let pos = Position::new(
            rng.random_range(0..dimension),
            rng.random_range(0..dimension),
        );
        let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
        let Some(token) = board.get(pos) else {
            log!("Move {}: no token at {}", turn, pos);
            continue;
        };

        if !board.move_token(token, direction) {
            log!("Move {}: {} {} rejected", turn, pos, direction);
            continue;
        }
        accepted += 1;

        let cleared = board.tick().await;
        total_cleared += cleared;
        log!("Move {}: {} {} cleared {}", turn, pos, direction, cleared);
    }

    log!(
        "Played {} of {} moves, {} tokens cleared\n{}",
        accepted,
        args.moves,
        total_cleared,
        board.snapshot()
    );

    if let Some(drain) = board.destroy() {
        let drained = drain.await;
        log!("Board destroyed, {} tokens drained", drained);
    }

    Ok(())
}
