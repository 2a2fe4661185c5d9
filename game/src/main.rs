mod session;

use anyhow::Context;
use clap::{Parser, Subcommand};
use learn_game::config::Config;
use learn_game::q_table::{q_table_from_disk, q_table_to_disk};
use learn_game::worker::spawn_training;
use learn_game::Game;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "game", about = "Tic-tac-toe against a Q-learning player")]
struct Cli {
    /// JSON configuration file, defaults are used when it does not exist.
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(long, global = true)]
    episodes: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train against the expert player and report greedy results.
    Train {
        /// Directory receiving qtable-<date>.json and .pickle.
        #[arg(long)]
        save: Option<PathBuf>,

        #[arg(long, default_value_t = 1_000)]
        evaluate: usize,
    },
    /// Play against the computer on the terminal.
    Play {
        /// Saved table (.json or .pickle); trains a fresh one when missing.
        #[arg(long)]
        load: Option<PathBuf>,

        #[arg(long, default_value = "John")]
        name: String,
    },
}

fn train(config: Config, save: Option<PathBuf>, evaluate: usize) -> anyhow::Result<()> {
    let mut game = Game::new(config);
    let summary = game.learn_q_table()?;
    println!("Training: {}", summary);
    let greedy = game.evaluate(evaluate)?;
    println!("Greedy play against the expert: {}", greedy);
    if let Some(dir) = save {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        let (json, pickle) = q_table_to_disk(&dir, game.learner.q_table())?;
        println!("Saved {} and {}", json.display(), pickle.display());
    }
    Ok(())
}

fn trained_in_background(config: Config) -> anyhow::Result<Game> {
    let mut handle = spawn_training(Game::new(config));
    print!("Training the computer player");
    loop {
        if let Some(result) = handle.try_finish() {
            println!();
            let (game, summary) = result?;
            println!("Training: {}", summary);
            return Ok(game);
        }
        print!(".");
        io::stdout().flush()?;
        thread::sleep(Duration::from_millis(250));
    }
}

fn play(config: Config, load: Option<PathBuf>, name: &str) -> anyhow::Result<()> {
    let game = match load {
        Some(path) => {
            let q = q_table_from_disk(&path)
                .with_context(|| format!("loading Q-table from {}", path.display()))?;
            println!("QTable's length is: {}", q.len());
            Game::new(config).with_q_table(q)
        }
        None => trained_in_background(config)?,
    };
    session::play_game_human_computer_player(game, name)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(episodes) = cli.episodes {
        config.episodes = episodes;
    }
    config.validate()?;
    log::debug!("{:?}", config);

    match cli.command {
        Command::Train { save, evaluate } => train(config, save, evaluate),
        Command::Play { load, name } => play(config, load, &name),
    }
}
