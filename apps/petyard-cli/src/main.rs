use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use petyard_common::{Contributor, RepoRef};
use petyard_github::{
    DEFAULT_API_BASE, DataOrigin, GithubClient, LoadedContributors, demo_contributors,
    load_avatar, load_contributors,
};
use petyard_scene::{
    DebugTextRenderer, DrawSource, FrameView, MAX_PETS, OrbitCamera, Renderer, max_contributions,
    pet_scale, spawn_pets,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "petyard-cli", about = "CLI tool for petyard: fetch, inspect, simulate")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Repository owner
    #[arg(long, default_value = "anisayari")]
    owner: String,
    /// Repository name
    #[arg(long, default_value = "voyonsvoir")]
    repo: String,
    /// GitHub API base URL
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,
    /// API token, sent as a bearer token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// Skip the network and use the built-in demo contributors
    #[arg(long)]
    demo: bool,
}

impl Source {
    fn load(&self) -> LoadedContributors {
        if self.demo {
            return LoadedContributors {
                contributors: demo_contributors(),
                origin: DataOrigin::Demo,
            };
        }
        let client = GithubClient::new(self.api_base.clone()).with_token(self.token.clone());
        load_contributors(&client, &RepoRef::new(self.owner.clone(), self.repo.clone()))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List contributors with the pet scale each would get
    Fetch {
        #[command(flatten)]
        source: Source,
        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Run the pet simulation without a window and print text frames
    Simulate {
        #[command(flatten)]
        source: Source,
        /// Number of frames to simulate
        #[arg(short, long, default_value = "120")]
        frames: u32,
        /// Frame delta in milliseconds
        #[arg(long, default_value = "16")]
        dt_ms: f32,
        /// Print every Nth frame
        #[arg(long, default_value = "30")]
        every: u32,
        /// RNG seed for layout and pet motion
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Download one avatar, compose it into a circular badge and save it as PNG
    Avatar {
        /// Image URL
        url: String,
        /// Output file
        #[arg(short, long, default_value = "avatar.png")]
        out: PathBuf,
    },
}

fn print_table(contributors: &[Contributor]) {
    let max = max_contributions(contributors);
    println!("{:<4} {:<24} {:>8} {:>6}", "#", "login", "commits", "scale");
    for (i, c) in contributors.iter().enumerate() {
        let marker = if i < MAX_PETS { "" } else { " (not spawned)" };
        println!(
            "{:<4} {:<24} {:>8} {:>6.2}{marker}",
            i + 1,
            c.login,
            c.contributions,
            pet_scale(c.contributions, max)
        );
    }
}

fn simulate(contributors: &[Contributor], frames: u32, dt_ms: f32, every: u32, seed: u64) {
    let mut pets = spawn_pets(contributors, MAX_PETS, seed);
    let mut camera = OrbitCamera::default();
    let renderer = DebugTextRenderer::new();
    let every = every.max(1);
    let mut drawables = Vec::new();

    for frame_no in 1..=frames {
        camera.update();
        for pet in &mut pets {
            pet.update(dt_ms);
        }
        if frame_no % every != 0 && frame_no != frames {
            continue;
        }

        drawables.clear();
        for pet in &pets {
            pet.drawables(&mut drawables);
        }
        let labels: Vec<_> = pets.iter().map(|p| p.label()).collect();
        let frame = FrameView {
            camera: &camera,
            drawables: &drawables,
            labels: &labels,
        };
        println!("frame {frame_no}");
        print!("{}", renderer.render(&frame));
    }
    tracing::debug!(frames, pets = pets.len(), "simulation finished");
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Fetch { source, json } => {
            let loaded = source.load();
            if json {
                println!("{}", serde_json::to_string_pretty(&loaded.contributors)?);
            } else {
                println!(
                    "{} contributors ({})",
                    loaded.contributors.len(),
                    loaded.origin.as_str()
                );
                print_table(&loaded.contributors);
            }
        }
        Commands::Simulate {
            source,
            frames,
            dt_ms,
            every,
            seed,
        } => {
            let loaded = source.load();
            println!(
                "Simulating {} contributors ({}), seed={seed}, frames={frames}, dt={dt_ms}ms",
                loaded.contributors.len(),
                loaded.origin.as_str()
            );
            simulate(&loaded.contributors, frames, dt_ms, every, seed);
        }
        Commands::Avatar { url, out } => {
            let client = GithubClient::default();
            let avatar = load_avatar(&client, &url)
                .with_context(|| format!("could not load avatar from {url}"))?;
            avatar
                .image()
                .save(&out)
                .with_context(|| format!("could not write {}", out.display()))?;
            println!(
                "wrote {}x{} avatar to {}",
                avatar.width(),
                avatar.height(),
                out.display()
            );
        }
    }

    Ok(())
}
