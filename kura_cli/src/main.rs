use clap::*;
use futures::executor::block_on;
use kura_asset::*;
use simple_logger::SimpleLogger;

mod demo;

use demo::{Mesh, Texture};

#[derive(ArgEnum, Clone, Copy, Debug)]
enum Kind {
    Texture,
    Mesh,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load one or more assets by url
    Load {
        #[clap(required = true)]
        urls: Vec<String>,
        #[clap(long, arg_enum, default_value = "texture")]
        kind: Kind,
    },
    /// Load every asset of a kind under a directory
    Dir {
        dir: String,
        #[clap(long, arg_enum, default_value = "texture")]
        kind: Kind,
    },
    /// Load a scene
    Scene {
        url: String,
        /// Materialize the scene again even if it is already loaded
        #[clap(long)]
        reload: bool,
    },
    /// Describe assets without loading them
    Preload {
        #[clap(required = true)]
        urls: Vec<String>,
    },
}

#[derive(Parser, Debug)]
#[clap(name = "Kura", version, about = "Drives the kura asset loader against a demo bundle")]
struct Args {
    /// Worker threads for the demo bundle, 0 completes loads on the calling thread
    #[clap(long, default_value = "0")]
    threads: usize,
    /// Urls the demo bundle refuses to load
    #[clap(long)]
    fail: Vec<String>,
    #[clap(subcommand)]
    command: Command,
}

fn watch<T: Asset + std::fmt::Debug>(request: &LoadRequest<T>) {
    request
        .on_progress()
        .subscribe(|request: &LoadRequest<T>| {
            println!("[{}/{}] {}", request.finished(), request.total(), T::NAME)
        });
    request
        .on_complete()
        .subscribe(|request: &LoadRequest<T>| match request.error() {
            Some(error) => println!("Failed: {}", error),
            None => {
                for asset in request.assets() {
                    println!("Loaded {} {:?}", asset.name(), *asset);
                }
            }
        });
}

fn run<T: Asset + std::fmt::Debug>(
    manager: &ResourceManager,
    request: LoadRequest<T>,
) -> anyhow::Result<()> {
    watch(&request);
    let result = request.start().wait();
    manager.release_request(request);

    result?;
    Ok(())
}

fn load<T: Asset + std::fmt::Debug>(
    manager: &ResourceManager,
    urls: Vec<String>,
) -> anyhow::Result<()> {
    let request = manager.setup_load_request::<T>(urls, LoadAction::Load, None)?;
    run(manager, request)
}

fn load_dir<T: Asset + std::fmt::Debug>(
    manager: &ResourceManager,
    dir: &str,
) -> anyhow::Result<()> {
    let request = manager.setup_dir_request::<T>(dir, LoadAction::Load, None)?;
    run(manager, request)?;

    let mut cached = manager.cache().urls();
    cached.sort();
    println!("Cached: {}", cached.join(", "));

    Ok(())
}

fn main() -> anyhow::Result<()> {
    if SimpleLogger::new().init().is_err() {
        println!("Failed to init logger");
    }

    let args = Args::parse();
    log::debug!("{:?}", args);

    let bundle = demo::bundle(args.threads, &args.fail)?;
    let manager = ResourceManager::new();
    manager.add_bundle(bundle);

    match args.command {
        Command::Load { urls, kind } => match kind {
            Kind::Texture => load::<Texture>(&manager, urls)?,
            Kind::Mesh => load::<Mesh>(&manager, urls)?,
        },
        Command::Dir { dir, kind } => match kind {
            Kind::Texture => load_dir::<Texture>(&manager, &dir)?,
            Kind::Mesh => load_dir::<Mesh>(&manager, &dir)?,
        },
        Command::Scene { url, reload } => {
            let options = AssetOptions {
                reload_asset: reload,
                cache_asset: false,
            };
            let scene = block_on(manager.load_scene(&url, options, None))?;
            println!(
                "Scene {} depends on {}",
                scene.name,
                scene.dependencies.join(", ")
            );
        }
        Command::Preload { urls } => {
            let items = block_on(manager.preload::<Texture>(urls, None))?;
            for item in items {
                println!("{} {} {}", item.kind, item.url, item.uuid);
            }
        }
    }

    Ok(())
}
