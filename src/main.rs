use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use feedtree::config::Config;
use feedtree::debugging::{DebugLayer, DebugSink};
use feedtree::model::{FeedsModel, ServiceEntryPoint, COUNTS_COLUMN, TITLE_COLUMN};
use feedtree::settings::Settings;
use feedtree::standard::StandardEntryPoint;
use feedtree::util::truncate_to_width;
use feedtree::viewer::{to_plain_text, MessageViewer, ViewerEvent};
use feedtree::{Context, Position, APP_LOW_NAME};

const TITLE_WIDTH: usize = 60;

/// Get the config directory path (~/.config/feedtree/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_LOW_NAME))
}

#[derive(Parser, Debug)]
#[command(name = "feedtree", about = "Inspect a feed tree defined in a feeds file")]
struct Args {
    /// Feeds file to load (defaults to feeds.toml in the config directory)
    #[arg(long, value_name = "FILE", global = true)]
    feeds: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tree with unread/total counts
    Tree,
    /// List feeds due on the next scheduler tick
    Due {
        /// Also include feeds on the default interval
        #[arg(long)]
        now: bool,
    },
    /// Render the messages of a node (id from `tree`)
    Show {
        #[arg(value_name = "ID")]
        id: usize,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(DebugLayer::new(DebugSink::stderr()))
        .init();

    let settings = Settings::load(&config, &config_dir.join("settings.json"))
        .context("Failed to load settings")?;
    let feeds_path = args
        .feeds
        .clone()
        .or_else(|| config.feeds_file.clone())
        .unwrap_or_else(|| config_dir.join("feeds.toml"));
    let ctx = Context::new(config, settings);

    let (mut model, mut events) = FeedsModel::new(&ctx);
    let entry_points = load_entry_points(&feeds_path)?;
    model.load_activated_service_accounts(&entry_points);
    model.process_account_requests();

    let mut dropped = 0;
    while events.try_recv().is_ok() {
        dropped += 1;
    }
    tracing::debug!(events = dropped, "Model ready");

    match args.command.unwrap_or(Command::Tree) {
        Command::Tree => print_tree(&model, None, 0),
        Command::Due { now } => {
            let auto_update_now = now || ctx.config.auto_update_now;
            for feed in model.feeds_for_scheduled_update(auto_update_now) {
                if let Some(node) = model.tree().get(feed) {
                    println!("{:>5}  {}", feed.get(), truncate_to_width(node.title(), TITLE_WIDTH));
                }
            }
        }
        Command::Show { id } => show_messages(&ctx, &model, id)?,
    }
    Ok(())
}

fn load_entry_points(path: &Path) -> Result<Vec<Box<dyn ServiceEntryPoint>>> {
    let standard = StandardEntryPoint::from_file(path)
        .with_context(|| format!("Failed to load feeds file '{}'", path.display()))?;
    Ok(vec![Box::new(standard)])
}

/// Walks the tree through positions, the way a view would.
fn print_tree(model: &FeedsModel, parent: Option<&Position>, depth: usize) {
    let tree = model.tree();
    for row in 0..tree.row_count(parent) {
        let Some(title) = tree.index(row, TITLE_COLUMN, parent) else {
            continue;
        };
        let node = title.node();
        let counts = tree
            .index(row, COUNTS_COLUMN, parent)
            .map(|_| {
                format!(
                    "({}/{})",
                    tree.count_of_unread_messages(node),
                    tree.count_of_all_messages(node)
                )
            })
            .unwrap_or_default();
        let label = tree
            .get(node)
            .map(|n| truncate_to_width(n.title(), TITLE_WIDTH).into_owned())
            .unwrap_or_default();
        let kind = tree.kind(node).map(|kind| kind.label()).unwrap_or_default();

        println!(
            "{:>5}  {}{} [{}] {}",
            node.get(),
            "  ".repeat(depth),
            label,
            kind,
            counts
        );
        print_tree(model, Some(&title), depth + 1);
    }
}

fn show_messages(ctx: &Context, model: &FeedsModel, id: usize) -> Result<()> {
    let Some(item) = model
        .tree()
        .subtree(model.root())
        .into_iter()
        .find(|node| node.get() == id)
    else {
        bail!("No node with id {id}");
    };

    let (mut viewer, mut images) = MessageViewer::new(ctx);
    for message in model.messages_for_item(item) {
        viewer.set_message(&message);
        let marker = if message.is_read { " " } else { "*" };
        println!("{marker} {}", message.title);
        println!("{}", to_plain_text(viewer.lines()));
        while let Ok(ViewerEvent::ImageRequested(url)) = images.try_recv() {
            println!("  image: {url}");
        }
        println!();
    }
    tracing::debug!(%item, "Rendered messages");
    Ok(())
}
