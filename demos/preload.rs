use anyhow::Result;
use asset_preloader::prelude::*;
use std::{env, time::Duration};

// Usage: cargo run --example preload -- [settings.json] <asset>...
fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1).peekable();
    let settings = match args.peek() {
        Some(first) if first.ends_with("settings.json") => {
            let path = args.next().unwrap_or_default();
            LoaderSettings::load(path)?
        }
        _ => LoaderSettings::default(),
    };

    let mut loader = Preloader::new(settings);
    for (index, locator) in args.enumerate() {
        let tags = if index == 0 { "first" } else { "rest" };
        loader.add(locator, AddOptions::new().with_tags(tags), false);
    }

    loader.on(
        "progress",
        |progress: &Progress| {
            println!(
                "{} {:?} ({}/{})",
                progress.id, progress.status, progress.completed_count, progress.total_count
            )
        },
        None,
    );
    loader.on("completion", |_: &Progress| println!("all done"), None);

    loader.start_with_tags("first");
    loader.start();
    if !loader.wait_idle(Duration::from_secs(30)) {
        log::warn!("gave up waiting on the queue");
    }

    let percentage = loader.get_percentage_loaded();
    match percentage.percent {
        Some(percent) => println!(
            "{:.0}% loaded ({}/{})",
            percent * 100.0,
            percentage.loaded,
            percentage.total
        ),
        None => println!("nothing queued"),
    }
    Ok(())
}
