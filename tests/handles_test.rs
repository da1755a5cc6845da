use anyhow::Result;
use asset_preloader::{
    image::{ImageAsset, ImageInfo},
    script::{ReadyState, ScriptAsset},
    AddOptions, AssetStatus, LoadAsset, LoadReporter, LoaderSettings, Outcome, Preloader,
};
use crossbeam_channel::unbounded;
use image::{ImageBuffer, Rgba};
use std::{fs, path::Path, time::Duration};
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(10);

fn locator(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn fast_loader() -> Preloader {
    Preloader::new(LoaderSettings::default().with_status_interval(Duration::from_millis(20)))
}

#[test]
fn loads_images_and_scripts_from_disk() -> Result<()> {
    let dir = tempdir()?;
    let png = dir.path().join("splash.png");
    ImageBuffer::<Rgba<u8>, Vec<u8>>::new(4, 2).save(&png)?;
    let script = dir.path().join("app.js");
    fs::write(&script, "window.booted = true;")?;
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"locale": "en"}"#)?;

    let mut loader = fast_loader();
    let image = loader.add(locator(&png), AddOptions::new().with_weight(2.0), false);
    loader.add(locator(&script), AddOptions::new(), false);
    loader.add(locator(&config), AddOptions::new(), false);

    let completions = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = completions.clone();
    loader.on("completion", move |_| counter.set(counter.get() + 1), None);

    loader.start();
    assert!(loader.wait_idle(WAIT));

    for id in &["0", "1", "2"] {
        assert_eq!(loader.status_of(id), Some(AssetStatus::Loaded), "asset {}", id);
    }
    assert_eq!(completions.get(), 1);
    assert_eq!(loader.get_percentage_loaded().percent, Some(1.0));
    assert!(image.is_supported());
    Ok(())
}

#[test]
fn broken_assets_error_out() -> Result<()> {
    let dir = tempdir()?;
    let not_an_image = dir.path().join("broken.png");
    fs::write(&not_an_image, b"definitely not a png")?;
    let bad_json = dir.path().join("broken.json");
    fs::write(&bad_json, "{\"unterminated\": ")?;
    let missing = dir.path().join("missing.gif");

    let mut loader = fast_loader();
    loader.add(locator(&not_an_image), AddOptions::new(), false);
    loader.add(locator(&bad_json), AddOptions::new(), false);
    loader.add(locator(&missing), AddOptions::new(), false);
    loader.start();
    assert!(loader.wait_idle(WAIT));

    for id in &["0", "1", "2"] {
        assert_eq!(loader.status_of(id), Some(AssetStatus::Errored), "asset {}", id);
    }
    let percentage = loader.get_percentage_loaded();
    assert_eq!((percentage.loaded, percentage.total), (3, 3));
    Ok(())
}

#[test]
fn image_handle_exposes_header_info() -> Result<()> {
    let dir = tempdir()?;
    let png = dir.path().join("tile.png");
    ImageBuffer::<Rgba<u8>, Vec<u8>>::new(16, 8).save(&png)?;

    let (tx, rx) = unbounded();
    let mut image = ImageAsset::new(locator(&png));
    let id = image.id();
    image.start(LoadReporter::new(id, tx));

    let report = rx.recv_timeout(WAIT)?;
    assert_eq!((report.handle, report.outcome), (id, Outcome::Loaded));
    assert_eq!(image.info(), Some(ImageInfo { width: 16, height: 8 }));
    assert_eq!(image.check_status(), None);
    assert_eq!(image.check_status(), None);
    assert_eq!(image.on_timeout(), None);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
fn script_handle_keeps_its_source() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("boot.js");
    fs::write(&path, "console.log('hi');")?;

    let (tx, rx) = unbounded();
    let mut script = ScriptAsset::new(locator(&path));
    assert_eq!(script.ready_state(), ReadyState::Uninitialized);
    script.start(LoadReporter::new(script.id(), tx));

    let report = rx.recv_timeout(WAIT)?;
    assert_eq!(report.outcome, Outcome::Loaded);
    assert_eq!(script.ready_state(), ReadyState::Complete);
    assert_eq!(script.source().as_deref(), Some("console.log('hi');"));
    assert_eq!(script.check_status(), None);
    assert_eq!(script.on_timeout(), None);
    Ok(())
}

#[test]
fn loaded_handles_report_once_through_the_loader() -> Result<()> {
    let dir = tempdir()?;
    let png = dir.path().join("icon.png");
    ImageBuffer::<Rgba<u8>, Vec<u8>>::new(2, 2).save(&png)?;
    let script = dir.path().join("main.js");
    fs::write(&script, "main();")?;

    let mut loader = fast_loader();
    let image = loader.add(locator(&png), AddOptions::new(), false);
    let source = loader.add(locator(&script), AddOptions::new(), false);
    let transitions = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = transitions.clone();
    loader.on("progress", move |_| counter.set(counter.get() + 1), None);
    loader.start();
    assert!(loader.wait_idle(WAIT));

    assert_eq!(transitions.get(), 2);
    assert_eq!(image.borrow_mut().check_status(), None);
    assert_eq!(source.borrow_mut().check_status(), None);
    assert_eq!(image.borrow_mut().on_timeout(), None);
    Ok(())
}
