use crate::{HandleState, LoadAsset, LoadReporter, LoadRequest, LoaderError, Outcome};
use ::image::ImageReader;
use std::{io::Cursor, path::PathBuf};

/// Extensions routed to [`ImageAsset`] by default.
pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png", "ico"];

/// Pixel size read from an image's header.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
}

/// Image-backed handle. Loading reads the file and decodes its header; the handle counts
/// as complete once the dimensions are known.
pub struct ImageAsset {
    state: HandleState,
    locator: String,
    request: Option<LoadRequest<ImageInfo>>,
}

impl ImageAsset {
    pub fn new<S: Into<String>>(locator: S) -> Self {
        Self {
            state: HandleState::new(),
            locator: locator.into(),
            request: None,
        }
    }

    /// Whether the image finished decoding, whether or not the outcome was reported yet.
    pub fn is_complete(&self) -> bool {
        self.request
            .as_ref()
            .map_or(false, LoadRequest::is_complete)
    }

    pub fn info(&self) -> Option<ImageInfo> {
        self.request.as_ref().and_then(LoadRequest::output)
    }
}

fn decode_header(locator: PathBuf, bytes: Vec<u8>) -> Result<ImageInfo, LoaderError> {
    let decode_err = |reason: String| LoaderError::Decode {
        path: locator.clone(),
        reason,
    };
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| decode_err(err.to_string()))?
        .into_dimensions()
        .map_err(|err| decode_err(err.to_string()))?;
    Ok(ImageInfo { width, height })
}

impl LoadAsset for ImageAsset {
    fn state(&self) -> &HandleState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut HandleState {
        &mut self.state
    }

    fn start(&mut self, reporter: LoadReporter) {
        let path = PathBuf::from(&self.locator);
        log::debug!("loading image {}", path.display());
        self.request = Some(LoadRequest::spawn(path.clone(), reporter, move |bytes| {
            decode_header(path, bytes)
        }));
    }

    fn check_status(&mut self) -> Option<Outcome> {
        self.request.as_ref()?.take_outcome()
    }

    /// A decoded image counts as loaded even if its outcome was never picked up.
    fn on_timeout(&mut self) -> Option<Outcome> {
        match &self.request {
            Some(request) if !request.claim_report() => None,
            _ if self.is_complete() => Some(Outcome::Loaded),
            _ => Some(Outcome::TimedOut),
        }
    }

    fn locator(&self) -> Option<&str> {
        Some(&self.locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HandleId;
    use ::image::{ImageBuffer, ImageFormat, Rgba};
    use std::time::Duration;

    #[test]
    fn reads_dimensions_from_header() {
        let mut bytes = Vec::new();
        ImageBuffer::<Rgba<u8>, Vec<u8>>::new(3, 5)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let info = decode_header(PathBuf::from("tile.png"), bytes).unwrap();
        assert_eq!(info, ImageInfo { width: 3, height: 5 });
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode_header(PathBuf::from("tile.png"), b"nope".to_vec()).unwrap_err();
        assert!(matches!(err, LoaderError::Decode { .. }));
    }

    #[test]
    fn polls_stay_silent_after_the_worker_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.png");
        ImageBuffer::<Rgba<u8>, Vec<u8>>::new(6, 4).save(&path).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut image = ImageAsset::new(path.to_string_lossy());
        image.start(LoadReporter::new(HandleId::new(), tx));
        let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();

        assert_eq!(report.outcome, Outcome::Loaded);
        assert_eq!(image.check_status(), None);
        assert_eq!(image.check_status(), None);
        assert_eq!(image.on_timeout(), None);
        assert_eq!(image.info(), Some(ImageInfo { width: 6, height: 4 }));
    }

    #[test]
    fn unstarted_image_times_out() {
        let mut image = ImageAsset::new("tile.png");
        assert!(!image.is_complete());
        assert_eq!(image.check_status(), None);
        assert_eq!(image.on_timeout(), Some(Outcome::TimedOut));
    }
}
