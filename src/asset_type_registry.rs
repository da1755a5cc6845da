use crate::{
    image::{ImageAsset, IMAGE_EXTENSIONS},
    script::{ScriptAsset, SCRIPT_EXTENSIONS},
    Handle, LoadAsset, Unsupported,
};
use std::collections::HashMap;

/// Builds a handle for a locator.
pub type AssetConstructor = fn(&str) -> Box<dyn LoadAsset>;

pub fn image_constructor(locator: &str) -> Box<dyn LoadAsset> {
    Box::new(ImageAsset::new(locator))
}

pub fn script_constructor(locator: &str) -> Box<dyn LoadAsset> {
    Box::new(ScriptAsset::new(locator))
}

/// Maps a locator's trailing extension to the constructor for its handle variant.
///
/// Matching is a case-sensitive literal comparison. Extensions without a registration
/// produce an [`Unsupported`] placeholder.
pub struct AssetTypeRegistry {
    registrations: HashMap<String, AssetConstructor>,
}

impl AssetTypeRegistry {
    /// An empty registry; every locator resolves to [`Unsupported`].
    pub fn empty() -> Self {
        Self {
            registrations: HashMap::new(),
        }
    }

    pub fn register<S: Into<String>>(&mut self, extension: S, construct: AssetConstructor) {
        let extension = extension.into();
        if self.registrations.insert(extension.clone(), construct).is_some() {
            log::debug!("replaced asset constructor for .{}", extension);
        }
    }

    pub fn is_registered(&self, extension: &str) -> bool {
        self.registrations.contains_key(extension)
    }

    pub fn create(&self, locator: &str) -> Handle {
        let extension = extension_of(locator);
        match self.registrations.get(extension) {
            Some(construct) => Handle::from_boxed(construct(locator)),
            None => {
                log::warn!("{} is not a supported file type", locator);
                Handle::new(Unsupported::new(locator))
            }
        }
    }
}

impl Default for AssetTypeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for extension in IMAGE_EXTENSIONS {
            registry.register(*extension, image_constructor);
        }
        for extension in SCRIPT_EXTENSIONS {
            registry.register(*extension, script_constructor);
        }
        registry
    }
}

/// Text after the last `.`; a locator without a dot is its own extension.
pub fn extension_of(locator: &str) -> &str {
    locator.rsplit('.').next().unwrap_or(locator)
}
