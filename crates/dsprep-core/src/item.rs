use std::fmt;

/// Lazily-loaded image bytes plus an optional caption, backing a
/// [`WorkItem`]. Sources hand out one of these per yielded item; the core
/// never interprets the bytes itself.
pub trait ImageSource: Send + Sync {
    /// Load the raw image bytes. Called at most once per `WorkItem`, the
    /// first time the image is accessed.
    fn load_image(&self) -> anyhow::Result<Vec<u8>>;

    /// Load the caption text, if the source carries one out-of-band (e.g.
    /// a sidecar `.txt` file). Called at most once, the first time the
    /// caption is accessed and no caption has been set directly.
    fn load_caption(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("work item is closed")]
    Closed,
    #[error("loading image: {0}")]
    Load(#[source] anyhow::Error),
}

/// The mutable image/caption carrier threaded through every stage.
///
/// A `WorkItem` is owned by at most one stage's queue or one worker at any
/// instant (enforced by Rust's move semantics — there is no `Clone`).
/// `close` is idempotent; after it runs, no further access to the image
/// bytes is permitted.
pub struct WorkItem {
    loader: Box<dyn ImageSource>,
    image: Option<Vec<u8>>,
    caption: Option<String>,
    grayscale: Option<Vec<u8>>,
    closed: bool,
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("caption", &self.caption)
            .field("closed", &self.closed)
            .field("image_loaded", &self.image.is_some())
            .finish()
    }
}

impl WorkItem {
    pub fn new(loader: Box<dyn ImageSource>) -> Self {
        Self {
            loader,
            image: None,
            caption: None,
            grayscale: None,
            closed: false,
        }
    }

    /// Convenience constructor for a pre-decoded image with no lazy source.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        struct Eager(Vec<u8>);
        impl ImageSource for Eager {
            fn load_image(&self) -> anyhow::Result<Vec<u8>> {
                Ok(self.0.clone())
            }
        }
        Self::new(Box::new(Eager(bytes)))
    }

    fn ensure_open(&self) -> Result<(), ItemError> {
        if self.closed {
            Err(ItemError::Closed)
        } else {
            Ok(())
        }
    }

    /// The image bytes, loading them on first access.
    pub fn image(&mut self) -> Result<&[u8], ItemError> {
        self.ensure_open()?;
        if self.image.is_none() {
            let bytes = self.loader.load_image().map_err(ItemError::Load)?;
            self.image = Some(bytes);
        }
        Ok(self.image.as_deref().unwrap())
    }

    /// Replace the image bytes (e.g. after a resize task). Invalidates any
    /// cached derived view.
    pub fn set_image(&mut self, bytes: Vec<u8>) -> Result<(), ItemError> {
        self.ensure_open()?;
        self.image = Some(bytes);
        self.grayscale = None;
        Ok(())
    }

    /// The caption text, loading it from the source on first access if it
    /// hasn't been set directly. Never returns an error for "no caption" —
    /// that collapses to the empty string, matching the original source's
    /// `caption_text` contract.
    pub fn caption(&mut self) -> Result<&str, ItemError> {
        self.ensure_open()?;
        if self.caption.is_none() {
            let loaded = self.loader.load_caption().map_err(ItemError::Load)?;
            self.caption = Some(loaded.unwrap_or_default());
        }
        Ok(self.caption.as_deref().unwrap())
    }

    pub fn set_caption(&mut self, caption: impl Into<String>) -> Result<(), ItemError> {
        self.ensure_open()?;
        self.caption = Some(caption.into());
        Ok(())
    }

    /// A grayscale derived view of the current image, computed at most
    /// once per mutation of the base image. Placeholder luminance
    /// conversion (per-pixel average over RGB triplets) — real codec work
    /// is a task implementer's concern, not the core's.
    pub fn grayscale(&mut self) -> Result<&[u8], ItemError> {
        self.ensure_open()?;
        if self.grayscale.is_none() {
            let image = self.image()?;
            let gray = image
                .chunks_exact(3)
                .map(|rgb| ((rgb[0] as u32 + rgb[1] as u32 + rgb[2] as u32) / 3) as u8)
                .collect();
            self.grayscale = Some(gray);
        }
        Ok(self.grayscale.as_deref().unwrap())
    }

    /// Close the item. Idempotent: subsequent calls are no-ops. After this,
    /// `image`/`caption`/`grayscale` return [`ItemError::Closed`].
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.image = None;
        self.grayscale = None;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
