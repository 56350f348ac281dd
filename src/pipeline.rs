use crate::{
    error::{UnderlayError, UnderlayResult},
    raster::{PreparedImage, decode_image},
};

/// The external background-removal capability: original image bytes in,
/// foreground-only image bytes out (opaque subject, transparent elsewhere).
/// One attempt per call; retrying is the caller's decision.
pub trait BackgroundRemover {
    fn cutout(&self, image_bytes: &[u8]) -> UnderlayResult<Vec<u8>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Owns the two image resources of an editing session and their loading
/// state: `Idle -> Loading -> Ready | Failed`.
///
/// Resources are immutable once `Ready` and replaced wholesale by the next
/// successful `process`; stale handles from before a re-upload must be
/// re-fetched, not cached. A failed attempt stores nothing: resources from
/// an earlier successful run stay readable and `process` can simply be
/// retried with a fresh upload.
#[derive(Debug, Default)]
pub struct ImagePipeline {
    status: PipelineStatus,
    background: Option<PreparedImage>,
    foreground_cutout: Option<PreparedImage>,
}

impl ImagePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// Decoded original image, once `Ready`.
    pub fn background(&self) -> Option<&PreparedImage> {
        self.background.as_ref()
    }

    /// Decoded background-removal result, once `Ready`.
    pub fn foreground_cutout(&self) -> Option<&PreparedImage> {
        self.foreground_cutout.as_ref()
    }

    /// Decode the upload, run background removal, and publish both image
    /// resources atomically.
    ///
    /// Callers serialize uploads per editing session; a call while `Loading`
    /// is a contract violation and is rejected rather than raced.
    #[tracing::instrument(skip(self, remover, image_bytes), fields(len = image_bytes.len()))]
    pub fn process(
        &mut self,
        remover: &dyn BackgroundRemover,
        image_bytes: &[u8],
    ) -> UnderlayResult<()> {
        if self.status == PipelineStatus::Loading {
            return Err(UnderlayError::validation(
                "an upload is already being processed",
            ));
        }

        self.status = PipelineStatus::Loading;
        match run_removal(remover, image_bytes) {
            Ok((background, foreground_cutout)) => {
                self.background = Some(background);
                self.foreground_cutout = Some(foreground_cutout);
                self.status = PipelineStatus::Ready;
                Ok(())
            }
            Err(err) => {
                self.status = PipelineStatus::Failed;
                tracing::warn!(%err, "background removal pipeline failed");
                Err(err)
            }
        }
    }
}

fn run_removal(
    remover: &dyn BackgroundRemover,
    image_bytes: &[u8],
) -> UnderlayResult<(PreparedImage, PreparedImage)> {
    let background = decode_image(image_bytes)?;
    let cutout_bytes = remover
        .cutout(image_bytes)
        .map_err(|e| UnderlayError::processing(e.to_string()))?;
    let foreground_cutout = decode_image(&cutout_bytes)
        .map_err(|e| UnderlayError::processing(format!("cutout result undecodable: {e}")))?;
    Ok((background, foreground_cutout))
}
