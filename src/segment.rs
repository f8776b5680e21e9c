//! Background removal collaborators.
//!
//! Stage 1 hands every decoded photo to a [`Segmenter`] and expects back an
//! image of the same scene whose alpha channel isolates the foreground subject.
//! The crate does not segment anything itself: [`CommandSegmenter`] shells out
//! to an external tool (`rembg` by default), [`AlphaPassthrough`] trusts the
//! alpha the source already has.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use image::{ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// Polling interval while waiting on an external segmenter.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Something that can cut a subject out of its background.
pub trait Segmenter: Send + Sync {
    /// Return an alpha-masked copy of `image` isolating the foreground.
    ///
    /// # Errors
    ///
    /// Any failure is reported as this image's Stage 1 failure.
    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage>;
}

impl<F> Segmenter for F
where
    F: Fn(&RgbaImage) -> Result<RgbaImage> + Send + Sync,
{
    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage> {
        self(image)
    }
}

/// Keeps the alpha channel the source already carries.
///
/// Useful for inputs that were cut out upstream; opaque sources stay opaque,
/// so their bounding box is the whole frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaPassthrough;

impl Segmenter for AlphaPassthrough {
    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage> {
        Ok(image.clone())
    }
}

/// Runs an external program as `<program> <args...> <input.png> <output.png>`.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandSegmenter {
    /// Segmenter invoking `program` with no extra arguments and no deadline.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// The `rembg i <in> <out>` command line.
    #[must_use]
    pub fn rembg() -> Self {
        Self::new("rembg").with_args(["i"])
    }

    /// Arguments placed before the input and output paths.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Kill the child process if it has not exited after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Program name as configured.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::Segmentation(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    self.program
                ))
            })?;

        // a full stderr pipe would block the child
        let stderr = child.stderr.take();
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let status = match self.wait(&mut child) {
            Ok(status) => status,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return Err(e);
            }
        };
        let stderr = reader.join().unwrap_or_default();

        if !status.success() {
            return Err(Error::Segmentation(format!(
                "'{}' exited with {status}: {}",
                self.program,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn wait(&self, child: &mut std::process::Child) -> Result<ExitStatus> {
        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                return Err(Error::SegmentationTimeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Segmenter for CommandSegmenter {
    fn segment(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let scratch = ScratchDir::create()?;
        let input = scratch.path().join("input.png");
        let output = scratch.path().join("output.png");

        image.save_with_format(&input, ImageFormat::Png)?;
        self.run(&input, &output)?;

        if !output.is_file() {
            return Err(Error::Segmentation(format!(
                "'{}' did not write {}",
                self.program,
                output.display()
            )));
        }
        Ok(image::open(&output)?.to_rgba8())
    }
}

/// Private directory under the system temp dir, removed on drop.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn create() -> Result<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "watchface-normalize-{}-{seq}",
            std::process::id()
        ));
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
