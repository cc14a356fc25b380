//! Per-run scratch artifact management.
//!
//! A [`Workspace`] owns every intermediate file of a single pipeline run.
//! Stage artifacts are named `step<N>_<output name>` and live in the shared
//! scratch directory; because the output name is random, concurrent runs
//! never collide. All registered files are deleted when the workspace is
//! dropped, whether the run succeeded, failed, or unwound.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Scratch files owned by one pipeline run.
///
/// # Example
///
/// ```no_run
/// use vs_av::Workspace;
/// use std::path::Path;
///
/// let mut ws = Workspace::new(Path::new("temp"), Path::new("in.mp4"), "vid_abc_123456.mp4").unwrap();
/// let step = ws.next_artifact();
/// // ... write the stage result to `step` ...
/// ws.advance(step);
/// ws.finalize(Path::new("output")).unwrap();
/// ```
#[derive(Debug)]
pub struct Workspace {
    scratch_dir: PathBuf,
    input_path: PathBuf,
    output_name: String,
    current: PathBuf,
    step: usize,
    owned: Mutex<Vec<PathBuf>>,
}

impl Workspace {
    /// Create a workspace for processing `input` into a file called
    /// `output_name`. The scratch directory is created if missing.
    pub fn new(scratch_dir: &Path, input: &Path, output_name: &str) -> vs_core::Result<Self> {
        std::fs::create_dir_all(scratch_dir)?;
        Ok(Self {
            scratch_dir: scratch_dir.to_path_buf(),
            input_path: input.to_path_buf(),
            output_name: output_name.to_string(),
            current: input.to_path_buf(),
            step: 0,
            owned: Mutex::new(Vec::new()),
        })
    }

    /// The original input file path.
    pub fn input(&self) -> &Path {
        &self.input_path
    }

    /// Name the final artifact will carry in the output directory.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// The newest artifact, or the input when no stage has completed yet.
    pub fn current(&self) -> &Path {
        &self.current
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Allocate the artifact path for the next stage.
    pub fn next_artifact(&mut self) -> PathBuf {
        self.step += 1;
        let path = self
            .scratch_dir
            .join(format!("step{}_{}", self.step, self.output_name));
        self.register(path.clone());
        path
    }

    /// Make `artifact` the input of the next stage.
    pub fn advance(&mut self, artifact: PathBuf) {
        self.current = artifact;
    }

    /// Allocate an auxiliary scratch file (`<stem>_<output name>` with the
    /// given extension), deleted together with the stage artifacts.
    pub fn scratch_file(&self, stem: &str, extension: &str) -> PathBuf {
        let base = Path::new(&self.output_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.output_name.clone());
        let path = self
            .scratch_dir
            .join(format!("{stem}_{base}.{extension}"));
        self.register(path.clone());
        path
    }

    fn register(&self, path: PathBuf) {
        match self.owned.lock() {
            Ok(mut owned) => owned.push(path),
            Err(poisoned) => poisoned.into_inner().push(path),
        }
    }

    /// Copy the newest artifact to `<output_dir>/<output name>`.
    ///
    /// The artifact is copied rather than moved; scratch files are removed
    /// when the workspace drops.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact is missing or the copy fails.
    pub fn finalize(self, output_dir: &Path) -> vs_core::Result<PathBuf> {
        if !self.current.exists() {
            return Err(vs_core::Error::Internal(format!(
                "artifact does not exist: {}",
                self.current.display()
            )));
        }

        std::fs::create_dir_all(output_dir)?;
        let dest = output_dir.join(&self.output_name);
        std::fs::copy(&self.current, &dest)?;
        Ok(dest)
    }

    /// Delete every scratch file owned by this run. Missing files are
    /// ignored; other failures are logged.
    pub fn purge(&self) {
        let owned = match self.owned.lock() {
            Ok(mut owned) => std::mem::take(&mut *owned),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for path in owned {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {e}", path.display()),
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.purge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("holiday.mp4");
        fs::write(&input, b"original").unwrap();
        (dir, input)
    }

    #[test]
    fn artifacts_are_numbered_and_namespaced() {
        let (dir, input) = setup();
        let scratch = dir.path().join("temp");
        let mut ws = Workspace::new(&scratch, &input, "vid_abc_123456.mp4").unwrap();

        assert_eq!(ws.current(), input.as_path());
        assert_eq!(ws.next_artifact(), scratch.join("step1_vid_abc_123456.mp4"));
        assert_eq!(ws.next_artifact(), scratch.join("step2_vid_abc_123456.mp4"));
        assert_eq!(
            ws.scratch_file("overlay", "png"),
            scratch.join("overlay_vid_abc_123456.png")
        );
    }

    #[test]
    fn finalize_copies_and_purges() {
        let (dir, input) = setup();
        let scratch = dir.path().join("temp");
        let out_dir = dir.path().join("output");
        let mut ws = Workspace::new(&scratch, &input, "vid_abc_123456.mp4").unwrap();

        let step = ws.next_artifact();
        fs::write(&step, b"processed").unwrap();
        ws.advance(step.clone());

        let dest = ws.finalize(&out_dir).unwrap();
        assert_eq!(dest, out_dir.join("vid_abc_123456.mp4"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "processed");
        assert!(!step.exists());
        assert!(input.exists(), "input must never be deleted");
    }

    #[test]
    fn finalize_without_stages_copies_input() {
        let (dir, input) = setup();
        let ws = Workspace::new(&dir.path().join("temp"), &input, "vid_x_000001.mp4").unwrap();
        let dest = ws.finalize(&dir.path().join("output")).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), fs::read(&input).unwrap());
    }

    #[test]
    fn drop_purges_after_failure() {
        let (dir, input) = setup();
        let scratch = dir.path().join("temp");
        let (a, b, png) = {
            let mut ws = Workspace::new(&scratch, &input, "vid_abc_123456.mp4").unwrap();
            let a = ws.next_artifact();
            let b = ws.next_artifact();
            let png = ws.scratch_file("overlay", "png");
            fs::write(&a, b"1").unwrap();
            fs::write(&b, b"2").unwrap();
            fs::write(&png, b"3").unwrap();
            (a, b, png)
        };
        assert!(!a.exists() && !b.exists() && !png.exists());
        assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
    }

    #[test]
    fn finalize_fails_when_artifact_missing() {
        let (dir, input) = setup();
        let mut ws = Workspace::new(&dir.path().join("temp"), &input, "vid_abc_123456.mp4").unwrap();
        let step = ws.next_artifact();
        ws.advance(step);
        assert!(ws.finalize(&dir.path().join("output")).is_err());
    }
}
