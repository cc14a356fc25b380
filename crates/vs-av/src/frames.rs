//! Raw RGB frame pipes to and from ffmpeg.
//!
//! [`FrameReader`] decodes a video into packed `rgb24` frames on ffmpeg's
//! stdout; [`FrameWriter`] feeds frames to an encoder on stdin. The YUV↔RGB
//! conversion on both ends uses the source's color matrix and range so a
//! decode/encode round trip does not shift colors.
//!
//! Decoded frames are in display orientation: ffmpeg applies any rotation
//! side data while decoding, so a reader's [`FrameGeometry`] must come from
//! [`VideoStream::display_size`](crate::probe::VideoStream::display_size),
//! not the coded size. Frames are passed through one-for-one, without the
//! duplication or dropping a constant-rate output would impose on a
//! variable-frame-rate source.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use image::RgbImage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::command::{tail_lines, terminate};
use crate::probe::ColorProperties;
use crate::tools::ToolRegistry;

/// Dimensions of the frames flowing through a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bytes in one packed RGB frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Bytes held by `batch` frames at once.
    pub fn batch_bytes(&self, batch: usize) -> u64 {
        self.frame_len() as u64 * batch as u64
    }
}

/// Which part of the input a [`FrameReader`] decodes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum DecodeWindow {
    /// Every frame.
    #[default]
    All,
    /// Only the first `n` frames.
    First(u64),
    /// Frames within the last `secs` seconds.
    Tail(f64),
}

fn spawn_piped(program: &Path, args: &[String], stdin: Stdio, stdout: Stdio) -> vs_core::Result<Child> {
    tracing::debug!("exec: {} {}", program.display(), args.join(" "));
    Command::new(program)
        .args(args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| vs_core::Error::tool("ffmpeg", format!("failed to spawn: {e}")))
}

fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    child.stderr.take().map(|mut stderr| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut buf).await {
                tracing::debug!("ffmpeg stderr read failed: {e}");
            }
            String::from_utf8_lossy(&buf).to_string()
        })
    })
}

async fn finish_child(
    mut child: Child,
    stderr: Option<JoinHandle<String>>,
    timeout: Duration,
    grace: Duration,
) -> vs_core::Result<()> {
    let waited = tokio::time::timeout(timeout, child.wait()).await;

    match waited {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(status)) => {
            let stderr = match stderr {
                Some(h) => h.await.unwrap_or_default(),
                None => String::new(),
            };
            Err(vs_core::Error::tool(
                "ffmpeg",
                format!("exited with status {status}: {}", tail_lines(&stderr, 20)),
            ))
        }
        Ok(Err(e)) => Err(vs_core::Error::tool(
            "ffmpeg",
            format!("I/O error waiting for process: {e}"),
        )),
        Err(_) => {
            terminate(&mut child, grace).await;
            Err(vs_core::Error::ToolTimeout {
                tool: "ffmpeg".into(),
                after: timeout,
            })
        }
    }
}

/// ffmpeg arguments decoding `input` to packed RGB on stdout.
pub fn decode_args(
    input: &Path,
    color: Option<&ColorProperties>,
    window: DecodeWindow,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-v".into(), "error".into(), "-nostdin".into()];
    if let DecodeWindow::Tail(secs) = window {
        args.extend(["-sseof".into(), format!("-{secs}")]);
    }
    args.extend(["-i".into(), input.to_string_lossy().to_string()]);
    if let DecodeWindow::First(n) = window {
        args.extend(["-frames:v".into(), n.to_string()]);
    }
    if let Some(color) = color {
        args.extend([
            "-vf".into(),
            format!(
                "scale=in_color_matrix={}:in_range={}",
                color.swscale_matrix(),
                color.swscale_range()
            ),
        ]);
    }
    args.extend(
        ["-fps_mode", "passthrough", "-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
            .map(String::from),
    );
    args
}

/// ffmpeg arguments encoding packed RGB from stdin into `output`.
pub fn encode_args(output: &Path, settings: &EncodeSettings) -> Vec<String> {
    let g = settings.geometry;
    let color = &settings.color;

    let mut args: Vec<String> = [
        "-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24",
    ]
    .map(String::from)
    .to_vec();
    args.extend([
        "-s".into(),
        format!("{}x{}", g.width, g.height),
        "-r".into(),
        format!("{}", settings.fps),
        "-i".into(),
        "-".into(),
        "-vf".into(),
        format!(
            "scale=out_color_matrix={}:out_range={}",
            color.swscale_matrix(),
            color.swscale_range()
        ),
        "-c:v".into(),
        "libx264".into(),
        "-crf".into(),
        settings.crf.to_string(),
        "-preset".into(),
        "medium".into(),
    ]);
    args.extend(color.encoder_args());
    args.extend(["-an".into(), output.to_string_lossy().to_string()]);
    args
}

/// Streams decoded RGB frames out of ffmpeg.
#[derive(Debug)]
pub struct FrameReader {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    geometry: FrameGeometry,
}

impl FrameReader {
    /// Start decoding `input`.
    ///
    /// With `color` set, the YUV→RGB conversion uses that matrix and range;
    /// otherwise ffmpeg's defaults apply.
    pub fn spawn(
        tools: &ToolRegistry,
        input: &Path,
        geometry: FrameGeometry,
        color: Option<&ColorProperties>,
        window: DecodeWindow,
    ) -> vs_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;

        let args = decode_args(input, color, window);

        let mut child = spawn_piped(&ffmpeg.path, &args, Stdio::null(), Stdio::piped())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| vs_core::Error::Internal("decoder stdout not captured".into()))?;
        let stderr = drain_stderr(&mut child);

        Ok(Self {
            child,
            stdout,
            stderr,
            geometry,
        })
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    /// Read the next frame, or `None` at end of stream. A trailing partial
    /// frame is discarded.
    pub async fn read_frame(&mut self) -> vs_core::Result<Option<RgbImage>> {
        let mut buf = vec![0u8; self.geometry.frame_len()];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.stdout.read(&mut buf[filled..]).await?;
            if n == 0 {
                if filled > 0 {
                    tracing::debug!("Discarding partial trailing frame ({filled} bytes)");
                }
                return Ok(None);
            }
            filled += n;
        }
        Ok(RgbImage::from_raw(self.geometry.width, self.geometry.height, buf))
    }

    /// Read up to `max` frames.
    pub async fn read_batch(&mut self, max: usize) -> vs_core::Result<Vec<RgbImage>> {
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            match self.read_frame().await? {
                Some(frame) => batch.push(frame),
                None => break,
            }
        }
        Ok(batch)
    }

    /// Wait for the decoder to exit and check its status.
    pub async fn finish(self, timeout: Duration, grace: Duration) -> vs_core::Result<()> {
        drop(self.stdout);
        finish_child(self.child, self.stderr, timeout, grace).await
    }

    /// Stop the decoder early (SIGTERM, then kill after `grace`).
    pub async fn abort(mut self, grace: Duration) {
        terminate(&mut self.child, grace).await;
    }
}

/// Parameters of the encoder fed by a [`FrameWriter`].
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub geometry: FrameGeometry,
    /// Rate stamped on the frames. Use the source's average rate so the
    /// duration survives when the source is variable-frame-rate.
    pub fps: f64,
    pub crf: u8,
    pub color: ColorProperties,
}

/// Feeds RGB frames to an ffmpeg `libx264` encoder.
#[derive(Debug)]
pub struct FrameWriter {
    child: Child,
    stdin: ChildStdin,
    stderr: Option<JoinHandle<String>>,
    geometry: FrameGeometry,
}

impl FrameWriter {
    /// Start an encoder writing a video-only file to `output`.
    pub fn spawn(
        tools: &ToolRegistry,
        output: &Path,
        settings: &EncodeSettings,
    ) -> vs_core::Result<Self> {
        let ffmpeg = tools.require("ffmpeg")?;
        let g = settings.geometry;
        let args = encode_args(output, settings);

        let mut child = spawn_piped(&ffmpeg.path, &args, Stdio::piped(), Stdio::null())?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| vs_core::Error::Internal("encoder stdin not captured".into()))?;
        let stderr = drain_stderr(&mut child);

        Ok(Self {
            child,
            stdin,
            stderr,
            geometry: g,
        })
    }

    /// Write one frame. Frames must match the writer's geometry.
    pub async fn write_frame(&mut self, frame: &RgbImage) -> vs_core::Result<()> {
        if frame.dimensions() != (self.geometry.width, self.geometry.height) {
            return Err(vs_core::Error::Internal(format!(
                "frame is {:?}, encoder expects {}x{}",
                frame.dimensions(),
                self.geometry.width,
                self.geometry.height
            )));
        }
        self.stdin.write_all(frame.as_raw()).await?;
        Ok(())
    }

    /// Close stdin and wait for the encoder to flush and exit.
    ///
    /// An encoder that already died reports its own exit status here, which
    /// carries better diagnostics than the broken pipe seen by the writer.
    pub async fn finish(mut self, timeout: Duration, grace: Duration) -> vs_core::Result<()> {
        if let Err(e) = self.stdin.shutdown().await {
            tracing::debug!("encoder stdin already closed: {e}");
        }
        drop(self.stdin);
        finish_child(self.child, self.stderr, timeout, grace).await
    }

    /// Stop the encoder early (SIGTERM, then kill after `grace`).
    pub async fn abort(mut self, grace: Duration) {
        terminate(&mut self.child, grace).await;
    }
}
