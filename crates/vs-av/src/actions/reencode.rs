//! Full H.264/AAC re-encode with forced color tags.

use std::path::Path;

use super::{path_arg, Budget};
use crate::probe::ColorProperties;
use crate::tools::{ToolRegistry, VideoEncoder};

/// Approximate 1080p bitrates (kbit/s) for CRF values, used when the encoder
/// only supports bitrate targeting.
const CRF_BITRATE_KBPS: &[(u8, u32)] = &[
    (18, 8000),
    (20, 6000),
    (23, 4000),
    (27, 2500),
    (30, 1500),
    (32, 1000),
    (35, 800),
];

const FALLBACK_BITRATE_KBPS: u32 = 2500;

/// Bitrate for a CRF value: the entry of the largest tabulated CRF not above
/// `crf`.
pub fn crf_to_bitrate_kbps(crf: u8) -> u32 {
    CRF_BITRATE_KBPS
        .iter()
        .rev()
        .find(|(key, _)| *key <= crf)
        .map(|(_, kbps)| *kbps)
        .unwrap_or(FALLBACK_BITRATE_KBPS)
}

/// Inputs to [`re_encode`].
#[derive(Debug, Clone)]
pub struct ReEncodeParams<'a> {
    pub crf: u8,
    pub encoder: VideoEncoder,
    pub color: &'a ColorProperties,
    /// Source duration in seconds; progress is reported only when known.
    pub duration: Option<f64>,
}

pub fn re_encode_args(input: &Path, output: &Path, params: &ReEncodeParams<'_>) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-progress", "pipe:2", "-nostats", "-i"]
        .map(String::from)
        .to_vec();
    args.push(path_arg(input));
    args.extend(["-c:v".into(), params.encoder.codec_name().into()]);

    match params.encoder {
        VideoEncoder::Libx264 => {
            args.extend(
                [
                    "-crf".to_string(),
                    params.crf.to_string(),
                    "-preset".into(),
                    "medium".into(),
                    "-tune".into(),
                    "fastdecode".into(),
                ],
            );
        }
        VideoEncoder::VideoToolbox => {
            args.extend([
                "-b:v".to_string(),
                format!("{}k", crf_to_bitrate_kbps(params.crf)),
            ]);
        }
    }

    args.extend(params.color.encoder_args());
    args.extend(
        ["-c:a", "aac", "-b:a", "128k", "-movflags", "+faststart"].map(String::from),
    );
    args.push(path_arg(output));
    args
}

/// Fraction complete encoded in one `-progress` line, if the line carries
/// one.
///
/// `out_time_us` and `out_time_ms` both hold microseconds (the latter is
/// misnamed by ffmpeg). `progress=end` means done.
pub fn parse_progress_line(line: &str, duration: Option<f64>) -> Option<f64> {
    if line.trim() == "progress=end" {
        return Some(1.0);
    }
    let value = line
        .strip_prefix("out_time_us=")
        .or_else(|| line.strip_prefix("out_time_ms="))?;
    let micros: i64 = value.trim().parse().ok()?;
    let duration = duration.filter(|d| *d > 0.0)?;
    Some((micros as f64 / 1_000_000.0 / duration).clamp(0.0, 1.0))
}

/// Re-encode `input` into `output`, pinning pixel format and color tags.
pub async fn re_encode(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    params: &ReEncodeParams<'_>,
    budget: Budget,
    mut on_progress: impl FnMut(f64),
) -> vs_core::Result<()> {
    tracing::info!(
        "re-encode {:?} -> {:?} (encoder={}, crf={}, pix_fmt={}, colors={}/{}/{}/{})",
        input,
        output,
        params.encoder.codec_name(),
        params.crf,
        params.color.encode_pix_fmt(),
        params.color.primaries,
        params.color.transfer,
        params.color.matrix,
        params.color.range,
    );

    let mut cmd = tools.command("ffmpeg")?;
    budget.apply(&mut cmd);
    cmd.args(re_encode_args(input, output, params));

    let mut last = 0.0_f64;
    cmd.execute_with_stderr_callback(|line| {
        if let Some(fraction) = parse_progress_line(line, params.duration) {
            if fraction > last {
                last = fraction;
                on_progress(fraction);
            }
        }
    })
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_table() {
        assert_eq!(crf_to_bitrate_kbps(18), 8000);
        assert_eq!(crf_to_bitrate_kbps(19), 8000);
        assert_eq!(crf_to_bitrate_kbps(23), 4000);
        assert_eq!(crf_to_bitrate_kbps(27), 2500);
        assert_eq!(crf_to_bitrate_kbps(35), 800);
        assert_eq!(crf_to_bitrate_kbps(10), FALLBACK_BITRATE_KBPS);
    }

    #[test]
    fn software_args() {
        let color = ColorProperties::default();
        let params = ReEncodeParams {
            crf: 27,
            encoder: VideoEncoder::Libx264,
            color: &color,
            duration: Some(10.0),
        };
        let args = re_encode_args(Path::new("in.mp4"), Path::new("out.mp4"), &params).join(" ");
        assert!(args.starts_with("-y -progress pipe:2 -nostats -i in.mp4 -c:v libx264"));
        assert!(args.contains("-crf 27 -preset medium -tune fastdecode"));
        assert!(args.contains("-pix_fmt yuv420p -color_primaries bt709 -color_trc bt709 -colorspace bt709 -color_range tv"));
        assert!(args.contains("-c:a aac -b:a 128k -movflags +faststart"));
        assert!(args.ends_with("out.mp4"));
        assert!(!args.contains("-b:v"));
    }

    #[test]
    fn hardware_args_use_bitrate() {
        let color = ColorProperties {
            primaries: "bt2020".into(),
            range: "pc".into(),
            detected: true,
            ..Default::default()
        };
        let params = ReEncodeParams {
            crf: 23,
            encoder: VideoEncoder::VideoToolbox,
            color: &color,
            duration: None,
        };
        let args = re_encode_args(Path::new("in.mp4"), Path::new("out.mp4"), &params).join(" ");
        assert!(args.contains("-c:v h264_videotoolbox -b:v 4000k"));
        assert!(args.contains("-color_primaries bt2020"));
        assert!(args.contains("-color_range pc"));
        assert!(!args.contains("-crf"));
    }

    #[test]
    fn progress_lines() {
        assert_eq!(parse_progress_line("out_time_us=5000000", Some(10.0)), Some(0.5));
        assert_eq!(parse_progress_line("out_time_ms=2500000", Some(10.0)), Some(0.25));
        assert_eq!(parse_progress_line("out_time_us=20000000", Some(10.0)), Some(1.0));
        assert_eq!(parse_progress_line("out_time_us=-9223372036854775807", Some(10.0)), Some(0.0));
        assert_eq!(parse_progress_line("out_time_us=5000000", None), None);
        assert_eq!(parse_progress_line("out_time_us=N/A", Some(10.0)), None);
        assert_eq!(parse_progress_line("frame=42", Some(10.0)), None);
        assert_eq!(parse_progress_line("progress=end", None), Some(1.0));
        assert_eq!(parse_progress_line("progress=continue", Some(10.0)), None);
    }
}
