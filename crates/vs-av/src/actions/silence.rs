//! Silence padding at the start or end of the audio track.

use std::path::Path;

use rand::rngs::OsRng;
use rand::Rng;

use super::{path_arg, Budget};
use crate::probe::AudioStream;
use crate::tools::ToolRegistry;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;
const DEFAULT_CHANNEL_LAYOUT: &str = "stereo";

/// Where the silent segment goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilencePlacement {
    Start,
    End,
}

impl SilencePlacement {
    /// Fair coin flip from the OS random source.
    pub fn random() -> Self {
        if OsRng.gen_bool(0.5) {
            SilencePlacement::Start
        } else {
            SilencePlacement::End
        }
    }
}

/// Sample rate and channel layout of the generated silence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channel_layout: String,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_layout: DEFAULT_CHANNEL_LAYOUT.into(),
        }
    }
}

impl AudioFormat {
    /// Match the source audio, defaulting fields it does not report.
    pub fn from_stream(stream: &AudioStream) -> Self {
        let layout = stream.channel_layout.clone().or_else(|| match stream.channels {
            Some(1) => Some("mono".to_string()),
            _ => None,
        });
        Self {
            sample_rate: stream.sample_rate.filter(|r| *r > 0).unwrap_or(DEFAULT_SAMPLE_RATE),
            channel_layout: layout.unwrap_or_else(|| DEFAULT_CHANNEL_LAYOUT.into()),
        }
    }

    fn anullsrc(&self, duration: f64) -> String {
        format!(
            "anullsrc=channel_layout={}:sample_rate={}:duration={duration}",
            self.channel_layout, self.sample_rate
        )
    }
}

/// Arguments for splicing `duration` seconds of silence.
///
/// `source_audio` is `None` when the input has no audio stream; the silence
/// then becomes the only audio track.
pub fn silence_args(
    input: &Path,
    output: &Path,
    duration: f64,
    placement: SilencePlacement,
    source_audio: Option<&AudioStream>,
) -> Vec<String> {
    let format = source_audio.map(AudioFormat::from_stream).unwrap_or_default();
    let silence = format.anullsrc(duration);
    let lavfi = |args: &mut Vec<String>| {
        args.extend(["-f".into(), "lavfi".into(), "-i".into(), silence.clone()]);
    };
    let source = |args: &mut Vec<String>| {
        args.extend(["-i".into(), path_arg(input)]);
    };

    let mut args: Vec<String> = vec!["-y".into()];

    match (source_audio, placement) {
        (None, _) => {
            source(&mut args);
            lavfi(&mut args);
            args.extend(["-map", "0:v", "-map", "1:a"].map(String::from));
        }
        (Some(_), SilencePlacement::Start) => {
            lavfi(&mut args);
            source(&mut args);
            args.extend(
                [
                    "-filter_complex",
                    "[0:a][1:a]concat=n=2:v=0:a=1[outa]",
                    "-map",
                    "1:v",
                    "-map",
                    "[outa]",
                ]
                .map(String::from),
            );
        }
        (Some(_), SilencePlacement::End) => {
            source(&mut args);
            lavfi(&mut args);
            args.extend(
                [
                    "-filter_complex",
                    "[0:a][1:a]concat=n=2:v=0:a=1[outa]",
                    "-map",
                    "0:v",
                    "-map",
                    "[outa]",
                ]
                .map(String::from),
            );
        }
    }

    args.extend(["-c:v", "copy", "-c:a", "aac"].map(String::from));
    args.push(path_arg(output));
    args
}

/// Pad the audio of `input` with silence and write `output`. Video is
/// stream-copied.
pub async fn add_silence(
    tools: &ToolRegistry,
    input: &Path,
    output: &Path,
    duration: f64,
    placement: SilencePlacement,
    source_audio: Option<&AudioStream>,
    budget: Budget,
) -> vs_core::Result<()> {
    tracing::info!(
        "add {duration}s silence at {:?} {:?} -> {:?}{}",
        placement,
        input,
        output,
        if source_audio.is_none() { " (no source audio)" } else { "" }
    );

    let mut cmd = tools.command("ffmpeg")?;
    budget.apply(&mut cmd);
    cmd.args(silence_args(input, output, duration, placement, source_audio));
    cmd.execute().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_48k() -> AudioStream {
        AudioStream {
            sample_rate: Some(48_000),
            channel_layout: Some("stereo".into()),
            channels: Some(2),
        }
    }

    #[test]
    fn format_matches_source() {
        let fmt = AudioFormat::from_stream(&stereo_48k());
        assert_eq!(fmt.sample_rate, 48_000);
        assert_eq!(fmt.channel_layout, "stereo");

        let mono = AudioFormat::from_stream(&AudioStream {
            sample_rate: None,
            channel_layout: None,
            channels: Some(1),
        });
        assert_eq!(mono, AudioFormat { sample_rate: 44_100, channel_layout: "mono".into() });
    }

    #[test]
    fn start_places_silence_first() {
        let audio = stereo_48k();
        let args = silence_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            0.2,
            SilencePlacement::Start,
            Some(&audio),
        )
        .join(" ");
        assert_eq!(
            args,
            "-y -f lavfi -i anullsrc=channel_layout=stereo:sample_rate=48000:duration=0.2 \
             -i in.mp4 -filter_complex [0:a][1:a]concat=n=2:v=0:a=1[outa] \
             -map 1:v -map [outa] -c:v copy -c:a aac out.mp4"
        );
    }

    #[test]
    fn end_places_silence_last() {
        let audio = stereo_48k();
        let args = silence_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            0.5,
            SilencePlacement::End,
            Some(&audio),
        )
        .join(" ");
        assert!(args.starts_with("-y -i in.mp4 -f lavfi -i anullsrc="));
        assert!(args.contains("duration=0.5"));
        assert!(args.contains("-map 0:v -map [outa]"));
    }

    #[test]
    fn no_source_audio_uses_silence_track() {
        let args = silence_args(
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            0.2,
            SilencePlacement::Start,
            None,
        )
        .join(" ");
        assert!(!args.contains("concat"));
        assert!(args.contains("sample_rate=44100"));
        assert!(args.contains("-map 0:v -map 1:a -c:v copy -c:a aac"));
    }

    #[test]
    fn coin_flip_hits_both_sides() {
        let mut starts = 0;
        for _ in 0..200 {
            if SilencePlacement::random() == SilencePlacement::Start {
                starts += 1;
            }
        }
        assert!(starts > 0 && starts < 200);
    }
}
