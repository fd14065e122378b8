use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Instant;

use cdg::screen::DiscardScreen;
use cdg::{DecodeSession, PacketSource, PlaybackClock, ScreenHandler};

struct Options {
    input: Option<String>,
    no_video: bool,
    no_audio: bool,
    show_help: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Options {
    let mut options = Options {
        input: None,
        no_video: false,
        no_audio: false,
        show_help: false,
    };

    for arg in args {
        match arg.as_str() {
            "--no-video" => options.no_video = true,
            "--no-audio" => options.no_audio = true,
            "--help" | "-h" => options.show_help = true,
            _ if arg.starts_with('-') => {
                eprintln!("Unknown flag: {}", arg);
                options.show_help = true;
            }
            _ if options.input.is_some() => {
                eprintln!("Unexpected extra argument: {}", arg);
                options.show_help = true;
            }
            _ => options.input = Some(arg),
        }
    }
    options
}

fn print_usage() {
    eprintln!(
        "Usage:\n  cdg [--no-video] [--no-audio] <song[.cdg]>\n\n\
         Takes the base path of a karaoke pair (song.cdg + song.mp3) or a\n\
         direct path to a .cdg file.\n\n\
         Flags:\n  \
         --no-video     Decode without rendering to the terminal\n  \
         --no-audio     Pace on the wall clock even if audio is available\n  \
         -h, --help     Show this help\n\n\
         Examples:\n  cdg tracks/my-song\n  cdg --no-video tracks/my-song.cdg\n"
    );
}

/// Resolve the .cdg path and its companion audio path from the input
fn resolve_paths(input: &str) -> (PathBuf, PathBuf) {
    let input = PathBuf::from(input);
    if input.extension().is_some_and(|ext| ext == "cdg") {
        let audio = input.with_extension("mp3");
        (input, audio)
    } else {
        (input.with_extension("cdg"), input.with_extension("mp3"))
    }
}

fn build_clock(audio_path: &std::path::Path, no_audio: bool) -> PlaybackClock {
    if no_audio {
        return PlaybackClock::wall_clock();
    }

    #[cfg(feature = "streaming")]
    {
        match cdg::streaming::KaraokeAudio::open(audio_path) {
            Ok(audio) => return PlaybackClock::audio(Box::new(audio)),
            Err(e) => {
                eprintln!(
                    "No audio for {} ({}); pacing on the wall clock",
                    audio_path.display(),
                    e
                );
            }
        }
    }
    #[cfg(not(feature = "streaming"))]
    {
        let _ = audio_path;
        eprintln!("Built without the \"streaming\" feature; pacing on the wall clock");
    }

    PlaybackClock::wall_clock()
}

fn build_sink(no_video: bool) -> Box<dyn ScreenHandler> {
    #[cfg(feature = "visualization")]
    {
        if !no_video {
            return Box::new(cdg::visualization::TerminalScreen::new());
        }
    }
    #[cfg(not(feature = "visualization"))]
    {
        if !no_video {
            eprintln!("Built without the \"visualization\" feature; decoding headless");
        }
    }
    Box::new(DiscardScreen)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args(env::args().skip(1));
    if options.show_help {
        print_usage();
        return Ok(());
    }
    let Some(input) = options.input else {
        print_usage();
        return Ok(());
    };

    let (cdg_path, audio_path) = resolve_paths(&input);

    println!("CD+G Decoder - Real-time Paced Playback");
    println!("========================================\n");
    println!("Graphics stream: {}", cdg_path.display());

    let source = PacketSource::open(&cdg_path)
        .with_context(|| format!("Failed to open CDG file '{}'", cdg_path.display()))?;
    let clock = build_clock(&audio_path, options.no_audio);
    let sink = build_sink(options.no_video);

    let playback_start = Instant::now();
    let mut session =
        DecodeSession::start(source, clock, sink).context("Failed to start decode session")?;
    session.wait_until_done();

    let stats = session.stats();
    drop(session);

    let total_time = playback_start.elapsed();
    println!("\n=== Decode Statistics ===");
    println!("Duration:              {:.2} seconds", total_time.as_secs_f32());
    println!("Packets dispatched:    {}", stats.packets_dispatched);
    println!("Instructions applied:  {}", stats.instructions_applied);
    println!("Palette loads:         {}", stats.palette_loads);
    println!("\nPlayback complete!");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_flags_and_input() {
        let options = parse_args(args(&["--no-video", "tracks/song"]));
        assert!(options.no_video);
        assert!(!options.no_audio);
        assert!(!options.show_help);
        assert_eq!(options.input.as_deref(), Some("tracks/song"));
    }

    #[test]
    fn test_parse_args_rejects_extra_positional() {
        let options = parse_args(args(&["first", "second"]));
        assert!(options.show_help);
        // The first positional is kept, not silently overwritten
        assert_eq!(options.input.as_deref(), Some("first"));
    }

    #[test]
    fn test_parse_args_unknown_flag_shows_help() {
        let options = parse_args(args(&["--loud", "song"]));
        assert!(options.show_help);
    }

    #[test]
    fn test_resolve_paths_from_base_and_cdg() {
        let (cdg, audio) = resolve_paths("tracks/song");
        assert_eq!(cdg, PathBuf::from("tracks/song.cdg"));
        assert_eq!(audio, PathBuf::from("tracks/song.mp3"));

        let (cdg, audio) = resolve_paths("tracks/song.cdg");
        assert_eq!(cdg, PathBuf::from("tracks/song.cdg"));
        assert_eq!(audio, PathBuf::from("tracks/song.mp3"));
    }
}
