//! CLI argument definitions for `wave`.

use clap::{value_parser, Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("wave")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Gapless terminal audio player")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(
            Command::new("play")
                .about("Play one or more files back to back")
                .arg(
                    Arg::new("FILES")
                        .help("Audio files, played in order")
                        .required(true)
                        .num_args(1..)
                        .value_parser(value_parser!(std::path::PathBuf)),
                )
                .arg(
                    Arg::new("volume")
                        .long("volume")
                        .short('v')
                        .value_name("VOLUME")
                        .value_parser(value_parser!(f32))
                        .help("Initial volume (0.0-1.0)"),
                )
                .arg(
                    Arg::new("speed")
                        .long("speed")
                        .value_name("SPEED")
                        .value_parser(value_parser!(f32))
                        .help("Playback speed (0.5-2.0)"),
                )
                .arg(
                    Arg::new("preset")
                        .long("preset")
                        .short('p')
                        .value_name("NAME")
                        .help("Equalizer preset (see `wave presets`)"),
                )
                .arg(
                    Arg::new("crossfade-ms")
                        .long("crossfade-ms")
                        .value_name("MS")
                        .value_parser(value_parser!(f32))
                        .help("Overlap between tracks in milliseconds"),
                )
                .arg(
                    Arg::new("no-gapless")
                        .long("no-gapless")
                        .action(ArgAction::SetTrue)
                        .help("Do not pre-buffer the next track"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_name("PATH")
                        .value_parser(value_parser!(std::path::PathBuf))
                        .help("JSON file with `player` and `dsp` sections"),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue)
                        .help("Play without the terminal UI"),
                ),
        )
        .subcommand(
            Command::new("probe")
                .about("Print format and metadata of a file as JSON")
                .arg(
                    Arg::new("FILE")
                        .help("The input file path")
                        .required(true)
                        .value_parser(value_parser!(std::path::PathBuf)),
                ),
        )
        .subcommand(Command::new("presets").about("Print the equalizer presets as JSON"))
        .subcommand(Command::new("formats").about("List the supported file extensions"))
}
