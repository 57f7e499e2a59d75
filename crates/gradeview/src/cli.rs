use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gradeview",
    author,
    version,
    about = "Real-time colour grading preview and renderer"
)]
pub struct Cli {
    /// Configuration file with renderer options and named looks.
    #[arg(long, global = true, env = "GRADEVIEW_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Grade an image (or the first frame of an image directory) into a PNG.
    Render(RenderArgs),
    /// Open an interactive window playing the input through a look.
    Preview(PreviewArgs),
    /// List the looks defined in the configuration.
    Looks(LooksArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GradeArgs {
    /// Look to apply; falls back to `defaults.look`, then neutral.
    #[arg(long, value_name = "NAME")]
    pub look: Option<String>,

    /// Before/after split position in [0, 1).
    #[arg(long, value_name = "FRACTION", value_parser = parse_split)]
    pub split: Option<f32>,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Image file or directory of frames.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Destination PNG.
    #[arg(short, long, value_name = "PNG")]
    pub output: PathBuf,

    #[command(flatten)]
    pub grade: GradeArgs,

    /// Skip the GPU and grade on the CPU.
    #[arg(long)]
    pub software: bool,

    /// Timestamp fed to the grain animation.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0, value_parser = parse_time)]
    pub time: f32,

    /// Output size; defaults to the input size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_dimensions)]
    pub size: Option<(u32, u32)>,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Image file or directory of frames.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[command(flatten)]
    pub grade: GradeArgs,

    /// Directory receiving PNG captures (key `C`).
    #[arg(long, value_name = "DIR")]
    pub capture_dir: Option<PathBuf>,

    /// Start playing immediately.
    #[arg(long)]
    pub autoplay: bool,

    /// Restart the clip when it ends.
    #[arg(long = "loop")]
    pub looping: bool,
}

#[derive(Args, Debug)]
pub struct LooksArgs {
    /// Print the resolved looks as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_split(value: &str) -> Result<f32, String> {
    let split = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid split '{value}'"))?;
    lookconfig::validate_split(split)?;
    Ok(split)
}

fn parse_time(value: &str) -> Result<f32, String> {
    let time = value
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid time '{value}'"))?;
    if !time.is_finite() || time < 0.0 {
        return Err("time must be a non-negative number of seconds".into());
    }
    Ok(time)
}

fn parse_dimensions(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height".to_string())?;
    if width == 0 || height == 0 {
        return Err("dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_split_fractions() {
        assert_eq!(parse_split("0.25").unwrap(), 0.25);
        assert!(parse_split("1").is_err());
        assert!(parse_split("-0.1").is_err());
        assert!(parse_split("half").is_err());
    }

    #[test]
    fn parses_dimensions() {
        assert_eq!(parse_dimensions("640x360").unwrap(), (640, 360));
        assert_eq!(parse_dimensions("8X4").unwrap(), (8, 4));
        assert!(parse_dimensions("0x4").is_err());
        assert!(parse_dimensions("640").is_err());
    }

    #[test]
    fn render_command_parses() {
        let cli = Cli::try_parse_from([
            "gradeview",
            "render",
            "in.png",
            "-o",
            "out.png",
            "--look",
            "warm",
            "--split",
            "0.5",
            "--software",
        ])
        .unwrap();
        let Command::Render(args) = cli.command else {
            panic!("expected render command");
        };
        assert_eq!(args.grade.look.as_deref(), Some("warm"));
        assert_eq!(args.grade.split, Some(0.5));
        assert!(args.software);
        assert_eq!(args.time, 0.0);
    }
}
