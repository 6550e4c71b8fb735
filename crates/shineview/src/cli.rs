use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "shineview",
    author,
    version,
    about = "Preview and export light-driven shine effects"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a window rendering the scene described by a config file.
    Preview(PreviewArgs),
    /// Render one still frame of a scene to a PNG file.
    Export(ExportArgs),
    /// List the built-in effects and their default options.
    Effects(EffectsArgs),
}

#[derive(Parser, Debug)]
pub struct PreviewArgs {
    /// Scene configuration (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Window size override, e.g. `1280x720`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,
}

#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Scene configuration (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Destination PNG path.
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,

    /// Output size; defaults to the configured size, then the image size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Light position `X,Y` in [-1, 1]; overrides a fixed light from the config.
    #[arg(long, value_name = "X,Y", value_parser = parse_light, allow_hyphen_values = true)]
    pub light: Option<[f32; 2]>,

    /// Render on a headless GPU adapter instead of the software compositor.
    #[arg(long)]
    pub gpu: bool,
}

#[derive(Parser, Debug)]
pub struct EffectsArgs {
    /// Print the catalog as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1920x1080".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_light(spec: &str) -> Result<[f32; 2], String> {
    let (x, y) = spec
        .split_once(',')
        .ok_or_else(|| "expected X,Y, e.g. 0.25,-0.5".to_string())?;
    let parse = |value: &str| {
        value
            .trim()
            .parse::<f32>()
            .map_err(|_| format!("invalid light coordinate '{value}'"))
    };
    Ok([parse(x)?, parse(y)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_surface_size("640x480"), Ok((640, 480)));
        assert_eq!(parse_surface_size(" 32 X 16 "), Ok((32, 16)));
        assert!(parse_surface_size("0x10").is_err());
        assert!(parse_surface_size("640").is_err());
    }

    #[test]
    fn parses_light_positions() {
        assert_eq!(parse_light("0.25,-0.5"), Ok([0.25, -0.5]));
        assert!(parse_light("0.25").is_err());
        assert!(parse_light("a,b").is_err());
    }

    #[test]
    fn export_accepts_negative_light() {
        let cli = Cli::try_parse_from([
            "shineview", "export", "scene.toml", "-o", "out.png", "--light", "-0.5,0.5",
        ])
        .unwrap();
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.light, Some([-0.5, 0.5]));
        assert!(!args.gpu);
    }
}
