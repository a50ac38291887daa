mod config;
mod handlers;

use crate::error::{BuildError, Result};
use crate::types::{BuildMode, Category};
use crate::BuildOptions;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub use config::ConfigFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    #[value(alias = "s")]
    Symlink,
    #[value(alias = "h")]
    Hardlink,
    #[value(alias = "c")]
    Copy,
    #[value(name = "onefile", alias = "single-file", alias = "p", alias = "o")]
    Onefile,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Symlink => BuildMode::Symlink,
            ModeArg::Hardlink => BuildMode::Hardlink,
            ModeArg::Copy => BuildMode::Copy,
            ModeArg::Onefile => BuildMode::OneFile,
        }
    }
}

/// Search-path switches, one per category
const SEARCH_SWITCHES: [(&str, char, Category, &str); 6] = [
    ("scripts", 'I', Category::Script, "Add search path for scripts"),
    ("styles", 'C', Category::Style, "Add search path for styles"),
    ("headers", 'H', Category::Header, "Add search path for header fragments"),
    ("templates", 'T', Category::Template, "Add search path for page templates"),
    ("fragments", 'F', Category::Page, "Add search path for page fragments"),
    ("resources", 'R', Category::Resource, "Add search path for resources"),
];

pub struct Cli {
    config: ConfigFile,
    start_time: Instant,
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}

impl Cli {
    pub fn new() -> Self {
        Self {
            config: ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        self.setup_logging(matches.get_count("verbose"));

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        match matches.subcommand() {
            Some(("build", sub_matches)) => handlers::handle_build_command(self, sub_matches),
            Some(("serve", sub_matches)) => handlers::handle_serve_command(self, sub_matches),
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    pub fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Project file (.toml or .json)")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                output_args(search_args(Command::new("build").about("Build the page")))
                    .arg(Arg::new("watch").short('w').long("watch").help("Rebuild whenever a source file changes").action(ArgAction::SetTrue)),
            )
            .subcommand(
                output_args(search_args(Command::new("serve").about("Build the page and serve it, rebuilding on every page request")))
                    .arg(Arg::new("server").short('s').long("server").value_name("ADDR:PORT").help("Listen address, for example localhost:10000")),
            )
            .subcommand(search_args(
                Command::new("check").about("Resolve every directive and list the resolved files"),
            ))
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    /// Command-line search paths first, then the project file's
    pub fn build_options(&self, matches: &ArgMatches) -> Result<BuildOptions> {
        let mut options = BuildOptions::default();
        for (id, _, category, _) in SEARCH_SWITCHES {
            if let Some(dirs) = matches.get_many::<String>(id) {
                options
                    .search_paths
                    .list_mut(category)
                    .extend(dirs.map(|d| absolute(Path::new(d))));
            }
        }
        options.search_paths.extend(&self.config.search_paths);

        let cli_mode = matches
            .try_get_one::<ModeArg>("mode")
            .ok()
            .flatten()
            .map(|&m| BuildMode::from(m));
        options.mode = match cli_mode {
            Some(mode) => mode,
            None => self.config.build_mode()?.unwrap_or_default(),
        };
        Ok(options)
    }

    pub fn source_path(&self, matches: &ArgMatches) -> Result<PathBuf> {
        matches
            .get_one::<String>("source")
            .map(|s| absolute(Path::new(s)))
            .ok_or_else(|| BuildError::config("Missing source file"))
    }

    pub fn output_path(&self, matches: &ArgMatches) -> Result<PathBuf> {
        matches
            .get_one::<String>("output")
            .map(PathBuf::from)
            .or_else(|| self.config.output.clone())
            .map(|p| absolute(&p))
            .ok_or_else(|| BuildError::config("Target page is not specified (use -o <target>)"))
    }

    pub fn server_address(&self, matches: &ArgMatches) -> Result<String> {
        matches
            .get_one::<String>("server")
            .cloned()
            .or_else(|| self.config.server.clone())
            .ok_or_else(|| BuildError::config("Server address is not specified (use -s <addr:port>)"))
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }
}

fn search_args(command: Command) -> Command {
    let command = command.arg(Arg::new("source").help("Root script").required(true).index(1));
    SEARCH_SWITCHES.iter().fold(command, |command, &(id, short, _, help)| {
        command.arg(
            Arg::new(id)
                .short(short)
                .value_name("DIR")
                .help(help)
                .action(ArgAction::Append),
        )
    })
}

fn output_args(command: Command) -> Command {
    command
        .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output html page"))
        .arg(Arg::new("mode").short('m').long("mode").value_parser(clap::value_parser!(ModeArg)).help("Build mode [default: onefile]"))
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        Cli::new().build_cli().try_get_matches_from(args).unwrap()
    }

    #[test]
    fn test_build_options_from_switches() {
        let matches = parse(&["webproject", "build", "/src/main.js", "-o", "/out/index.html", "-I", "/lib", "-I", "/vendor", "-C", "/css", "-m", "h"]);
        let (_, sub) = matches.subcommand().unwrap();

        let cli = Cli::new();
        let options = cli.build_options(sub).unwrap();
        assert_eq!(options.search_paths.scripts, vec![PathBuf::from("/lib"), PathBuf::from("/vendor")]);
        assert_eq!(options.search_paths.styles, vec![PathBuf::from("/css")]);
        assert_eq!(options.mode, BuildMode::Hardlink);
        assert_eq!(cli.output_path(sub).unwrap(), PathBuf::from("/out/index.html"));
        assert_eq!(cli.source_path(sub).unwrap(), PathBuf::from("/src/main.js"));
    }

    #[test]
    fn test_mode_aliases() {
        for (name, expected) in [
            ("symlink", BuildMode::Symlink),
            ("c", BuildMode::Copy),
            ("onefile", BuildMode::OneFile),
            ("single-file", BuildMode::OneFile),
            ("p", BuildMode::OneFile),
        ] {
            let matches = parse(&["webproject", "build", "/a.js", "-o", "/b.html", "-m", name]);
            let (_, sub) = matches.subcommand().unwrap();
            assert_eq!(Cli::new().build_options(sub).unwrap().mode, expected, "mode {}", name);
        }
        assert!(Cli::new()
            .build_cli()
            .try_get_matches_from(["webproject", "build", "/a.js", "-m", "zip"])
            .is_err());
    }

    #[test]
    fn test_config_values_come_after_command_line() {
        let mut cli = Cli::new();
        cli.config = ConfigFile {
            search_paths: crate::SearchPaths::new().with(Category::Script, "/from-config"),
            output: Some(PathBuf::from("/config/index.html")),
            mode: Some("copy".to_string()),
            server: Some("localhost:9000".to_string()),
        };

        let matches = parse(&["webproject", "serve", "/a.js", "-I", "/from-cli"]);
        let (_, sub) = matches.subcommand().unwrap();
        let options = cli.build_options(sub).unwrap();
        assert_eq!(
            options.search_paths.scripts,
            vec![PathBuf::from("/from-cli"), PathBuf::from("/from-config")]
        );
        assert_eq!(options.mode, BuildMode::Copy);
        assert_eq!(cli.output_path(sub).unwrap(), PathBuf::from("/config/index.html"));
        assert_eq!(cli.server_address(sub).unwrap(), "localhost:9000");

        let matches = parse(&["webproject", "serve", "/a.js", "-o", "/cli.html", "-m", "o", "-s", ":8080"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(cli.build_options(sub).unwrap().mode, BuildMode::OneFile);
        assert_eq!(cli.output_path(sub).unwrap(), PathBuf::from("/cli.html"));
        assert_eq!(cli.server_address(sub).unwrap(), ":8080");
    }

    #[test]
    fn test_missing_output_is_config_error() {
        let matches = parse(&["webproject", "build", "/a.js"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert!(matches!(Cli::new().output_path(sub), Err(BuildError::Config { .. })));
    }

    #[test]
    fn test_check_has_no_mode() {
        let matches = parse(&["webproject", "check", "/a.js", "-T", "/tpl"]);
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "check");
        let options = Cli::new().build_options(sub).unwrap();
        assert_eq!(options.search_paths.templates, vec![PathBuf::from("/tpl")]);
        assert_eq!(options.mode, BuildMode::OneFile);
    }
}
