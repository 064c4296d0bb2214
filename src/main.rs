use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use wpvc::checker::{CheckOptions, Checker};
use wpvc::config::{self, Settings};
use wpvc::index::probe::PhpRuntimeProbe;
use wpvc::logging::init_logging;
use wpvc::parser::PhpParser;
use wpvc::release::WordPressOrg;

#[derive(Parser)]
#[command(name = "wpvc")]
#[command(version, about = "Determine the minimum WordPress version a plugin requires")]
struct Cli {
    /// Plugin source directories (defaults to the current directory)
    dirs: Vec<PathBuf>,

    /// Keep the existing version index even if a newer release exists
    #[arg(long, visible_alias = "su")]
    skip_update: bool,

    /// Do not query the WordPress version API when an index exists
    #[arg(long, visible_alias = "suc")]
    skip_update_check: bool,

    /// Write wpvc_usage_data.json into each scanned directory
    #[arg(long, visible_alias = "save")]
    save_usage_data: bool,

    /// Write the resolved versions into readme.txt and the plugin header
    #[arg(long, visible_alias = "update")]
    update_files: bool,

    /// Only write the versions given with --wp/--php
    #[arg(long, visible_alias = "ufo")]
    update_files_only: bool,

    /// WordPress version to write instead of the resolved one
    #[arg(long, value_name = "VERSION")]
    wp: Option<String>,

    /// PHP version to write
    #[arg(long, value_name = "VERSION")]
    php: Option<String>,

    /// Version-check channel
    #[arg(long)]
    channel: Option<String>,

    /// Pretend the given release exists when querying the version API
    #[arg(long, value_name = "VERSION")]
    pretend_release: Option<String>,

    /// Keep the extracted WordPress source after indexing
    #[arg(long)]
    keep_data: bool,

    /// Keep downloaded release archives and reuse them
    #[arg(long)]
    keep_zip: bool,

    /// Ignore cached extraction results
    #[arg(long)]
    no_cache: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(channel) = &self.channel {
            settings.channel = channel.clone();
        }
        if self.pretend_release.is_some() {
            settings.pretend_release = self.pretend_release.clone();
        }
        settings.debug.keep_data |= self.keep_data;
        settings.debug.keep_zip |= self.keep_zip;
        settings.debug.no_cache |= self.no_cache;
    }

    fn options(&self) -> CheckOptions {
        CheckOptions {
            skip_update: self.skip_update,
            skip_update_check: self.skip_update_check,
            save_usage_data: self.save_usage_data,
            update_files: self.update_files,
            update_files_only: self.update_files_only,
            wordpress: self.wp.clone(),
            php: self.php.clone(),
            show_progress: std::io::stderr().is_terminal(),
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let data_dir = config::data_dir();
    let _guard = init_logging(cli.verbose, Some(&data_dir));

    let mut settings = Settings::load(&config::settings_path(&data_dir))?;
    cli.apply_to(&mut settings);

    let parser = PhpParser::new();
    let probe = PhpRuntimeProbe::new(settings.php_binary.clone());
    let source = WordPressOrg::new(&settings.api_base_url, &settings.download_base_url)?
        .with_channel(&settings.channel)
        .with_pretend_release(settings.pretend_release.clone());

    let base_name = std::env::current_dir()?
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let checker = Checker::new(settings, &data_dir, &parser, &probe, &source, &base_name);

    match checker.run(&cli.dirs, &cli.options()) {
        Ok(outcomes) => {
            for outcome in outcomes {
                if let Some(version) = outcome.min_version() {
                    println!("{}: minimum WordPress version {}", outcome.dir.display(), version);
                }
                if let Some(path) = &outcome.report_path {
                    println!("Usage data saved to {}", path.display());
                }
                for file in &outcome.updated_files {
                    println!("Updated {}", file.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_user_input() => {
            eprintln!("error: {}", e);
            Ok(ExitCode::from(2))
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}
