mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use config::AppConfig;
use tagshelf_adapters::{
    present_image_long, present_image_row, present_phase, present_scan_report, present_selection,
    present_tag_edit, present_tag_line, sniff_image_kind, Exiv2Metadata, JsonCacheStore,
    PngThumbnailGenerator, SystemClock, WalkdirFileScanner,
};
use tagshelf_application::{
    thumbnail_progress_text, ApplicationError, ApplicationService, CancellationToken,
    EditTagsCommand, IndexEvent, LoadLibraryCommand, PollEventQuery, ServiceSettings,
    StartIndexCommand, SubmitThumbnailsCommand, TagFilterEngine, TagSort, TagSummaryQuery,
    ThumbnailRequest,
};
use tagshelf_domain::{LibrarySnapshot, Progress, TagId, TagState, ThumbnailSize};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    logging::init_logging();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return if error.use_stderr() {
                ExitCode::from(2)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CommandError::Usage(msg)) => {
            eprintln!("{msg}");
            ExitCode::from(2)
        }
        Err(CommandError::Runtime(msg)) => {
            eprintln!("{msg}");
            ExitCode::from(1)
        }
    }
}

/// Tag-based photo library: metadata index, thumbnails and tag filters.
#[derive(Debug, Parser)]
#[command(name = "tagshelf", version)]
struct Cli {
    /// Library directory for this run, replacing the configured ones.
    #[arg(long = "root", global = true, value_name = "PATH")]
    roots: Vec<PathBuf>,
    /// Config file to use instead of the per-user one.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Scan the library directories and refresh the metadata cache.
    Index,
    /// Print the images that pass the tag filter.
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Also print format, dimensions, size and tags.
        #[arg(long)]
        long: bool,
    },
    /// Print the tag vocabulary with visible/total counts.
    Tags {
        #[arg(long, value_enum, default_value = "name")]
        sort: SortArg,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Create missing thumbnails for every indexed image.
    Thumbs {
        #[arg(long)]
        regenerate: bool,
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
    },
    /// Add or remove tags on indexed images.
    Tag {
        #[arg(long = "add", value_name = "TAG")]
        add: Vec<String>,
        #[arg(long = "remove", value_name = "TAG")]
        remove: Vec<String>,
        /// Only show how the selection is tagged today.
        #[arg(long)]
        dry_run: bool,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Inspect or edit the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    AddDir { path: PathBuf },
    RemoveDir { path: PathBuf },
}

#[derive(Debug, Clone, Default, Args)]
struct FilterArgs {
    /// Only show images carrying this tag.
    #[arg(long = "with", value_name = "TAG")]
    with: Vec<String>,
    /// Hide images carrying this tag.
    #[arg(long = "without", value_name = "TAG")]
    without: Vec<String>,
    #[arg(long, value_enum)]
    untagged: Option<UntaggedArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum UntaggedArg {
    Only,
    Hide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortArg {
    Name,
    Count,
}

#[derive(Debug, Clone)]
enum CommandError {
    Usage(String),
    Runtime(String),
}

impl CommandError {
    fn from_application(context: &str, error: ApplicationError) -> Self {
        match error {
            ApplicationError::InvalidInput(_) | ApplicationError::Domain(_) => {
                Self::Usage(format!("{context}: {error}"))
            }
            other => Self::Runtime(format!("{context}: {other}")),
        }
    }
}

fn build_application_service(config: &AppConfig, jobs: Option<usize>) -> ApplicationService {
    let exiv2 = Exiv2Metadata::new(config.exiv2_binary.clone());
    let settings = ServiceSettings {
        icon_cache_bytes: config.icon_cache_bytes,
        thumbnail_jobs: jobs.unwrap_or(config.thumbnail_jobs).max(1),
        ..ServiceSettings::new(config.thumbnail_dir.clone())
    };
    ApplicationService::new(
        Box::new(WalkdirFileScanner),
        Box::new(exiv2.clone()),
        Box::new(exiv2),
        Box::new(JsonCacheStore::new(config.cache_path.clone())),
        Box::new(SystemClock),
        Box::new(PngThumbnailGenerator::new(ThumbnailSize::new(
            config.thumbnail_width,
            config.thumbnail_height,
        ))),
        settings,
    )
}

fn run_command(cli: Cli) -> Result<(), CommandError> {
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load_or_create(&config_path).map_err(CommandError::Runtime)?;

    if let Command::Config { action } = &cli.command {
        return run_config(action, &mut config, &config_path);
    }

    let roots = config
        .active_roots(&cli.roots)
        .map_err(|error| CommandError::Usage(format!("invalid root: {error}")))?;
    if roots.is_empty() {
        return Err(CommandError::Usage(
            "no library directories; pass --root or run `tagshelf config add-dir <PATH>`"
                .to_string(),
        ));
    }

    let jobs = match &cli.command {
        Command::Thumbs { jobs, .. } => *jobs,
        _ => None,
    };
    let service = build_application_service(&config, jobs);

    match cli.command {
        Command::Index => run_index(&service, roots),
        Command::List { filter, long } => {
            let snapshot = load_library(&service, roots)?;
            let mut engine = filtered_engine(&snapshot, &filter)?;
            let visibility = engine.recompute(&snapshot.images);
            if visibility.visible.is_empty() {
                println!("no images match");
                return Ok(());
            }
            for image in visibility.visible {
                if long {
                    println!("{}", present_image_long(image, sniff_image_kind(&image.path)));
                } else {
                    println!("{}", present_image_row(image));
                }
            }
            Ok(())
        }
        Command::Tags { sort, filter } => {
            let snapshot = load_library(&service, roots)?;
            let mut engine = filtered_engine(&snapshot, &filter)?;
            engine.recompute(&snapshot.images);
            let sort = match sort {
                SortArg::Name => TagSort::Name,
                SortArg::Count => TagSort::Count,
            };
            for entry in engine.entries(sort) {
                println!("{}", present_tag_line(entry));
            }
            Ok(())
        }
        Command::Thumbs { regenerate, .. } => run_thumbs(&service, roots, regenerate),
        Command::Tag {
            add,
            remove,
            dry_run,
            paths,
        } => run_tag(&service, roots, add, remove, dry_run, paths),
        Command::Config { .. } => Ok(()),
    }
}

fn run_config(
    action: &ConfigAction,
    config: &mut AppConfig,
    config_path: &std::path::Path,
) -> Result<(), CommandError> {
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(config)
                .map_err(|error| CommandError::Runtime(error.to_string()))?;
            println!("# {}", config_path.display());
            println!("{json}");
            return Ok(());
        }
        ConfigAction::AddDir { path } => {
            let added = config.add_directory(path).map_err(CommandError::Usage)?;
            if !added {
                println!("already configured: {}", path.display());
                return Ok(());
            }
        }
        ConfigAction::RemoveDir { path } => {
            if !config.remove_directory(path) {
                return Err(CommandError::Usage(format!(
                    "not a library directory: {}",
                    path.display()
                )));
            }
        }
    }
    config.save(config_path).map_err(CommandError::Runtime)?;
    for directory in &config.directories {
        println!("{}", directory.display());
    }
    Ok(())
}

fn run_index(service: &ApplicationService, roots: Vec<PathBuf>) -> Result<(), CommandError> {
    service
        .start_index(StartIndexCommand { roots })
        .map_err(|error| CommandError::from_application("index failed", error))?;
    loop {
        let event = service
            .poll_index(PollEventQuery {
                wait: Some(POLL_INTERVAL),
            })
            .map_err(|error| CommandError::from_application("index failed", error))?;
        match event {
            Some(IndexEvent::Phase(phase)) => println!("{}", present_phase(&phase)),
            Some(IndexEvent::Finished(Ok(outcome))) => {
                println!("{}", present_scan_report(&outcome.report));
                return Ok(());
            }
            Some(IndexEvent::Finished(Err(error))) => {
                return Err(CommandError::from_application("index failed", error));
            }
            None => {}
        }
    }
}

fn run_thumbs(
    service: &ApplicationService,
    roots: Vec<PathBuf>,
    regenerate: bool,
) -> Result<(), CommandError> {
    let snapshot = load_library(service, roots)?;
    let total = snapshot.len();
    if total == 0 {
        println!("no images in the index; run `tagshelf index` first");
        return Ok(());
    }

    let requests = snapshot
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| ThumbnailRequest {
            index,
            path: image.path.clone(),
            force_regenerate: regenerate,
        })
        .collect();
    let batch = service
        .submit_thumbnails(SubmitThumbnailsCommand { requests })
        .map_err(|error| CommandError::from_application("thumbnails failed", error))?;

    let mut done = 0;
    let mut failed = 0;
    while done < total {
        let event = service
            .poll_thumbnail(PollEventQuery {
                wait: Some(POLL_INTERVAL),
            })
            .map_err(|error| CommandError::from_application("thumbnails failed", error))?;
        let Some(event) = event else {
            continue;
        };
        if event.batch != batch {
            continue;
        }
        done += 1;
        if event.icon.is_failure() {
            failed += 1;
            debug!(path = %event.path.display(), "no thumbnail");
        }
        eprintln!("{}", thumbnail_progress_text(Progress::new(done, total)));
    }
    println!("thumbnails ready: {}, failed: {failed}", done - failed);
    Ok(())
}

fn run_tag(
    service: &ApplicationService,
    roots: Vec<PathBuf>,
    add: Vec<String>,
    remove: Vec<String>,
    dry_run: bool,
    paths: Vec<PathBuf>,
) -> Result<(), CommandError> {
    let snapshot = load_library(service, roots)?;
    let mut selection = Vec::with_capacity(paths.len());
    for path in &paths {
        let canonical = path
            .canonicalize()
            .map_err(|error| CommandError::Usage(format!("{}: {error}", path.display())))?;
        let image = snapshot.find(&canonical).ok_or_else(|| {
            CommandError::Usage(format!(
                "not in the index: {}; run `tagshelf index` first",
                path.display()
            ))
        })?;
        selection.push(image.clone());
    }
    let known_tags = TagFilterEngine::from_images(&snapshot.images).known_tags();

    if dry_run {
        let selected = selection.len();
        for summary in service.tag_summary(TagSummaryQuery {
            selection,
            known_tags,
        }) {
            println!("{}", present_selection(&summary, selected));
        }
        return Ok(());
    }

    let command = EditTagsCommand {
        selection,
        add: add.into_iter().collect(),
        remove: remove.into_iter().collect(),
        known_tags,
    };
    let result = service
        .edit_tags(command, &CancellationToken::new(), &mut |progress| {
            debug!(current = progress.current, total = progress.total, "tag edit progress");
        })
        .map_err(|error| {
            if let ApplicationError::TagEditAborted { applied, .. } = &error {
                for line in present_tag_edit(applied) {
                    println!("{line}");
                }
            }
            CommandError::from_application("tag edit failed", error)
        })?;
    for line in present_tag_edit(&result) {
        println!("{line}");
    }
    Ok(())
}

fn load_library(
    service: &ApplicationService,
    roots: Vec<PathBuf>,
) -> Result<LibrarySnapshot, CommandError> {
    service
        .load_library(LoadLibraryCommand { roots })
        .map_err(|error| CommandError::from_application("cannot load the index", error))
}

fn filtered_engine(
    snapshot: &LibrarySnapshot,
    filter: &FilterArgs,
) -> Result<TagFilterEngine, CommandError> {
    let mut engine = TagFilterEngine::from_images(&snapshot.images);
    let states = filter
        .with
        .iter()
        .map(|tag| (TagId::real(tag.trim()), TagState::Whitelisted))
        .chain(
            filter
                .without
                .iter()
                .map(|tag| (TagId::real(tag.trim()), TagState::Blacklisted)),
        );
    for (id, state) in states {
        engine
            .set_tag_state(&id, state)
            .map_err(|error| CommandError::Usage(error.to_string()))?;
    }
    if let Some(untagged) = filter.untagged {
        let state = match untagged {
            UntaggedArg::Only => TagState::Whitelisted,
            UntaggedArg::Hide => TagState::Blacklisted,
        };
        engine
            .set_tag_state(&TagId::Untagged, state)
            .map_err(|error| CommandError::Usage(error.to_string()))?;
    }
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use tagshelf_domain::{Dimensions, ImageRecord};

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    fn image(path: &str, tags: &[&str]) -> ImageRecord {
        ImageRecord {
            path: PathBuf::from(path),
            tags: tags.iter().map(|tag| tag.to_string()).collect::<BTreeSet<_>>(),
            byte_size: 1,
            dimensions: Dimensions::UNKNOWN,
            mtime: 0.0,
            ctime: 0.0,
        }
    }

    #[test]
    fn parse_list_with_filters_and_global_roots() {
        let cli = parse(&[
            "tagshelf", "list", "--with", "sea", "--without", "work", "--untagged", "hide",
            "--root", "/a", "--root", "/b", "--long",
        ])
        .expect("list should parse");

        assert_eq!(cli.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        let Command::List { filter, long } = cli.command else {
            panic!("expected list");
        };
        assert!(long);
        assert_eq!(filter.with, vec!["sea".to_string()]);
        assert_eq!(filter.without, vec!["work".to_string()]);
        assert_eq!(filter.untagged, Some(UntaggedArg::Hide));
    }

    #[test]
    fn parse_tag_requires_paths() {
        assert!(parse(&["tagshelf", "tag", "--add", "x"]).is_err());
        let cli = parse(&["tagshelf", "tag", "--add", "x", "--dry-run", "a.jpg"])
            .expect("tag should parse");
        assert!(matches!(cli.command, Command::Tag { dry_run: true, .. }));
    }

    #[test]
    fn parse_rejects_unknown_sort() {
        assert!(parse(&["tagshelf", "tags", "--sort", "size"]).is_err());
        let cli = parse(&["tagshelf", "tags", "--sort", "count"]).expect("tags should parse");
        assert!(matches!(
            cli.command,
            Command::Tags {
                sort: SortArg::Count,
                ..
            }
        ));
    }

    #[test]
    fn parse_config_subcommands() {
        let cli = parse(&["tagshelf", "config", "add-dir", "/photos"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigAction::AddDir { .. }
            }
        ));
    }

    #[test]
    fn filter_args_drive_the_engine() {
        let snapshot = LibrarySnapshot {
            images: vec![
                image("/p/a.jpg", &["sea", "work"]),
                image("/p/b.jpg", &["sea"]),
                image("/p/c.jpg", &[]),
            ],
        };
        let filter = FilterArgs {
            with: vec!["sea".to_string()],
            without: vec!["work".to_string()],
            untagged: None,
        };

        let mut engine = filtered_engine(&snapshot, &filter).expect("engine");
        let visible: Vec<_> = engine
            .recompute(&snapshot.images)
            .visible
            .iter()
            .map(|image| image.path.clone())
            .collect();
        assert_eq!(visible, vec![PathBuf::from("/p/b.jpg")]);

        let unknown = FilterArgs {
            with: vec!["nope".to_string()],
            ..FilterArgs::default()
        };
        assert!(matches!(
            filtered_engine(&snapshot, &unknown),
            Err(CommandError::Usage(_))
        ));
    }

    #[test]
    fn invalid_input_maps_to_usage() {
        assert!(matches!(
            CommandError::from_application("x", ApplicationError::InvalidInput("y".to_string())),
            CommandError::Usage(_)
        ));
        assert!(matches!(
            CommandError::from_application("x", ApplicationError::Busy),
            CommandError::Runtime(_)
        ));
    }
}
