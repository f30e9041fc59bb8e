use clap::{
    crate_authors, crate_description, crate_name, crate_version, value_parser, Arg, ArgAction,
    ArgMatches, Command,
};
use colored::Colorize;
use dsp_pynq::PackageTarget;
use std::path::PathBuf;

// The CLI layer should only parse inputs and forward them to library code.
fn main() -> miette::Result<()> {
    let matches = Command::new(crate_name!())
        .about(crate_description!())
        .author(crate_authors!())
        .version(crate_version!())
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("install")
                .about("Copies the notebooks and bitstreams into the notebook directory")
                .arg(
                    Arg::new("destination")
                        .help("Notebook directory to install into [default: $PYNQ_JUPYTER_NOTEBOOKS]")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("package-dir")
                        .long("package-dir")
                        .help("Package data directory holding notebooks/ and bitstreams/")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Show what would be installed without writing anything")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("package")
                .about("Builds the board's bitstreams and copies them into the package")
                .arg(
                    Arg::new("root")
                        .long("root")
                        .help("Repository root")
                        .default_value(".")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("board")
                        .long("board")
                        .help("Board to build for [default: $BOARD]"),
                )
                .arg(
                    Arg::new("deploy")
                        .long("deploy")
                        .help("Install straight into the live notebook directory instead")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("notebook-dir")
                        .long("notebook-dir")
                        .help("Notebook directory used with --deploy [default: $PYNQ_JUPYTER_NOTEBOOKS]")
                        .requires("deploy")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .get_matches();

    let is_verbose = matches.get_flag("verbose");

    let level = if is_verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match matches.subcommand() {
        Some(("install", args)) => handle_install(args, is_verbose),
        Some(("package", args)) => handle_package(args, is_verbose),
        _ => unreachable!(),
    }
}

fn handle_install(args: &ArgMatches, is_verbose: bool) -> miette::Result<()> {
    let destination = args.get_one::<PathBuf>("destination").map(PathBuf::as_path);
    let package_dir = args.get_one::<PathBuf>("package-dir").map(PathBuf::as_path);

    if args.get_flag("dry-run") {
        dsp_pynq::preview_install(package_dir, destination)?;

        return Ok(());
    }

    let report = dsp_pynq::install_notebooks(package_dir, destination)?;

    if is_verbose {
        for file in &report.files {
            println!("{} {}", "create".green(), file.display());
        }
    }

    let verb = if report.replaced { "replaced" } else { "installed" };

    println!(
        "{} {} ({} files)",
        verb.green(),
        report.project_dir.display().to_string().blue(),
        report.files.len()
    );

    Ok(())
}

fn handle_package(args: &ArgMatches, is_verbose: bool) -> miette::Result<()> {
    let root = args
        .get_one::<PathBuf>("root")
        .expect("root has a default value");
    let board = args.get_one::<String>("board").map(String::as_str);

    let target = if args.get_flag("deploy") {
        PackageTarget::Deploy {
            notebook_dir: args.get_one::<PathBuf>("notebook-dir").cloned(),
        }
    } else {
        PackageTarget::Package
    };

    let report = dsp_pynq::build_package(root, board, &target)?;

    if is_verbose {
        for file in &report.files {
            println!("{} {}", "copy".green(), file.display());
        }
    }

    println!(
        "{} {} ({} files)",
        "packaged".green(),
        report.board.blue(),
        report.files.len()
    );

    if let Some((path, manifest)) = &report.manifest {
        println!(
            "{} {} ({} entries)",
            "manifest".green(),
            path.display(),
            manifest.files.len()
        );
    }

    Ok(())
}
