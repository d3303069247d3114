//! `splice`: build, check and inspect structural fingerprints

mod commands;
mod config;

use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use commands::{BuildArgs, CheckStatus};
use config::SpliceConfig;
use splice_scan::Phase;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let classpath = Arg::new("classpath")
        .long("classpath")
        .required(true)
        .action(ArgAction::Append)
        .value_parser(value_parser!(PathBuf))
        .help("Directory of class files; repeat for more, first is consulted first");
    let fingerprint = Arg::new("fingerprint")
        .long("fingerprint")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Persisted fingerprint file");

    Command::new("splice")
        .version(splice_scan::VERSION)
        .about("Structural fingerprints for instrumentation plugins")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("warn")
                .help("Tracing filter, e.g. info or splice_scan=debug"),
        )
        .subcommand(
            Command::new("build")
                .about("Build the fingerprint a plugin requires")
                .arg(classpath.clone())
                .arg(
                    Arg::new("root")
                        .long("root")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Entry class of the plugin, e.g. com.acme.Advice"),
                )
                .arg(
                    Arg::new("owned")
                        .long("owned")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of the plugin's own classes, left out of the fingerprint"),
                )
                .arg(
                    Arg::new("depth")
                        .long("depth")
                        .value_parser(value_parser!(usize))
                        .help("Classes to deepen after the roots"),
                )
                .arg(
                    Arg::new("phase")
                        .long("phase")
                        .value_parser(|s: &str| s.parse::<Phase>().map_err(|e| e.to_string()))
                        .help("Weakest phase kept: load, call or none"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Check a fingerprint against live classes (exit 0 compatible, 1 incompatible, 2 undetermined)")
                .arg(fingerprint.clone())
                .arg(classpath),
        )
        .subcommand(
            Command::new("dump")
                .about("Print a fingerprint")
                .arg(fingerprint)
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn paths(args: &ArgMatches, id: &str) -> Vec<PathBuf> {
    args.get_many::<PathBuf>(id).into_iter().flatten().cloned().collect()
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let config = SpliceConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    let mut out = std::io::stdout().lock();

    match matches.subcommand() {
        Some(("build", args)) => {
            let build = BuildArgs {
                classpath: paths(args, "classpath"),
                roots: args.get_many::<String>("root").into_iter().flatten().cloned().collect(),
                owned: args.get_one::<PathBuf>("owned").cloned(),
                depth: args.get_one::<usize>("depth").copied(),
                phase: args.get_one::<Phase>("phase").copied(),
                out: args.get_one::<PathBuf>("out").cloned().unwrap_or_default(),
            };
            commands::build(&config, build, &mut out)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("check", args)) => {
            let fingerprint = args.get_one::<PathBuf>("fingerprint").cloned().unwrap_or_default();
            let status = commands::check(&config, &fingerprint, &paths(args, "classpath"), &mut out)?;
            Ok(match status {
                CheckStatus::Compatible => ExitCode::SUCCESS,
                other => ExitCode::from(other as u8),
            })
        }
        Some(("dump", args)) => {
            let fingerprint = args.get_one::<PathBuf>("fingerprint").cloned().unwrap_or_default();
            commands::dump(&fingerprint, args.get_flag("json"), &mut out)?;
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::from(CheckStatus::Undetermined as u8)),
    }
}

fn main() -> ExitCode {
    let matches = cli().get_matches();

    let level = matches.get_one::<String>("log-level").map_or("warn", String::as_str);
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(CheckStatus::Undetermined as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn build_arguments_parse() {
        let matches = cli()
            .try_get_matches_from([
                "splice", "build", "--classpath", "a", "--classpath", "b", "--root", "p.Advice", "--phase",
                "LOAD", "--out", "fp.spfp",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(paths(args, "classpath"), vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(args.get_one::<Phase>("phase"), Some(&Phase::Load));
    }

    #[test]
    fn unknown_phase_is_rejected() {
        let result = cli().try_get_matches_from([
            "splice", "build", "--classpath", "a", "--root", "p.A", "--phase", "later", "--out", "x",
        ]);
        assert!(result.is_err());
    }
}
