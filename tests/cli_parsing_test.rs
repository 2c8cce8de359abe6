use clap::Parser;
use lab_agent::cli::commands::approvals::ApprovalsCommands;
use lab_agent::cli::commands::runs::RunsCommands;
use lab_agent::cli::commands::tools::ToolsCommands;
use lab_agent::cli::{Cli, Commands};
use lab_agent::{Priority, RunLevel};

#[test]
fn test_parse_run_with_flags() {
    let cli = Cli::try_parse_from([
        "lab-agent",
        "run",
        "Cooldown D14 and gate sweep",
        "--runlevel",
        "live",
        "--priority",
        "urgent",
        "-c",
        "window:21:00-07:00",
        "-c",
        "max_power=2mW",
        "--tag",
        "d14",
        "--owner",
        "alice",
    ])
    .unwrap();

    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.goal, "Cooldown D14 and gate sweep");
            assert_eq!(args.runlevel, RunLevel::Live);
            assert_eq!(args.priority, Priority::Urgent);
            assert_eq!(args.constraints, vec!["window:21:00-07:00", "max_power=2mW"]);
            assert_eq!(args.tags, vec!["d14"]);
            assert_eq!(args.owner.as_deref(), Some("alice"));
        }
        _ => panic!("Wrong top-level command"),
    }
    assert!(!cli.json);
}

#[test]
fn test_run_defaults_to_dry_run() {
    let cli = Cli::try_parse_from(["lab-agent", "run", "Calibrate lock-in"]).unwrap();
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.runlevel, RunLevel::DryRun);
            assert_eq!(args.priority, Priority::Normal);
            assert!(args.constraints.is_empty());
            assert!(args.task_id.is_none());
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_unknown_runlevel_is_rejected() {
    let err = Cli::try_parse_from(["lab-agent", "run", "x", "--runlevel", "turbo"]).unwrap_err();
    assert!(err.to_string().contains("unknown runlevel"));
}

#[test]
fn test_parse_request_execute() {
    let cli = Cli::try_parse_from([
        "lab-agent",
        "--json",
        "request",
        "Sweep gate -1 to 1 V on D14 tonight",
        "--execute",
        "-r",
        "sim",
    ])
    .unwrap();
    assert!(cli.json);
    match cli.command {
        Commands::Request(args) => {
            assert!(args.execute);
            assert_eq!(args.runlevel, RunLevel::Sim);
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_runs_subcommands() {
    let cli = Cli::try_parse_from(["lab-agent", "runs", "list", "--limit", "5"]).unwrap();
    match cli.command {
        Commands::Runs(args) => match args.command {
            RunsCommands::List { limit } => assert_eq!(limit, 5),
            _ => panic!("Wrong runs command"),
        },
        _ => panic!("Wrong top-level command"),
    }

    let cli = Cli::try_parse_from(["lab-agent", "runs", "resume", "tg_1", "--json"]).unwrap();
    assert!(cli.json);
    assert!(matches!(
        cli.command,
        Commands::Runs(args) if matches!(&args.command, RunsCommands::Resume { task_id } if task_id == "tg_1")
    ));
}

#[test]
fn test_parse_approval_reject_with_note() {
    let cli = Cli::try_parse_from([
        "lab-agent",
        "approvals",
        "reject",
        "tg_1",
        "--by",
        "pi",
        "--note",
        "fridge warming",
    ])
    .unwrap();
    match cli.command {
        Commands::Approvals(args) => match args.command {
            ApprovalsCommands::Reject { task_id, by, note } => {
                assert_eq!(task_id, "tg_1");
                assert_eq!(by.as_deref(), Some("pi"));
                assert_eq!(note.as_deref(), Some("fridge warming"));
            }
            _ => panic!("Wrong approvals command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_tools_and_init() {
    let cli = Cli::try_parse_from(["lab-agent", "tools", "health"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Tools(args) if matches!(args.command, ToolsCommands::Health)
    ));

    let cli = Cli::try_parse_from(["lab-agent", "init", "--force"]).unwrap();
    match cli.command {
        Commands::Init(args) => {
            assert!(args.force);
            assert_eq!(args.path.to_str(), Some("."));
        }
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
