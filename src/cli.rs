use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command, time::Duration};

use crate::config::DaemonConfigState;
use crate::{ipc, sim, transport};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("slidectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op":"shutdown"})),
        Some("status") => request(serde_json::json!({"op":"status"})),
        Some("reload") => request(serde_json::json!({"op":"reload"})),
        Some("list") => request(serde_json::json!({"op":"list"})),
        Some("doctor") => request(serde_json::json!({"op":"doctor"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: slidectl use <profile_name>"))?;
            request(serde_json::json!({"op":"use","profile":name}))
        }

        Some("pointer") => {
            // usage:
            //   slidectl pointer down 120 40
            //   slidectl pointer cancel
            let phase: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: slidectl pointer <down|move|up|cancel> <x> <y>"))?;
            if !matches!(phase.as_str(), "down" | "move" | "up" | "cancel") {
                return Err(anyhow!("unknown pointer phase: {phase}"));
            }
            let x: f64 = pargs.free_from_str().unwrap_or(0.0);
            let y: f64 = pargs.free_from_str().unwrap_or(0.0);
            request(serde_json::json!({"op":"pointer","phase":phase,"x":x,"y":y}))
        }

        Some("layout") => {
            let width: f64 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: slidectl layout <width_px>"))?;
            request(serde_json::json!({"op":"layout","width":width}))
        }

        Some("stops") => {
            let cfg = DaemonConfigState::load_or_install_default()?;
            let width: f64 = pargs
                .free_from_str()
                .unwrap_or(cfg.profile.track.width);
            let track = cfg.profile.track(width);
            for (i, s) in track.stops().iter().enumerate() {
                println!("{:>2}  {s:.1}", i + 1);
            }
            Ok(())
        }

        Some("simulate") => {
            let hold_ms: u64 = pargs.opt_value_from_str("--hold-ms")?.unwrap_or(400);
            let from_x: f64 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: slidectl simulate <from_x> <to_x> [--hold-ms N]"))?;
            let to_x: f64 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: slidectl simulate <from_x> <to_x> [--hold-ms N]"))?;
            let cfg = DaemonConfigState::load_or_install_default()?;
            sim::run_drag(&cfg.profile, from_x, to_x, Duration::from_millis(hold_ms))
        }

        Some("emit") => {
            // usage:
            //   slidectl emit fade 0.25
            //   slidectl emit sequence 4
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: slidectl emit <fade|sequence> <value>"))?;
            let cfg = DaemonConfigState::load_or_install_default()?;
            let p = &cfg.profile;
            let (topic, payload) = match what.as_str() {
                "fade" => {
                    let v: f64 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: slidectl emit fade <0..1>"))?;
                    (
                        p.transport.fade_topic.clone(),
                        crate::message::Outbound::Position(v).payload(),
                    )
                }
                "sequence" => {
                    let n: usize = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: slidectl emit sequence <1..N>"))?;
                    if n == 0 || n > p.track.stop_count {
                        return Err(anyhow!(
                            "sequence must be within 1..={}",
                            p.track.stop_count
                        ));
                    }
                    (
                        p.transport.control_topic.clone(),
                        crate::message::Outbound::SequenceTrigger(n - 1).payload(),
                    )
                }
                other => return Err(anyhow!("unknown emit kind: {other}")),
            };
            transport::publish_once(&p.transport, &topic, &payload)?;
            println!("ok: {topic} <- {payload}");
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

fn print_help() {
    println!(
        r#"slidectl — two-point snapping slider controller

USAGE:
  slidectl help [command]                     Show general or command-specific help
  slidectl start                              Start the daemon
  slidectl stop                               Stop the daemon
  slidectl status                             Show daemon and slider state
  slidectl reload                             Reload active profile
  slidectl use <name>                         Switch active profile
  slidectl list                               List profiles
  slidectl doctor                             Diagnose devices and broker settings
  slidectl pointer <down|move|up|cancel> X Y  Inject pointer input (container px)
  slidectl layout <width>                     Set the track width in px
  slidectl stops [width]                      Print stop positions
  slidectl simulate <from> <to> [--hold-ms N] Run an offline drag and print messages
  slidectl emit fade <0..1>                   Publish one fade value
  slidectl emit sequence <n>                  Publish "Initialize Sequence n"

TIPS:
  - Profiles: ~/.config/slidectl/profiles
  - Active profile pointer: ~/.config/slidectl/active
  - RUST_LOG=debug shows every gesture transition and publish
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: slidectl start\nStarts the background daemon."),
        "stop" => println!("usage: slidectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: slidectl status\nShows active profile, devices, socket, and slider phase/head/tail/stops."
        ),
        "reload" => println!(
            "usage: slidectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: slidectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: slidectl list\nLists available profiles."),
        "doctor" => println!(
            "usage: slidectl doctor\nChecks input permissions, lists touch devices and broker settings."
        ),
        "pointer" => println!(
            "usage: slidectl pointer <down|move|up|cancel> <x> <y>\nFeeds one pointer event to the daemon, in container pixels."
        ),
        "layout" => println!(
            "usage: slidectl layout <width>\nRecomputes stops for a new track width and rests the slider."
        ),
        "stops" => println!(
            "usage: slidectl stops [width]\nPrints stop positions for the active profile."
        ),
        "simulate" => println!(
            "usage: slidectl simulate <from_x> <to_x> [--hold-ms N]\nDrags from <from_x> to <to_x> over N ms, releases, and prints outbound messages until settled."
        ),
        "emit" => println!("usage:\n  slidectl emit fade <0..1>\n  slidectl emit sequence <n>"),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
