//! Offline-fallback host binary.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  FileStore      TcpProbe        CommandInbox   SpoolQueue    │
//! │  (Storage)      (Connectivity)  (CommandSrc)   (WorkQueue)   │
//! │  LogEventSink   Diagnostics     SystemClock                  │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  Runtime: Debouncer · CommandGate · ModeController     │  │
//! │  │           FSM · TimerTable · SyncEngine                │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                                                              │
//! │  probe thread ─┐                                             │
//! │  console thread┴─▶ EventQueue ─▶ control task (executor)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `offline-fallback [DATA_DIR]`.  Configuration is read from
//! `DATA_DIR/config.json` when present.

use std::cell::RefCell;
use std::io::BufRead;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use offline_fallback::adapters::HostPorts;
use offline_fallback::adapters::log_sink::LogEventSink;
use offline_fallback::adapters::probe::TcpProbe;
use offline_fallback::adapters::time::SystemClock;
use offline_fallback::app::commands::AppRequest;
use offline_fallback::app::ports::{ConnectivityPort, EventSink};
use offline_fallback::app::runtime::Runtime;
use offline_fallback::app::subscription::EventBus;
use offline_fallback::command::parse::encode_envelope;
use offline_fallback::command::{CommandKind, CommandMessage};
use offline_fallback::config::{self, FallbackConfig};
use offline_fallback::diagnostics::{self, Diagnostics};
use offline_fallback::events::{EventQueue, InboundEvent};

/// Upper bound on how long the control task sleeps, so console flags and
/// freshly posted events are picked up promptly.
const POLL_MS: u64 = 50;

/// Flags the console thread raises for the control task.
#[derive(Default)]
struct ConsoleFlags {
    status: AtomicBool,
    quit: AtomicBool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("offline-fallback v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Config ─────────────────────────────────────────────
    let data_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| FallbackConfig::default().data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {data_dir}"))?;
    let mut cfg = config::load(&Path::new(&data_dir).join("config.json"))
        .context("loading config.json")?;
    cfg.data_dir = data_dir;

    diagnostics::install_panic_handler(Path::new(&cfg.data_dir).join("crash.log"));

    // ── 2. Adapters ───────────────────────────────────────────
    let ports = HostPorts::open(&cfg).context("opening durable store")?;
    let clock = SystemClock::new();

    let bus = EventBus::new();
    let mut log_sink = LogEventSink::new();
    let _log_sub = bus.subscribe(move |e| log_sink.emit(e));
    let diag = Rc::new(RefCell::new(Diagnostics::new()));
    let _diag_sub = {
        let diag = Rc::clone(&diag);
        bus.subscribe(move |e| diag.borrow_mut().emit(e))
    };

    // ── 3. Runtime ────────────────────────────────────────────
    let queue = Arc::new(EventQueue::new());
    let mut runtime = Runtime::new(&cfg, &queue, ports, bus);
    runtime.start(clock.now_ms());

    let flags = Arc::new(ConsoleFlags::default());
    spawn_probe_thread(&cfg, Arc::clone(&queue), Arc::clone(&flags))?;
    spawn_console_thread(&cfg, Arc::clone(&queue), Arc::clone(&flags))?;

    info!("ready; type `help` for console commands");

    // ── 4. Control loop ───────────────────────────────────────
    let runtime = Rc::new(RefCell::new(runtime));
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
    executor
        .spawn(status_loop(Rc::clone(&runtime), Rc::clone(&diag), Arc::clone(&flags), clock))
        .detach();
    futures_lite::future::block_on(executor.run(control_loop(Rc::clone(&runtime), &flags, clock)));

    info!("shutting down");
    Ok(())
}

type SharedRuntime<'q> = Rc<RefCell<Runtime<'q, HostPorts, EventBus>>>;

/// Process the queue and due timers, then sleep until the next deadline
/// (capped at [`POLL_MS`]).
async fn control_loop(runtime: SharedRuntime<'_>, flags: &ConsoleFlags, clock: SystemClock) {
    while !flags.quit.load(Ordering::Relaxed) {
        let now = clock.now_ms();
        let next = {
            let mut rt = runtime.borrow_mut();
            rt.process(now);
            rt.next_deadline()
        };
        let wait = next.map_or(POLL_MS, |d| d.saturating_sub(now).clamp(1, POLL_MS));
        async_io_mini::Timer::after(Duration::from_millis(wait)).await;
    }
}

/// Print a snapshot whenever the console asks for one.
async fn status_loop(
    runtime: SharedRuntime<'_>,
    diag: Rc<RefCell<Diagnostics>>,
    flags: Arc<ConsoleFlags>,
    clock: SystemClock,
) {
    loop {
        if flags.status.swap(false, Ordering::Relaxed) {
            let snap = runtime.borrow().snapshot(clock.now_ms());
            info!("STATUS | {:?}", snap);
            match serde_json::to_string(diag.borrow().report()) {
                Ok(json) => info!("STATUS | counters {json}"),
                Err(e) => warn!("STATUS | counters unavailable: {e}"),
            }
        }
        async_io_mini::Timer::after(Duration::from_millis(POLL_MS * 4)).await;
    }
}

/// Periodic reachability probe on its own thread; a blocked connect never
/// stalls the control loop.
fn spawn_probe_thread(
    cfg: &FallbackConfig,
    queue: Arc<EventQueue>,
    flags: Arc<ConsoleFlags>,
) -> Result<()> {
    let mut probe = TcpProbe::new(cfg.probe_host.clone(), cfg.probe_timeout_ms);
    let interval = Duration::from_millis(cfg.probe_interval_ms);
    std::thread::Builder::new()
        .name("probe".into())
        .spawn(move || {
            let clock = SystemClock::new();
            while !flags.quit.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                let reachable = probe.probe_now().unwrap_or_else(|e| {
                    log::debug!("probe error: {e}");
                    false
                });
                queue.post(InboundEvent::Connectivity {
                    reachable,
                    at_ms: clock.now_ms(),
                });
            }
        })
        .context("spawning probe thread")?;
    Ok(())
}

fn spawn_console_thread(
    cfg: &FallbackConfig,
    queue: Arc<EventQueue>,
    flags: Arc<ConsoleFlags>,
) -> Result<()> {
    let psk = cfg.command_psk.clone();
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let clock = SystemClock::new();
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                match parse_console_line(line.trim(), clock.now_ms(), psk.as_deref()) {
                    ConsoleAction::Post(ev) => {
                        queue.post(ev);
                    }
                    ConsoleAction::Print(text) => println!("{text}"),
                    ConsoleAction::Status => flags.status.store(true, Ordering::Relaxed),
                    ConsoleAction::Quit => break,
                    ConsoleAction::Nothing => {}
                }
            }
            flags.quit.store(true, Ordering::Relaxed);
        })
        .context("spawning console thread")?;
    Ok(())
}

enum ConsoleAction {
    Post(InboundEvent),
    Print(String),
    Status,
    Quit,
    Nothing,
}

const HELP: &str = "\
commands:
  sms <sender> <body>        deliver an SMS command (e.g. OFFLINE-123456)
  envelope <json>            deliver a JSON command envelope
  sign offline|online <otp>  print a signed envelope for the configured key
  net up|down                inject a raw connectivity report
  probe                      probe connectivity now
  sync                       force a return-to-online sync
  resume                     re-read the pending command slot
  status                     print the mode snapshot and counters
  quit";

fn parse_console_line(line: &str, now_ms: u64, psk: Option<&str>) -> ConsoleAction {
    let (verb, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match verb {
        "" => ConsoleAction::Nothing,
        "help" => ConsoleAction::Print(HELP.into()),
        "sms" => match rest.split_once(' ') {
            Some((sender, body)) => ConsoleAction::Post(InboundEvent::Command(
                CommandMessage::sms(sender, body.trim(), now_ms),
            )),
            None => ConsoleAction::Print("usage: sms <sender> <body>".into()),
        },
        "envelope" => {
            ConsoleAction::Post(InboundEvent::Command(CommandMessage::envelope(rest, now_ms)))
        }
        "sign" => {
            let mut parts = rest.split_whitespace();
            let kind = match parts.next() {
                Some("offline") => CommandKind::EnableOffline,
                Some("online") => CommandKind::EnableOnline,
                _ => return ConsoleAction::Print("usage: sign offline|online <otp>".into()),
            };
            match parts.next() {
                Some(otp) => {
                    ConsoleAction::Print(encode_envelope(kind, otp, psk.map(str::as_bytes)))
                }
                None => ConsoleAction::Print("usage: sign offline|online <otp>".into()),
            }
        }
        "net" => match rest {
            "up" | "down" => ConsoleAction::Post(InboundEvent::Connectivity {
                reachable: rest == "up",
                at_ms: now_ms,
            }),
            _ => ConsoleAction::Print("usage: net up|down".into()),
        },
        "probe" => ConsoleAction::Post(InboundEvent::Request(AppRequest::ProbeNow)),
        "sync" => ConsoleAction::Post(InboundEvent::Request(AppRequest::ForceSync)),
        "resume" => ConsoleAction::Post(InboundEvent::Request(AppRequest::ResumeForeground)),
        "status" => ConsoleAction::Status,
        "quit" | "exit" => ConsoleAction::Quit,
        other => ConsoleAction::Print(format!("unknown command `{other}`; try `help`")),
    }
}
