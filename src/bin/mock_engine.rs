//! Mock engine binary for integration testing
//!
//! Serves the line-delimited JSON control protocol over TCP with an
//! in-memory device: a clipboard, radio switches and a screen. Prints
//! `mock engine listening at: ADDR` once bound, so tests can start it on
//! port 0 and read the real port from stdout.

use std::collections::HashSet;
use std::io::Write;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use serde_json::{json, Map, Value};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vflowctl::control::codec::{read_line, write_line};
use vflowctl::Error;

#[derive(Parser)]
#[command(name = "mock_engine", about = "In-memory stand-in for the vFlow core engine")]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind, 0 picks a free one
    #[arg(long, default_value_t = 19999)]
    port: u16,

    /// Answer `target.method` with a permission error (repeatable)
    #[arg(long = "deny", value_name = "TARGET.METHOD")]
    deny: Vec<String>,
}

#[derive(Default)]
struct Device {
    clipboard: String,
    wifi: bool,
    bluetooth: bool,
    nfc: bool,
    screen_on: bool,
    typed: String,
}

struct Engine {
    device: Mutex<Device>,
    denied: HashSet<String>,
    shutdown: CancellationToken,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mock_engine=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    match serve(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: Args) -> vflowctl::Result<()> {
    let listener = TcpListener::bind((args.host.as_str(), args.port)).await?;
    println!("mock engine listening at: {}", listener.local_addr()?);
    std::io::stdout().flush()?;

    let engine = Arc::new(Engine {
        device: Mutex::new(Device {
            screen_on: true,
            ..Device::default()
        }),
        denied: args.deny.into_iter().collect(),
        shutdown: CancellationToken::new(),
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tracing::info!("Client connected: {}", peer);
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    match handle_client(stream, &engine).await {
                        Ok(()) | Err(Error::TransportClosed) => tracing::info!("Client {} left", peer),
                        Err(e) => tracing::warn!("Client {} dropped: {}", peer, e),
                    }
                });
            }
            _ = engine.shutdown.cancelled() => {
                tracing::info!("Exit requested, shutting down");
                return Ok(());
            }
        }
    }
}

async fn handle_client(stream: TcpStream, engine: &Engine) -> vflowctl::Result<()> {
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let line = tokio::select! {
            line = read_line(&mut reader) => line?,
            _ = engine.shutdown.cancelled() => return Ok(()),
        };

        // Unparseable lines get no answer, like the real engine
        let Ok(Value::Object(request)) = serde_json::from_slice::<Value>(&line) else {
            tracing::warn!("Ignoring malformed request: {}", String::from_utf8_lossy(&line));
            continue;
        };

        let target = request.get("target").and_then(Value::as_str).unwrap_or("");
        let method = request.get("method").and_then(Value::as_str).unwrap_or("");
        let params = match request.get("params") {
            Some(Value::Object(params)) => params.clone(),
            _ => Map::new(),
        };
        let shown = Value::Object(params.clone());
        tracing::debug!("{}.{} {}", target, method, shown);

        let response = engine.handle(target, method, &params);
        write_line(&mut writer, response.to_string().as_bytes()).await?;

        if target == "system" && method == "exit" {
            engine.shutdown.cancel();
            return Ok(());
        }
    }
}

fn ok(payload: Value) -> Value {
    let mut response = json!({ "success": true });
    if let (Some(out), Value::Object(fields)) = (response.as_object_mut(), payload) {
        out.extend(fields);
    }
    response
}

fn fail(error: impl Into<String>) -> Value {
    json!({ "success": false, "error": error.into() })
}

impl Engine {
    fn handle(&self, target: &str, method: &str, params: &Map<String, Value>) -> Value {
        if self.denied.contains(&format!("{}.{}", target, method)) {
            return fail("permission denied");
        }

        let Ok(mut device) = self.device.lock() else {
            return fail("engine state poisoned");
        };
        let text = |key: &str| params.get(key).and_then(Value::as_str).map(str::to_string);
        let flag = |key: &str| params.get(key).and_then(Value::as_bool);

        match (target, method) {
            ("system", "ping") => ok(json!({ "message": "pong from mock engine", "uid": 2000 })),
            ("system", "exec") => match text("cmd").filter(|c| !c.trim().is_empty()) {
                Some(cmd) => ok(json!({ "output": format!("mock: {}\n", cmd) })),
                None => fail("Command is empty"),
            },
            ("system", "exit") => ok(json!({})),
            ("system", _) => ok(json!({ "uid": 2000 })),

            ("clipboard", "getClipboard") => ok(json!({ "text": device.clipboard })),
            ("clipboard", "setClipboard") => match text("text") {
                Some(value) => {
                    device.clipboard = value;
                    ok(json!({}))
                }
                None => fail("Failed to set clipboard"),
            },

            ("input", "tap") | ("input", "swipe") | ("input", "key") => ok(json!({})),
            ("input", "inputText") => {
                device.typed.push_str(&text("text").unwrap_or_default());
                ok(json!({}))
            }

            ("wifi", _) => switch(&mut device.wifi, method, "Wifi", flag("enabled")),
            ("bluetooth_manager", _) => {
                switch(&mut device.bluetooth, method, "Bluetooth", flag("enabled"))
            }
            ("nfc", _) => switch(&mut device.nfc, method, "Nfc", flag("enabled")),

            ("power", "wakeUp") => {
                device.screen_on = true;
                ok(json!({}))
            }
            ("power", "goToSleep") => {
                device.screen_on = false;
                ok(json!({}))
            }

            ("activity", "forceStopPackage") => match text("package") {
                Some(package) => ok(json!({ "package": package })),
                None => fail("Package name is empty"),
            },
            ("activity_task", "getForegroundApp") => {
                ok(json!({ "package": "com.android.launcher", "activity": ".Launcher" }))
            }
            ("activity_task", "getRunningTasks") => ok(json!({ "tasks": [] })),
            ("activity_task", "removeTask") => ok(json!({})),

            ("connectivity", "getActiveNetworkInfo") => {
                ok(json!({ "type": if device.wifi { "WIFI" } else { "NONE" } }))
            }
            ("connectivity", "isDefaultNetworkActive") | ("connectivity", "isNetworkConnected") => {
                ok(json!({ "connected": device.wifi }))
            }

            ("location", "getAllProviders") => ok(json!({ "providers": ["gps", "network"] })),
            ("location", _) => ok(json!({ "enabled": false })),

            ("alarm", "getNextAlarm") => ok(json!({ "time": null })),
            ("alarm", "hasAlarm") => ok(json!({ "hasAlarm": false })),

            ("screenshot", "getScreenSize") => ok(json!({ "width": 1080, "height": 2400 })),
            ("screenshot", _) => fail("Screen capture is not available"),

            ("clipboard" | "input" | "power" | "activity" | "activity_task" | "connectivity"
            | "alarm", _) => fail(format!("Unknown method: {}", method)),

            _ => fail("No route"),
        }
    }
}

/// Shared handling of the `set*Enabled` / `isEnabled` / `toggle` radios
fn switch(state: &mut bool, method: &str, name: &str, enabled: Option<bool>) -> Value {
    if method == format!("set{}Enabled", name) {
        return match enabled {
            Some(enabled) => {
                *state = enabled;
                ok(json!({ "enabled": enabled }))
            }
            None => fail("Missing 'enabled' parameter"),
        };
    }
    match method {
        "isEnabled" => ok(json!({ "enabled": *state })),
        "toggle" => {
            *state = !*state;
            ok(json!({ "enabled": *state }))
        }
        _ => fail(format!("Unknown method: {}", method)),
    }
}
