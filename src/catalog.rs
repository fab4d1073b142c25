//! Command catalog
//!
//! Declarative description of every capability the engine routes: which
//! targets exist, which methods each offers, and example arguments used to
//! pre-fill requests. Nothing here validates requests; the engine does that.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::control::Request;

/// Capability domains exposed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    System,
    Clipboard,
    Input,
    Wifi,
    BluetoothManager,
    Nfc,
    Power,
    Activity,
    ActivityTask,
    Connectivity,
    Location,
    Alarm,
    Screenshot,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Clipboard => "clipboard",
            Self::Input => "input",
            Self::Wifi => "wifi",
            Self::BluetoothManager => "bluetooth_manager",
            Self::Nfc => "nfc",
            Self::Power => "power",
            Self::Activity => "activity",
            Self::ActivityTask => "activity_task",
            Self::Connectivity => "connectivity",
            Self::Location => "location",
            Self::Alarm => "alarm",
            Self::Screenshot => "screenshot",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecArgs {
    pub cmd: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextArgs {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointArgs {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SwipeArgs {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    /// Gesture length in milliseconds
    pub duration: u64,
}

/// Android key code, e.g. 4 for BACK
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyArgs {
    pub code: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnabledArgs {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageArgs {
    pub package: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTasksArgs {
    pub max_tasks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArgs {
    pub task_id: i32,
}

/// 0 = mobile, 1 = WiFi
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTypeArgs {
    pub network_type: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderArgs {
    pub provider: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayArgs {
    pub display_id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureArgs {
    pub display_id: i32,
    pub format: String,
    pub quality: u8,
    pub include_base64: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFileArgs {
    pub display_id: i32,
    pub file_path: String,
    pub format: String,
}

/// A typed engine operation with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    // === system ===
    Ping,
    Exec(ExecArgs),
    Exit,

    // === clipboard ===
    GetClipboard,
    SetClipboard(TextArgs),

    // === input ===
    Tap(PointArgs),
    Swipe(SwipeArgs),
    Key(KeyArgs),
    InputText(TextArgs),

    // === radios ===
    SetWifiEnabled(EnabledArgs),
    WifiIsEnabled,
    WifiToggle,
    SetBluetoothEnabled(EnabledArgs),
    BluetoothIsEnabled,
    BluetoothToggle,
    SetNfcEnabled(EnabledArgs),
    NfcIsEnabled,
    NfcToggle,

    // === power ===
    WakeUp,
    GoToSleep,

    // === activities ===
    ForceStopPackage(PackageArgs),
    GetRunningTasks(RunningTasksArgs),
    GetForegroundApp,
    RemoveTask(TaskArgs),

    // === connectivity ===
    GetActiveNetworkInfo,
    IsDefaultNetworkActive,
    IsNetworkConnected(NetworkTypeArgs),

    // === location ===
    IsProviderEnabled(ProviderArgs),
    GetAllProviders,
    GetGpsStatus,
    GetNetworkLocationStatus,

    // === alarm ===
    GetNextAlarm,
    HasAlarm,

    // === screenshot ===
    GetScreenSize(DisplayArgs),
    CaptureScreen(CaptureArgs),
    CaptureScreenToFile(CaptureFileArgs),
}

impl Operation {
    pub fn target(&self) -> Target {
        match self {
            Self::Ping | Self::Exec(_) | Self::Exit => Target::System,
            Self::GetClipboard | Self::SetClipboard(_) => Target::Clipboard,
            Self::Tap(_) | Self::Swipe(_) | Self::Key(_) | Self::InputText(_) => Target::Input,
            Self::SetWifiEnabled(_) | Self::WifiIsEnabled | Self::WifiToggle => Target::Wifi,
            Self::SetBluetoothEnabled(_) | Self::BluetoothIsEnabled | Self::BluetoothToggle => {
                Target::BluetoothManager
            }
            Self::SetNfcEnabled(_) | Self::NfcIsEnabled | Self::NfcToggle => Target::Nfc,
            Self::WakeUp | Self::GoToSleep => Target::Power,
            Self::ForceStopPackage(_) => Target::Activity,
            Self::GetRunningTasks(_) | Self::GetForegroundApp | Self::RemoveTask(_) => {
                Target::ActivityTask
            }
            Self::GetActiveNetworkInfo | Self::IsDefaultNetworkActive | Self::IsNetworkConnected(_) => {
                Target::Connectivity
            }
            Self::IsProviderEnabled(_)
            | Self::GetAllProviders
            | Self::GetGpsStatus
            | Self::GetNetworkLocationStatus => Target::Location,
            Self::GetNextAlarm | Self::HasAlarm => Target::Alarm,
            Self::GetScreenSize(_) | Self::CaptureScreen(_) | Self::CaptureScreenToFile(_) => {
                Target::Screenshot
            }
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Exec(_) => "exec",
            Self::Exit => "exit",
            Self::GetClipboard => "getClipboard",
            Self::SetClipboard(_) => "setClipboard",
            Self::Tap(_) => "tap",
            Self::Swipe(_) => "swipe",
            Self::Key(_) => "key",
            Self::InputText(_) => "inputText",
            Self::SetWifiEnabled(_) => "setWifiEnabled",
            Self::SetBluetoothEnabled(_) => "setBluetoothEnabled",
            Self::SetNfcEnabled(_) => "setNfcEnabled",
            Self::WifiIsEnabled | Self::BluetoothIsEnabled | Self::NfcIsEnabled => "isEnabled",
            Self::WifiToggle | Self::BluetoothToggle | Self::NfcToggle => "toggle",
            Self::WakeUp => "wakeUp",
            Self::GoToSleep => "goToSleep",
            Self::ForceStopPackage(_) => "forceStopPackage",
            Self::GetRunningTasks(_) => "getRunningTasks",
            Self::GetForegroundApp => "getForegroundApp",
            Self::RemoveTask(_) => "removeTask",
            Self::GetActiveNetworkInfo => "getActiveNetworkInfo",
            Self::IsDefaultNetworkActive => "isDefaultNetworkActive",
            Self::IsNetworkConnected(_) => "isNetworkConnected",
            Self::IsProviderEnabled(_) => "isProviderEnabled",
            Self::GetAllProviders => "getAllProviders",
            Self::GetGpsStatus => "getGpsStatus",
            Self::GetNetworkLocationStatus => "getNetworkLocationStatus",
            Self::GetNextAlarm => "getNextAlarm",
            Self::HasAlarm => "hasAlarm",
            Self::GetScreenSize(_) => "getScreenSize",
            Self::CaptureScreen(_) => "captureScreen",
            Self::CaptureScreenToFile(_) => "captureScreenToFile",
        }
    }

    /// Arguments as the JSON object sent in `params`
    pub fn params(&self) -> Map<String, Value> {
        let value = match self {
            Self::Exec(args) => to_value(args),
            Self::SetClipboard(args) | Self::InputText(args) => to_value(args),
            Self::Tap(args) => to_value(args),
            Self::Swipe(args) => to_value(args),
            Self::Key(args) => to_value(args),
            Self::SetWifiEnabled(args)
            | Self::SetBluetoothEnabled(args)
            | Self::SetNfcEnabled(args) => to_value(args),
            Self::ForceStopPackage(args) => to_value(args),
            Self::GetRunningTasks(args) => to_value(args),
            Self::RemoveTask(args) => to_value(args),
            Self::IsNetworkConnected(args) => to_value(args),
            Self::IsProviderEnabled(args) => to_value(args),
            Self::GetScreenSize(args) => to_value(args),
            Self::CaptureScreen(args) => to_value(args),
            Self::CaptureScreenToFile(args) => to_value(args),
            _ => Value::Null,
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    pub fn to_request(&self) -> Request {
        Request::new(self.target().as_str(), self.method(), self.params())
    }
}

// Argument structs hold only strings, numbers and booleans, so this cannot fail.
fn to_value<T: Serialize>(args: &T) -> Value {
    serde_json::to_value(args).unwrap_or(Value::Null)
}

/// What the catalog knows about one (target, method) pair
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Description {
    pub label: String,
    pub example_params: Map<String, Value>,
}

impl Description {
    pub fn is_empty(&self) -> bool {
        self.label.is_empty() && self.example_params.is_empty()
    }
}

/// One catalog entry: an example operation and its human label
#[derive(Debug, Clone)]
pub struct Entry {
    pub operation: Operation,
    pub label: &'static str,
}

impl Entry {
    fn targets(&self, target: &str) -> bool {
        self.operation.target().as_str() == target
    }
}

/// Static lookup table of engine capabilities
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<Entry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// Every capability routed by the engine, with example arguments
    pub fn builtin() -> Self {
        use Operation::*;

        let entry = |operation, label| Entry { operation, label };
        let text = |s: &str| TextArgs { text: s.to_string() };

        Self {
            entries: vec![
                entry(Ping, "Ping"),
                entry(Exec(ExecArgs { cmd: "id".to_string() }), "Run shell command"),
                entry(Exit, "Exit core"),
                entry(GetClipboard, "Get clipboard"),
                entry(SetClipboard(text("Hello from vFlowCore Debugger")), "Set clipboard"),
                entry(Tap(PointArgs { x: 500, y: 500 }), "Tap"),
                entry(
                    Swipe(SwipeArgs {
                        x1: 500,
                        y1: 500,
                        x2: 500,
                        y2: 1000,
                        duration: 300,
                    }),
                    "Swipe",
                ),
                entry(Key(KeyArgs { code: 4 }), "Press BACK key"),
                entry(InputText(text("test")), "Input text"),
                entry(SetWifiEnabled(EnabledArgs { enabled: true }), "Enable WiFi"),
                entry(WifiIsEnabled, "WiFi enabled?"),
                entry(WifiToggle, "Toggle WiFi"),
                entry(SetBluetoothEnabled(EnabledArgs { enabled: true }), "Enable Bluetooth"),
                entry(BluetoothIsEnabled, "Bluetooth enabled?"),
                entry(BluetoothToggle, "Toggle Bluetooth"),
                entry(SetNfcEnabled(EnabledArgs { enabled: true }), "Enable NFC"),
                entry(NfcIsEnabled, "NFC enabled?"),
                entry(NfcToggle, "Toggle NFC"),
                entry(WakeUp, "Wake screen"),
                entry(GoToSleep, "Turn screen off"),
                entry(
                    ForceStopPackage(PackageArgs {
                        package: "com.example.app".to_string(),
                    }),
                    "Force stop app",
                ),
                entry(GetRunningTasks(RunningTasksArgs { max_tasks: 20 }), "Running tasks"),
                entry(GetForegroundApp, "Foreground app"),
                entry(RemoveTask(TaskArgs { task_id: 1 }), "Remove task"),
                entry(GetActiveNetworkInfo, "Active network"),
                entry(IsDefaultNetworkActive, "Default network active?"),
                entry(IsNetworkConnected(NetworkTypeArgs { network_type: 1 }), "Network connected?"),
                entry(
                    IsProviderEnabled(ProviderArgs {
                        provider: "gps".to_string(),
                    }),
                    "Location provider enabled?",
                ),
                entry(GetAllProviders, "Location providers"),
                entry(GetGpsStatus, "GPS status"),
                entry(GetNetworkLocationStatus, "Network location status"),
                entry(GetNextAlarm, "Next alarm"),
                entry(HasAlarm, "Alarm set?"),
                entry(GetScreenSize(DisplayArgs { display_id: 0 }), "Screen size"),
                entry(
                    CaptureScreen(CaptureArgs {
                        display_id: 0,
                        format: "png".to_string(),
                        quality: 90,
                        include_base64: false,
                    }),
                    "Capture screen",
                ),
                entry(
                    CaptureScreenToFile(CaptureFileArgs {
                        display_id: 0,
                        file_path: "/sdcard/vflow_capture.png".to_string(),
                        format: "png".to_string(),
                    }),
                    "Capture screen to file",
                ),
            ],
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Target names in catalog order
    pub fn list_targets(&self) -> Vec<&'static str> {
        let mut targets: Vec<&'static str> = Vec::new();
        for entry in &self.entries {
            let name = entry.operation.target().as_str();
            if !targets.contains(&name) {
                targets.push(name);
            }
        }
        targets
    }

    /// Method names of a target in catalog order, empty for unknown targets
    pub fn list_methods(&self, target: &str) -> Vec<&'static str> {
        let mut methods: Vec<&'static str> = Vec::new();
        for entry in self.entries.iter().filter(|e| e.targets(target)) {
            let method = entry.operation.method();
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        methods
    }

    /// Example arguments and label, empty for unknown pairs
    pub fn describe(&self, target: &str, method: &str) -> Description {
        self.find(target, method)
            .map(|entry| Description {
                label: entry.label.to_string(),
                example_params: entry.operation.params(),
            })
            .unwrap_or_default()
    }

    /// Example operation for a pair
    pub fn find(&self, target: &str, method: &str) -> Option<&Entry> {
        self.entries
            .iter()
            .find(|entry| entry.targets(target) && entry.operation.method() == method)
    }
}
