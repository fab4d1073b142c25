//! Test plans
//!
//! A plan lists cases in three severity tiers. Tiers are cumulative: running
//! `regular` runs every `safe` case first, and `full` runs `safe`, then
//! `regular`, then its own cases, each in the order they are declared.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::catalog::{
    EnabledArgs, Operation, PackageArgs, PointArgs, SwipeArgs, TextArgs,
};
use crate::common::{Error, Result};
use crate::control::Request;

/// Severity tier of a test case
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// No observable side effect on the device
    Safe,
    /// Side effects that can be undone
    Regular,
    /// Disruptive operations: input injection, killing apps
    Full,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Safe, Tier::Regular, Tier::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Regular => "regular",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownTier(s.to_string()))
    }
}

/// One remote call to make and judge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub target: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub label: String,
}

impl TestCase {
    pub fn new(
        target: impl Into<String>,
        method: impl Into<String>,
        params: Map<String, Value>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            params,
            label: label.into(),
        }
    }

    pub fn from_operation(operation: Operation, label: impl Into<String>) -> Self {
        Self::new(
            operation.target().as_str(),
            operation.method(),
            operation.params(),
            label,
        )
    }

    pub fn request(&self) -> Request {
        Request::new(self.target.as_str(), self.method.as_str(), self.params.clone())
    }
}

/// Cases grouped by the tier that introduces them
///
/// Loaded from YAML:
/// ```yaml
/// name: smoke
/// safe:
///   - { target: system, method: ping, label: Ping }
/// regular:
///   - target: clipboard
///     method: setClipboard
///     params: { text: hello }
///     label: Set clipboard
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub safe: Vec<TestCase>,
    #[serde(default)]
    pub regular: Vec<TestCase>,
    #[serde(default)]
    pub full: Vec<TestCase>,
}

impl TestPlan {
    /// The stock plan exercising the engine's main capabilities
    pub fn builtin() -> Self {
        use Operation::*;

        let case = TestCase::from_operation;
        let enabled = |enabled| EnabledArgs { enabled };

        Self {
            name: Some("builtin".to_string()),
            safe: vec![case(Ping, "Ping"), case(GetClipboard, "Get clipboard")],
            regular: vec![
                case(
                    SetClipboard(TextArgs {
                        text: "Auto Test from vFlowCore Debugger".to_string(),
                    }),
                    "Set clipboard",
                ),
                case(SetWifiEnabled(enabled(true)), "Enable WiFi"),
                case(SetWifiEnabled(enabled(false)), "Disable WiFi"),
                case(SetBluetoothEnabled(enabled(true)), "Enable Bluetooth"),
                case(SetBluetoothEnabled(enabled(false)), "Disable Bluetooth"),
                case(WakeUp, "Wake screen"),
                case(GoToSleep, "Turn screen off"),
            ],
            full: vec![
                case(Tap(PointArgs { x: 500, y: 500 }), "Tap screen"),
                case(
                    Swipe(SwipeArgs {
                        x1: 500,
                        y1: 500,
                        x2: 500,
                        y2: 1000,
                        duration: 300,
                    }),
                    "Swipe screen",
                ),
                case(
                    InputText(TextArgs {
                        text: "test".to_string(),
                    }),
                    "Input text",
                ),
                case(
                    ForceStopPackage(PackageArgs {
                        package: "com.chaomixian.vflow".to_string(),
                    }),
                    "Force stop app",
                ),
            ],
        }
    }

    /// Load a plan from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse a plan from YAML text
    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse test plan: {}", e)))
    }

    /// Cases introduced by exactly this tier
    pub fn own_cases(&self, tier: Tier) -> &[TestCase] {
        match tier {
            Tier::Safe => &self.safe,
            Tier::Regular => &self.regular,
            Tier::Full => &self.full,
        }
    }

    /// Every case to run for a tier, tagged with the tier it belongs to
    pub fn resolve(&self, tier: Tier) -> Vec<(Tier, &TestCase)> {
        Tier::ALL
            .into_iter()
            .filter(|t| *t <= tier)
            .flat_map(|t| self.own_cases(t).iter().map(move |case| (t, case)))
            .collect()
    }
}
