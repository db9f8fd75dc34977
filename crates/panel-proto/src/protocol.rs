//! Wire types of the control server's REST surface and push stream.
//!
//! The server hands out values parsed from text files, so numbers frequently
//! arrive as strings and names as numbers.  Decoding here is
//! forgiving: catalogs and snapshots never fail as a whole because one field
//! is odd, they fall back to the documented defaults instead.  Push events
//! are stricter; a payload missing a required field is rejected and dropped
//! by the caller.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{CommandError, EventError};

pub type LocoId = u32;

/// Function slots per locomotive (indices 0..=27).
pub const FUNCTION_COUNT: u8 = 28;
/// Full-scale speed in protocol units.
pub const SPEED_MAX: u16 = 1000;
/// km/h shown at full scale when the catalog has no `tachomax`.
pub const DEFAULT_TACHOMAX: u32 = 200;
/// Portrait used when a locomotive names no icon.
pub const DEFAULT_LOCO_ICON: &str = "leeres Gleis";
/// Function icon families start numbering positional defaults here.
pub const FUNCTION_ICON_BASE: u32 = 50;
/// Locomotive id the server expects on list-management events.
pub const INFO_EVENT_LOCO: LocoId = 1;

pub mod endpoints {
    pub const LOCO_LIST: &str = "/api/loco_list";
    pub const LOCO_STATE: &str = "/api/loco_state";
    pub const SWITCH_LIST: &str = "/api/switch_list";
    pub const SWITCH_STATE: &str = "/api/switch_state";
    pub const SYSTEM_STATE: &str = "/api/system_state";
    pub const EVENTS: &str = "/api/events";
    pub const CONTROL_EVENT: &str = "/api/control_event";
    pub const KEYBOARD_EVENT: &str = "/api/keyboard_event";
    pub const STOP_BUTTON: &str = "/api/stop_button";
    pub const INFO_EVENTS: &str = "/api/info_events";
}

// ── Direction ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// Numeric form used on the wire (1 forward, 2 reverse).
    pub fn wire(self) -> u8 {
        match self {
            Self::Forward => 1,
            Self::Reverse => 2,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }

    /// `2`, `"2"` and `"reverse"` mean reverse; everything else is forward.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.as_i64() == Some(2) => Self::Reverse,
            Value::String(s) => {
                let s = s.trim();
                if s == "2" || s.eq_ignore_ascii_case("reverse") {
                    Self::Reverse
                } else {
                    Self::Forward
                }
            }
            _ => Self::Forward,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.wire())
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

// ── Locomotive catalog ────────────────────────────────────────────────────────

/// Icon family of one function slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FunctionDescriptor {
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub typ: Option<u32>,
    #[serde(default, rename = "type", deserialize_with = "de::opt_u32")]
    pub kind: Option<u32>,
}

impl FunctionDescriptor {
    /// `typ`, then `type`.
    pub fn icon_id(&self) -> Option<u32> {
        self.typ.or(self.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Locomotive {
    pub uid: LocoId,
    pub name: Option<String>,
    pub icon: Option<String>,
    pub bild: Option<String>,
    pub tachomax: Option<u32>,
    pub functions: BTreeMap<u8, FunctionDescriptor>,
}

impl Locomotive {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Lok {}", self.uid),
        }
    }

    /// `icon`, then `bild`, then the empty-track portrait.
    pub fn icon_key(&self) -> &str {
        self.icon
            .as_deref()
            .or(self.bild.as_deref())
            .unwrap_or(DEFAULT_LOCO_ICON)
    }

    pub fn tachomax(&self) -> u32 {
        self.tachomax.unwrap_or(DEFAULT_TACHOMAX)
    }

    /// Icon family id for function `index`: the descriptor's id, or `50 + index`.
    pub fn function_icon_id(&self, index: u8) -> u32 {
        self.functions
            .get(&index)
            .and_then(FunctionDescriptor::icon_id)
            .unwrap_or(FUNCTION_ICON_BASE + u32::from(index))
    }

    /// km/h shown for a protocol speed value.
    pub fn kmh(&self, speed: u16) -> u32 {
        kmh(speed, self.tachomax())
    }
}

/// `round(speed × tachomax / 1000)`.
pub fn kmh(speed: u16, tachomax: u32) -> u32 {
    let speed = u64::from(speed.min(SPEED_MAX));
    ((speed * u64::from(tachomax) + u64::from(SPEED_MAX) / 2) / u64::from(SPEED_MAX)) as u32
}

#[derive(Deserialize)]
struct RawLocomotive {
    #[serde(default, deserialize_with = "de::opt_u32")]
    uid: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    icon: Option<String>,
    #[serde(default, deserialize_with = "de::opt_text")]
    bild: Option<String>,
    #[serde(default, deserialize_with = "de::opt_u32")]
    tachomax: Option<u32>,
    #[serde(default, alias = "functions")]
    funktionen: Value,
}

/// Locomotives keyed by uid. Iteration order (ascending uid) is catalog order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocoCatalog {
    locos: BTreeMap<LocoId, Locomotive>,
}

impl LocoCatalog {
    /// Accepts an object keyed by uid or a bare array; bad entries are skipped.
    pub fn from_value(value: Value) -> Self {
        let entries: Vec<(Option<String>, Value)> = match value {
            Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
            Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
            other => {
                debug!("loco catalog: unexpected shape {}", kind_of(&other));
                Vec::new()
            }
        };

        let mut locos = BTreeMap::new();
        for (key, entry) in entries {
            let raw: RawLocomotive = match serde_json::from_value(entry) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("loco catalog: skipping entry {:?}: {}", key, e);
                    continue;
                }
            };
            let uid = raw.uid.or_else(|| {
                key.as_deref()
                    .and_then(de::parse_int)
                    .and_then(|n| u32::try_from(n).ok())
            });
            let Some(uid) = uid else {
                debug!("loco catalog: entry {:?} has no usable uid", key);
                continue;
            };
            locos.insert(
                uid,
                Locomotive {
                    uid,
                    name: raw.name,
                    icon: raw.icon,
                    bild: raw.bild,
                    tachomax: raw.tachomax.filter(|t| *t > 0),
                    functions: function_table(raw.funktionen),
                },
            );
        }
        Self { locos }
    }

    pub fn get(&self, uid: LocoId) -> Option<&Locomotive> {
        self.locos.get(&uid)
    }

    pub fn contains(&self, uid: LocoId) -> bool {
        self.locos.contains_key(&uid)
    }

    pub fn first_uid(&self) -> Option<LocoId> {
        self.locos.keys().next().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locomotive> {
        self.locos.values()
    }

    pub fn len(&self) -> usize {
        self.locos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locos.is_empty()
    }
}

impl FromIterator<Locomotive> for LocoCatalog {
    fn from_iter<I: IntoIterator<Item = Locomotive>>(iter: I) -> Self {
        Self {
            locos: iter.into_iter().map(|l| (l.uid, l)).collect(),
        }
    }
}

impl<'de> Deserialize<'de> for LocoCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

fn function_table(value: Value) -> BTreeMap<u8, FunctionDescriptor> {
    let entries: Vec<(Option<i64>, Value)> = match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (de::parse_int(&k), v))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Some(i as i64), v))
            .collect(),
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|(idx, v)| {
            let idx = u8::try_from(idx?).ok().filter(|i| *i < FUNCTION_COUNT)?;
            if !v.is_object() {
                return None;
            }
            let desc: FunctionDescriptor = serde_json::from_value(v).ok()?;
            Some((idx, desc))
        })
        .collect()
}

// ── Locomotive state snapshot ─────────────────────────────────────────────────

/// Answer of `GET /api/loco_state?loco_id=<uid>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocoSnapshot {
    pub speed: u16,
    pub direction: Direction,
    pub functions: BTreeMap<u8, bool>,
}

impl LocoSnapshot {
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let speed = obj
            .get("speed")
            .and_then(de::number_from)
            .map(clamp_speed)
            .unwrap_or(0);
        let direction = obj
            .get("direction")
            .map(Direction::from_value)
            .unwrap_or_default();
        let mut functions = BTreeMap::new();
        match obj.get("functions") {
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    if let (Some(idx), Some(on)) = (function_index(de::parse_int(k)), de::flag_from(v)) {
                        functions.insert(idx, on);
                    }
                }
            }
            Some(Value::Array(items)) => {
                for (i, v) in items.iter().enumerate() {
                    if let (Some(idx), Some(on)) = (function_index(Some(i as i64)), de::flag_from(v)) {
                        functions.insert(idx, on);
                    }
                }
            }
            _ => {}
        }
        Self {
            speed,
            direction,
            functions,
        }
    }

    pub fn function(&self, index: u8) -> bool {
        self.functions.get(&index).copied().unwrap_or(false)
    }
}

impl<'de> Deserialize<'de> for LocoSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(&Value::deserialize(deserializer)?))
    }
}

fn function_index(idx: Option<i64>) -> Option<u8> {
    u8::try_from(idx?).ok().filter(|i| *i < FUNCTION_COUNT)
}

/// Clamp any integer into 0..=1000.
pub fn clamp_speed(raw: i64) -> u16 {
    raw.clamp(0, i64::from(SPEED_MAX)) as u16
}

// ── Switches ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchEntry {
    pub name: Option<String>,
}

/// Switch catalog in address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchCatalog {
    pub entries: Vec<SwitchEntry>,
}

impl SwitchCatalog {
    /// Accepts `{"artikel": [...]}` or a bare array. Non-object entries keep
    /// their slot so addresses stay aligned.
    pub fn from_value(value: &Value) -> Self {
        let items = match value {
            Value::Array(items) => items.as_slice(),
            Value::Object(obj) => match obj.get("artikel") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => &[],
            },
            _ => &[],
        };
        let entries = items
            .iter()
            .map(|item| SwitchEntry {
                name: item.get("name").and_then(de::text_from),
            })
            .collect();
        Self { entries }
    }

    /// Display label: the catalog name, or `address + 1`.
    pub fn label(&self, address: usize) -> String {
        self.entries
            .get(address)
            .and_then(|e| e.name.clone())
            .unwrap_or_else(|| (address + 1).to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'de> Deserialize<'de> for SwitchCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(&Value::deserialize(deserializer)?))
    }
}

/// Full switch-state snapshot, one 0/1 per address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchStates(pub Vec<u8>);

impl SwitchStates {
    /// Accepts `{"switch_state": [...]}` or a bare array. Unreadable values read as 0.
    pub fn from_value(value: &Value) -> Self {
        let items = match value {
            Value::Array(items) => items.as_slice(),
            Value::Object(obj) => match obj.get("switch_state") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => &[],
            },
            _ => &[],
        };
        Self(
            items
                .iter()
                .map(|v| match de::number_from(v) {
                    Some(n) if n != 0 => 1,
                    _ => 0,
                })
                .collect(),
        )
    }

    pub fn get(&self, address: usize) -> u8 {
        self.0.get(address).copied().unwrap_or(0)
    }
}

impl<'de> Deserialize<'de> for SwitchStates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(&Value::deserialize(deserializer)?))
    }
}

/// Answer of `GET /api/system_state`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStateSnapshot {
    pub running: bool,
}

impl<'de> Deserialize<'de> for RunStateSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let running = match &value {
            Value::Object(obj) => ["status", "state", "running"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(de::flag_from))
                .unwrap_or(false),
            other => de::flag_from(other).unwrap_or(false),
        };
        Ok(Self { running })
    }
}

// ── Push events ───────────────────────────────────────────────────────────────

/// One decoded message from the push stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// Track power / run state.
    System { running: bool },
    /// The server re-read its locomotive list.
    CatalogReloaded,
    Direction { loco: LocoId, direction: Direction },
    Speed { loco: LocoId, speed: u16 },
    Function { loco: LocoId, index: u8, active: bool },
    Switch { address: usize, value: u8 },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    System {
        #[serde(deserialize_with = "de::flag")]
        status: bool,
    },
    LocoListReloaded {},
    Direction {
        #[serde(alias = "loco_id", alias = "locoId", deserialize_with = "de::id")]
        loc_id: u32,
        value: Direction,
    },
    Speed {
        #[serde(alias = "loco_id", alias = "locoId", deserialize_with = "de::id")]
        loc_id: u32,
        #[serde(deserialize_with = "de::int")]
        value: i64,
    },
    Function {
        #[serde(alias = "loco_id", alias = "locoId", deserialize_with = "de::id")]
        loc_id: u32,
        #[serde(rename = "fn", alias = "function", deserialize_with = "de::int")]
        index: i64,
        #[serde(deserialize_with = "de::flag")]
        value: bool,
    },
    Switch {
        #[serde(deserialize_with = "de::int")]
        idx: i64,
        #[serde(deserialize_with = "de::int")]
        value: i64,
    },
}

impl PushEvent {
    pub fn decode(payload: &str) -> Result<Self, EventError> {
        let wire: WireEvent = serde_json::from_str(payload)?;
        Ok(match wire {
            WireEvent::System { status } => Self::System { running: status },
            WireEvent::LocoListReloaded {} => Self::CatalogReloaded,
            WireEvent::Direction { loc_id, value } => Self::Direction {
                loco: loc_id,
                direction: value,
            },
            WireEvent::Speed { loc_id, value } => Self::Speed {
                loco: loc_id,
                speed: clamp_speed(value),
            },
            WireEvent::Function {
                loc_id,
                index,
                value,
            } => Self::Function {
                loco: loc_id,
                index: function_index(Some(index)).ok_or(EventError::OutOfRange {
                    field: "fn",
                    value: index,
                })?,
                active: value,
            },
            WireEvent::Switch { idx, value } => Self::Switch {
                address: usize::try_from(idx).map_err(|_| EventError::OutOfRange {
                    field: "idx",
                    value: idx,
                })?,
                value: u8::from(value != 0),
            },
        })
    }

    /// Locomotive this event is scoped to, if any.
    pub fn loco(&self) -> Option<LocoId> {
        match self {
            Self::Direction { loco, .. } | Self::Speed { loco, .. } | Self::Function { loco, .. } => {
                Some(*loco)
            }
            _ => None,
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Outgoing intents. Each maps to one POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetSpeed { loco: LocoId, speed: u16 },
    SetDirection { loco: LocoId, direction: Direction },
    SetFunction { loco: LocoId, index: u8, active: bool },
    SetSwitch { address: usize, value: u8 },
    SetRunState { running: bool },
    CustomEvent { loco: LocoId, code: u8, value: u8 },
}

impl Command {
    pub fn set_speed(loco: LocoId, raw: i64) -> Self {
        Self::SetSpeed {
            loco,
            speed: clamp_speed(raw),
        }
    }

    pub fn set_function(loco: LocoId, index: i64, active: bool) -> Result<Self, CommandError> {
        let index = function_index(Some(index)).ok_or(CommandError::FunctionIndex(index))?;
        Ok(Self::SetFunction {
            loco,
            index,
            active,
        })
    }

    pub fn set_switch(address: usize, value: i64) -> Result<Self, CommandError> {
        match value {
            0 | 1 => Ok(Self::SetSwitch {
                address,
                value: value as u8,
            }),
            other => Err(CommandError::SwitchValue(other)),
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::SetSpeed { .. } | Self::SetDirection { .. } | Self::SetFunction { .. } => {
                endpoints::CONTROL_EVENT
            }
            Self::SetSwitch { .. } => endpoints::KEYBOARD_EVENT,
            Self::SetRunState { .. } => endpoints::STOP_BUTTON,
            Self::CustomEvent { .. } => endpoints::INFO_EVENTS,
        }
    }

    pub fn body(&self) -> Value {
        match *self {
            Self::SetSpeed { loco, speed } => json!({ "loco_id": loco, "speed": speed }),
            Self::SetDirection { loco, direction } => {
                json!({ "loco_id": loco, "direction": direction.wire() })
            }
            Self::SetFunction {
                loco,
                index,
                active,
            } => json!({ "loco_id": loco, "function": index, "value": u8::from(active) }),
            Self::SetSwitch { address, value } => json!({ "idx": address, "value": value }),
            Self::SetRunState { running } => json!({ "state": running }),
            Self::CustomEvent { loco, code, value } => {
                json!({ "loco_id": loco, "function": code, "value": value })
            }
        }
    }
}

/// List-management actions offered by the control server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoAction {
    ImportLocos,
    ActivateListImport,
    RestartControl,
    ReimportFromMs2,
}

impl InfoAction {
    pub const ALL: [InfoAction; 4] = [
        Self::ImportLocos,
        Self::ActivateListImport,
        Self::RestartControl,
        Self::ReimportFromMs2,
    ];

    pub fn code(self) -> u8 {
        match self {
            Self::ImportLocos => 0,
            Self::ActivateListImport => 1,
            Self::RestartControl => 2,
            Self::ReimportFromMs2 => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ImportLocos => "import / update locomotives from list",
            Self::ActivateListImport => "activate list import",
            Self::RestartControl => "restart control service",
            Self::ReimportFromMs2 => "delete list and re-import from MS2",
        }
    }

    pub fn command(self) -> Command {
        Command::CustomEvent {
            loco: INFO_EVENT_LOCO,
            code: self.code(),
            value: 1,
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Lenient field decoders.
mod de {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Decimal, `0x` hexadecimal, or a float string rounded to the nearest integer.
    pub fn parse_int(s: &str) -> Option<i64> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return i64::from_str_radix(hex, 16).ok();
        }
        s.parse::<i64>().ok().or_else(|| {
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.round() as i64)
        })
    }

    pub fn number_from(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => parse_int(s),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn flag_from(value: &Value) -> Option<bool> {
        match value {
            Value::Bool(b) => Some(*b),
            Value::Number(_) => number_from(value).map(|n| n != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "on" => Some(true),
                "false" | "off" | "" => Some(false),
                other => parse_int(other).map(|n| n != 0),
            },
            _ => None,
        }
    }

    pub fn text_from(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(number_from(&value).and_then(|n| u32::try_from(n).ok()))
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(text_from(&value))
    }

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let value = Value::deserialize(d)?;
        number_from(&value)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| D::Error::custom(format!("expected an id, got {}", value)))
    }

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(d)?;
        number_from(&value).ok_or_else(|| D::Error::custom(format!("expected a number, got {}", value)))
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let value = Value::deserialize(d)?;
        flag_from(&value).ok_or_else(|| D::Error::custom(format!("expected a flag, got {}", value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_keyed_by_uid_in_ascending_order() {
        let catalog = LocoCatalog::from_value(json!({
            "16389": { "uid": "0x4005", "name": "BR 85", "icon": "br85", "tachomax": "120",
                       "funktionen": { "0": { "typ": "1" }, "3": { "type": 7 } } },
            "7": { "name": 44, "bild": "v200" },
            "12": { "uid": 12 }
        }));
        let uids: Vec<_> = catalog.iter().map(|l| l.uid).collect();
        assert_eq!(uids, vec![7, 12, 0x4005]);
        assert_eq!(catalog.first_uid(), Some(7));

        let br85 = catalog.get(0x4005).unwrap();
        assert_eq!(br85.display_name(), "BR 85");
        assert_eq!(br85.icon_key(), "br85");
        assert_eq!(br85.tachomax(), 120);
        assert_eq!(br85.function_icon_id(0), 1);
        assert_eq!(br85.function_icon_id(3), 7);
        assert_eq!(br85.function_icon_id(5), 55);

        let v200 = catalog.get(7).unwrap();
        assert_eq!(v200.display_name(), "44");
        assert_eq!(v200.icon_key(), "v200");
        assert_eq!(v200.tachomax(), DEFAULT_TACHOMAX);

        let bare = catalog.get(12).unwrap();
        assert_eq!(bare.display_name(), "Lok 12");
        assert_eq!(bare.icon_key(), DEFAULT_LOCO_ICON);
    }

    #[test]
    fn test_catalog_skips_unusable_entries() {
        let catalog = LocoCatalog::from_value(json!({
            "abc": { "name": "no uid" },
            "3": "not an object",
            "4": { "name": "ok", "tachomax": 0, "funktionen": [ { "typ": 2 }, null, { "typ": 9 } ] }
        }));
        assert_eq!(catalog.len(), 1);
        let loco = catalog.get(4).unwrap();
        assert_eq!(loco.tachomax(), DEFAULT_TACHOMAX);
        assert_eq!(loco.function_icon_id(0), 2);
        assert_eq!(loco.function_icon_id(1), 51);
        assert_eq!(loco.function_icon_id(2), 9);
        assert!(LocoCatalog::from_value(json!("garbage")).is_empty());
    }

    #[test]
    fn test_kmh_rounding() {
        assert_eq!(kmh(500, 200), 100);
        assert_eq!(kmh(1000, 120), 120);
        assert_eq!(kmh(333, 200), 67);
        assert_eq!(kmh(0, 200), 0);
        assert_eq!(kmh(5000, 200), 200);
    }

    #[test]
    fn test_direction_decoding() {
        assert_eq!(Direction::from_value(&json!(2)), Direction::Reverse);
        assert_eq!(Direction::from_value(&json!("2")), Direction::Reverse);
        assert_eq!(Direction::from_value(&json!("reverse")), Direction::Reverse);
        assert_eq!(Direction::from_value(&json!(1)), Direction::Forward);
        assert_eq!(Direction::from_value(&json!("forward")), Direction::Forward);
        assert_eq!(Direction::from_value(&json!(null)), Direction::Forward);
    }

    #[test]
    fn test_loco_snapshot_defaults_and_leniency() {
        let snap = LocoSnapshot::from_value(&json!({
            "speed": "1500", "direction": "reverse",
            "functions": { "0": true, "1": 0, "4": "1", "40": true }
        }));
        assert_eq!(snap.speed, 1000);
        assert_eq!(snap.direction, Direction::Reverse);
        assert!(snap.function(0));
        assert!(!snap.function(1));
        assert!(snap.function(4));
        assert_eq!(snap.functions.len(), 3);

        assert_eq!(LocoSnapshot::from_value(&json!({})), LocoSnapshot::default());
    }

    #[test]
    fn test_switch_catalog_labels() {
        let catalog = SwitchCatalog::from_value(&json!({
            "artikel": [ { "name": "Einfahrt" }, { "id": 2 }, 17, { "name": 12 } ]
        }));
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.label(0), "Einfahrt");
        assert_eq!(catalog.label(1), "2");
        assert_eq!(catalog.label(2), "3");
        assert_eq!(catalog.label(3), "12");
        assert_eq!(catalog.label(40), "41");
    }

    #[test]
    fn test_switch_states_shapes() {
        let wrapped = SwitchStates::from_value(&json!({ "switch_state": [0, 1, "1", null, 2, true] }));
        assert_eq!(wrapped.0, vec![0, 1, 1, 0, 1, 1]);
        let bare = SwitchStates::from_value(&json!([1, 0]));
        assert_eq!(bare.get(0), 1);
        assert_eq!(bare.get(9), 0);
    }

    #[test]
    fn test_run_state_snapshot() {
        let snap: RunStateSnapshot = serde_json::from_value(json!({ "status": true })).unwrap();
        assert!(snap.running);
        let snap: RunStateSnapshot = serde_json::from_value(json!({ "state": 0 })).unwrap();
        assert!(!snap.running);
        let snap: RunStateSnapshot = serde_json::from_value(json!({})).unwrap();
        assert!(!snap.running);
    }

    #[test]
    fn test_decode_push_events() {
        assert_eq!(
            PushEvent::decode(r#"{"type":"system","status":true}"#).unwrap(),
            PushEvent::System { running: true }
        );
        assert_eq!(
            PushEvent::decode(r#"{"type":"loco_list_reloaded"}"#).unwrap(),
            PushEvent::CatalogReloaded
        );
        assert_eq!(
            PushEvent::decode(r#"{"type":"speed","loc_id":1,"value":500}"#).unwrap(),
            PushEvent::Speed { loco: 1, speed: 500 }
        );
        assert_eq!(
            PushEvent::decode(r#"{"type":"speed","locoId":"3","value":-20}"#).unwrap(),
            PushEvent::Speed { loco: 3, speed: 0 }
        );
        assert_eq!(
            PushEvent::decode(r#"{"type":"direction","loc_id":5,"value":"2"}"#).unwrap(),
            PushEvent::Direction {
                loco: 5,
                direction: Direction::Reverse
            }
        );
        assert_eq!(
            PushEvent::decode(r#"{"type":"function","loc_id":5,"fn":3,"value":1}"#).unwrap(),
            PushEvent::Function {
                loco: 5,
                index: 3,
                active: true
            }
        );
        assert_eq!(
            PushEvent::decode(r#"{"type":"switch","idx":13,"value":1,"extra":"x"}"#).unwrap(),
            PushEvent::Switch {
                address: 13,
                value: 1
            }
        );
    }

    #[test]
    fn test_decode_rejects_malformed_events() {
        assert!(PushEvent::decode("not json").is_err());
        assert!(PushEvent::decode(r#"{"type":"teleport","loc_id":1}"#).is_err());
        assert!(PushEvent::decode(r#"{"loc_id":1,"value":3}"#).is_err());
        assert!(PushEvent::decode(r#"{"type":"speed","value":3}"#).is_err());
        assert!(matches!(
            PushEvent::decode(r#"{"type":"function","loc_id":1,"fn":28,"value":true}"#),
            Err(EventError::OutOfRange { field: "fn", .. })
        ));
        assert!(matches!(
            PushEvent::decode(r#"{"type":"switch","idx":-1,"value":1}"#),
            Err(EventError::OutOfRange { field: "idx", .. })
        ));
    }

    #[test]
    fn test_command_bodies() {
        let cmd = Command::set_speed(7, 1200);
        assert_eq!(cmd.endpoint(), endpoints::CONTROL_EVENT);
        assert_eq!(cmd.body(), json!({ "loco_id": 7, "speed": 1000 }));

        let cmd = Command::SetDirection {
            loco: 7,
            direction: Direction::Reverse,
        };
        assert_eq!(cmd.body(), json!({ "loco_id": 7, "direction": 2 }));

        let cmd = Command::set_function(7, 4, true).unwrap();
        assert_eq!(cmd.body(), json!({ "loco_id": 7, "function": 4, "value": 1 }));
        assert_eq!(
            Command::set_function(7, 28, true),
            Err(CommandError::FunctionIndex(28))
        );

        let cmd = Command::set_switch(13, 1).unwrap();
        assert_eq!(cmd.endpoint(), endpoints::KEYBOARD_EVENT);
        assert_eq!(cmd.body(), json!({ "idx": 13, "value": 1 }));
        assert_eq!(Command::set_switch(13, 2), Err(CommandError::SwitchValue(2)));

        let cmd = Command::SetRunState { running: false };
        assert_eq!(cmd.endpoint(), endpoints::STOP_BUTTON);
        assert_eq!(cmd.body(), json!({ "state": false }));

        let cmd = InfoAction::ReimportFromMs2.command();
        assert_eq!(cmd.endpoint(), endpoints::INFO_EVENTS);
        assert_eq!(cmd.body(), json!({ "loco_id": 1, "function": 4, "value": 1 }));
    }
}
