//! Identity Allocator
//!
//! Derives the stack identity (stack name and serial) and owns the serial
//! record, the append-only journal that anchors every later lookup.
//!
//! ## Behavior
//!
//! - **Atomic claim**: the serial record is created with exclusive-create
//!   semantics before any other side effect. The loser of a same-name race
//!   fails with `DuplicateStack` and never touches the winner's record.
//! - **Append-only**: line 1 is the canonical serial, every later line is a
//!   literal command used to build or rebuild the stack.
//! - **Convention-based**: records live at
//!   `<state_root>/<kind dir>/<stack_name>.serial`, so lookup needs no index.

use crate::error::{StackError, ValidationError, ValidationErrors};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Width of the serial datestamp: microseconds, seconds, minutes, hours, day, month, year.
pub const DATESTAMP_LEN: usize = 20;

/// The two kinds of stack this tool manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackKind {
    Cluster,
    Jumphost,
}

impl StackKind {
    pub const ALL: [StackKind; 2] = [StackKind::Cluster, StackKind::Jumphost];

    pub fn as_str(&self) -> &'static str {
        match self {
            StackKind::Cluster => "cluster",
            StackKind::Jumphost => "jumphost",
        }
    }

    /// Directory (under the state root) holding this kind's serial records
    pub fn serial_dir(&self) -> &'static str {
        match self {
            StackKind::Cluster => "active_pclusters",
            StackKind::Jumphost => "active_pcluster_jumphosts",
        }
    }

    /// Directory (under the state root) holding per-stack data such as key material
    pub fn data_dir(&self) -> &'static str {
        match self {
            StackKind::Cluster => "cluster_data",
            StackKind::Jumphost => "pcluster_jumphost_data",
        }
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cluster" => Ok(StackKind::Cluster),
            "jumphost" => Ok(StackKind::Jumphost),
            other => Err(ValidationError::NotInCatalog {
                field: "kind",
                value: other.to_string(),
                supported: "cluster, jumphost".to_string(),
            }),
        }
    }
}

/// Check one component of a stack name: non-empty, ASCII alphanumerics, and
/// interior `-` only when `allow_dash` is set.
pub fn check_name_component(
    field: &'static str,
    value: &str,
    allow_dash: bool,
) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Malformed {
            field,
            value: value.to_string(),
            reason: "must not be empty".to_string(),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || (allow_dash && *c == '-')))
    {
        return Err(ValidationError::Malformed {
            field,
            value: value.to_string(),
            reason: format!("contains unsupported character {:?}", bad),
        });
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(ValidationError::Malformed {
            field,
            value: value.to_string(),
            reason: "must not start or end with '-'".to_string(),
        });
    }
    Ok(())
}

/// Derive the stack name `owner-logical_name`.
///
/// Owners may not contain `-`, so the first `-` of a stack name always
/// separates owner from logical name.
pub fn stack_name(owner: &str, logical_name: &str) -> Result<String, ValidationErrors> {
    let errors: Vec<ValidationError> = [
        check_name_component("owner", owner, false),
        check_name_component("name", logical_name, true),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();
    if errors.is_empty() {
        Ok(format!("{}-{}", owner, logical_name))
    } else {
        Err(ValidationErrors(errors))
    }
}

/// Format the serial datestamp for a point in time
pub fn datestamp(at: &DateTime<Utc>) -> String {
    at.format("%6f%S%M%H%d%m%Y").to_string()
}

/// Parse a datestamp back into the instant it encodes
pub fn parse_datestamp(stamp: &str) -> Option<DateTime<Utc>> {
    if stamp.len() != DATESTAMP_LEN || !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| stamp[range].parse::<u32>().ok();
    let micros = field(0..6)?;
    let second = field(6..8)?;
    let minute = field(8..10)?;
    let hour = field(10..12)?;
    let day = field(12..14)?;
    let month = field(14..16)?;
    let year = stamp[16..20].parse::<i32>().ok()?;
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_micro_opt(
        hour, minute, second, micros,
    )?;
    Some(naive.and_utc())
}

/// The unique, timestamp-derived key embedded in every dependent resource name.
///
/// Shape: `<stack_name>-<20 digit datestamp>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Serial(String);

impl Serial {
    pub fn mint(stack_name: &str, at: &DateTime<Utc>) -> Self {
        Serial(format!("{}-{}", stack_name, datestamp(at)))
    }

    /// Parse a serial, checking its shape.
    pub fn parse(raw: &str) -> Option<Self> {
        let (stack, stamp) = raw.rsplit_once('-')?;
        if stack.is_empty() || stack.starts_with('-') || stack.ends_with('-') {
            return None;
        }
        if !stack.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return None;
        }
        parse_datestamp(stamp)?;
        Some(Serial(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The stack name portion of the serial
    pub fn stack_name(&self) -> &str {
        &self.0[..self.0.len() - DATESTAMP_LEN - 1]
    }

    /// The datestamp portion of the serial
    pub fn datestamp(&self) -> &str {
        &self.0[self.0.len() - DATESTAMP_LEN..]
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Serial {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Serial::parse(&value).ok_or_else(|| format!("malformed serial: {}", value))
    }
}

impl From<Serial> for String {
    fn from(serial: Serial) -> Self {
        serial.0
    }
}

/// Identity of one stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackIdentity {
    pub kind: StackKind,
    pub logical_name: String,
    pub owner: String,
    /// `owner-logical_name`
    pub stack_name: String,
    pub serial: Serial,
    pub created_at: DateTime<Utc>,
}

impl StackIdentity {
    /// Human readable deployment date, e.g. `18.October.2026`
    pub fn deployment_date(&self) -> String {
        format!(
            "{}.{}.{}",
            self.created_at.day(),
            self.created_at.format("%B"),
            self.created_at.year()
        )
    }

    /// Long form deployment date, e.g. `October 18, 2026`
    pub fn deployed_on(&self) -> String {
        format!(
            "{} {}, {}",
            self.created_at.format("%B"),
            self.created_at.day(),
            self.created_at.year()
        )
    }
}

/// Filesystem layout of all on-disk state under one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn serial_dir(&self, kind: StackKind) -> PathBuf {
        self.root.join(kind.serial_dir())
    }

    /// `<root>/<kind dir>/<stack_name>.serial`
    pub fn serial_record(&self, kind: StackKind, stack_name: &str) -> PathBuf {
        self.serial_dir(kind).join(format!("{}.serial", stack_name))
    }

    /// Path of the composed configuration document
    pub fn vars_file(&self, kind: StackKind, stack_name: &str) -> PathBuf {
        let file = match kind {
            StackKind::Cluster => format!("{}.yml", stack_name),
            StackKind::Jumphost => format!("{}.jumphost.yml", stack_name),
        };
        self.root.join("vars_files").join(file)
    }

    pub fn data_dir(&self, kind: StackKind, stack_name: &str) -> PathBuf {
        self.root.join(kind.data_dir()).join(stack_name)
    }
}

/// Allocates, looks up, and releases stack identities.
#[derive(Debug, Clone)]
pub struct IdentityAllocator {
    layout: StateLayout,
}

impl IdentityAllocator {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    /// Whether a serial record already claims this stack name
    pub fn is_claimed(&self, kind: StackKind, stack_name: &str) -> bool {
        self.layout.serial_record(kind, stack_name).exists()
    }

    /// Claim a new stack identity, minting the serial from the current time.
    pub fn allocate(
        &self,
        kind: StackKind,
        owner: &str,
        logical_name: &str,
    ) -> Result<StackIdentity, StackError> {
        self.allocate_at(kind, owner, logical_name, Utc::now())
    }

    /// Claim a new stack identity with an explicit creation time.
    pub fn allocate_at(
        &self,
        kind: StackKind,
        owner: &str,
        logical_name: &str,
        now: DateTime<Utc>,
    ) -> Result<StackIdentity, StackError> {
        let stack_name = stack_name(owner, logical_name)?;
        let record_path = self.layout.serial_record(kind, &stack_name);
        fs::create_dir_all(self.layout.serial_dir(kind))?;

        // Whole-microsecond precision so the datestamp round-trips exactly.
        let created_at = parse_datestamp(&datestamp(&now)).unwrap_or(now);
        let serial = Serial::mint(&stack_name, &created_at);

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&record_path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(duplicate_stack(
                    kind,
                    owner,
                    logical_name,
                    record_path.display(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", serial)?;
        file.sync_all()?;

        info!(
            stack = %stack_name,
            serial = %serial,
            record = %record_path.display(),
            "Claimed stack identity"
        );

        Ok(StackIdentity {
            kind,
            logical_name: logical_name.to_string(),
            owner: owner.to_string(),
            stack_name,
            serial,
            created_at,
        })
    }

    /// Read back the identity of an existing stack.
    pub fn lookup(
        &self,
        kind: StackKind,
        owner: &str,
        logical_name: &str,
    ) -> Result<StackIdentity, StackError> {
        let stack_name = stack_name(owner, logical_name)?;
        let record_path = self.layout.serial_record(kind, &stack_name);
        let contents = match fs::read_to_string(&record_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StackError::NotFound {
                    stack: stack_name,
                    record: record_path,
                });
            }
            Err(e) => return Err(e.into()),
        };
        let serial = parse_record_serial(&record_path, &contents, &stack_name)?;
        let created_at =
            parse_datestamp(serial.datestamp()).ok_or_else(|| StackError::CorruptRecord {
                path: record_path.clone(),
                reason: "serial datestamp does not encode a valid time".to_string(),
            })?;
        Ok(StackIdentity {
            kind,
            logical_name: logical_name.to_string(),
            owner: owner.to_string(),
            stack_name,
            serial,
            created_at,
        })
    }

    /// Delete the serial record. A record that is already gone is not an error.
    pub fn release(&self, identity: &StackIdentity) -> Result<(), StackError> {
        let record_path = self.record_path(identity);
        match fs::remove_file(&record_path) {
            Ok(()) => {
                info!(record = %record_path.display(), "Released stack identity");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(record = %record_path.display(), "Serial record already removed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Append a literal command line to the stack's serial record.
    pub fn append_command(&self, identity: &StackIdentity, command: &str) -> Result<(), StackError> {
        let record_path = self.record_path(identity);
        let mut file = match OpenOptions::new().append(true).open(&record_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StackError::NotFound {
                    stack: identity.stack_name.clone(),
                    record: record_path,
                });
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", command.trim_end())?;
        Ok(())
    }

    /// Commands recorded after the serial line
    pub fn commands(&self, identity: &StackIdentity) -> Result<Vec<String>, StackError> {
        let contents = fs::read_to_string(self.record_path(identity))?;
        Ok(contents
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn record_path(&self, identity: &StackIdentity) -> PathBuf {
        self.layout
            .serial_record(identity.kind, &identity.stack_name)
    }

    /// Every live stack of a kind, sorted by stack name.
    pub fn list(&self, kind: StackKind) -> Result<Vec<StackIdentity>, StackError> {
        let dir = self.layout.serial_dir(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut identities = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("serial") {
                continue;
            }
            let Some(stack) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let contents = fs::read_to_string(&path)?;
            let serial = parse_record_serial(&path, &contents, stack)?;
            let created_at =
                parse_datestamp(serial.datestamp()).ok_or_else(|| StackError::CorruptRecord {
                    path: path.clone(),
                    reason: "serial datestamp does not encode a valid time".to_string(),
                })?;
            let (owner, logical_name) = stack.split_once('-').unwrap_or((stack, ""));
            identities.push(StackIdentity {
                kind,
                logical_name: logical_name.to_string(),
                owner: owner.to_string(),
                stack_name: stack.to_string(),
                serial,
                created_at,
            });
        }
        identities.sort_by(|a, b| a.stack_name.cmp(&b.stack_name));
        Ok(identities)
    }
}

fn parse_record_serial(path: &Path, contents: &str, stack_name: &str) -> Result<Serial, StackError> {
    let first = contents.lines().next().unwrap_or("").trim();
    let serial = Serial::parse(first).ok_or_else(|| StackError::CorruptRecord {
        path: path.to_path_buf(),
        reason: format!("line 1 is not a serial: {:?}", first),
    })?;
    if serial.stack_name() != stack_name {
        return Err(StackError::CorruptRecord {
            path: path.to_path_buf(),
            reason: format!(
                "serial {} does not belong to stack {}",
                serial, stack_name
            ),
        });
    }
    Ok(serial)
}

/// Build the duplicate-stack error with the command that clears the conflict.
pub fn duplicate_stack(
    kind: StackKind,
    owner: &str,
    logical_name: &str,
    evidence: impl fmt::Display,
) -> StackError {
    StackError::DuplicateStack {
        stack: format!("{}-{}", owner, logical_name),
        evidence: evidence.to_string(),
        remediation: format!(
            "clustermaker {} destroy -N {} -O {}",
            kind, logical_name, owner
        ),
    }
}
