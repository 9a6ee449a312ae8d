//! MIB Definitions
//!
//! Builds the exporter's MIB from the core system OIDs plus declarative JSON
//! tables found in the MIB directory:
//!
//! | File                | Placed under              | Required |
//! |---------------------|---------------------------|----------|
//! | `genmon.json`       | `base`                    | yes      |
//! | `<controller>.json` | `base.<controller id>`    | yes      |
//! | `userdefined.json`  | `base.<external data id>` | no       |
//!
//! where `base` is `1.3.6.1.4.1.<enterprise id>`.
//!
//! # File Format
//!
//! ```json
//! {
//!   "controller_type": "generac_evo_nexus",
//!   "snmp": [
//!     {"oid": "(0, 1)", "return_type": "str", "description": "Engine State",
//!      "default": "", "keywords": ["Engine", "Engine State"], "integer": false}
//!   ]
//! }
//! ```

use super::oid::Oid;
use super::registry::{MibBuilder, MibRegistry, ValueKind};
use crate::config::SnmpConfig;
use crate::error::{ExporterError, Result};
use crate::monitor::types::StartInfo;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SYS_DESCR: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 1, 0];
pub const SYS_OBJECT_ID: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 2, 0];
pub const SYS_UPTIME: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 3, 0];

pub const SYS_DESCR_TEXT: &str = "Genmon Generator Monitor";

/// `1.3.6.1.4.1.<enterprise id>`
pub fn enterprise_base(enterprise_id: u32) -> Oid {
    Oid::from([1, 3, 6, 1, 4, 1, enterprise_id])
}

#[derive(Debug, Clone, Deserialize)]
pub struct MibTable {
    pub controller_type: String,
    pub snmp: Vec<MibTableEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MibTableEntry {
    pub oid: String,
    pub return_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: serde_json::Value,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub integer: bool,
}

impl MibTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ExporterError::Config(format!("cannot read MIB table {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Controller families with their own OID subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerKind {
    EvolutionNexus,
    H100,
    PowerZone,
    Custom,
}

impl ControllerKind {
    /// Subtree id under the enterprise base.
    pub fn id(&self) -> u32 {
        match self {
            ControllerKind::EvolutionNexus => 1,
            ControllerKind::H100 => 2,
            ControllerKind::PowerZone => 3,
            ControllerKind::Custom => 4,
        }
    }

    /// Value of `controller_type` in the controller's table.
    pub fn table_type(&self) -> &'static str {
        match self {
            ControllerKind::EvolutionNexus => "generac_evo_nexus",
            ControllerKind::H100 => "h_100",
            ControllerKind::PowerZone => "powerzone",
            ControllerKind::Custom => "custom",
        }
    }

    /// Pick the controller from the monitor's reported name, falling back to
    /// the configured type.
    pub fn detect(start_info: Option<&StartInfo>, configured: &str) -> Option<Self> {
        let reported = start_info
            .map(|info| info.controller.to_lowercase())
            .unwrap_or_default();
        let configured = configured.trim();

        if reported.contains("evolution") || reported.contains("nexus") {
            return Some(ControllerKind::EvolutionNexus);
        }
        if reported.contains("h-100") || reported.contains("g-panel") {
            return Some(ControllerKind::H100);
        }
        if reported.contains("powerzone") {
            return Some(ControllerKind::PowerZone);
        }
        if reported.contains("custom") {
            return Some(ControllerKind::Custom);
        }

        match configured {
            "" | "generac_evo_nexus" => Some(ControllerKind::EvolutionNexus),
            "h_100" => Some(ControllerKind::H100),
            "powerzone" => Some(ControllerKind::PowerZone),
            "custom" => Some(ControllerKind::Custom),
            _ => None,
        }
    }
}

fn default_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Append every entry of `table` under `base` (and `subtree`, when given).
pub fn add_table(
    builder: &mut MibBuilder,
    table: &MibTable,
    name: &str,
    base: &Oid,
    subtree: Option<u32>,
    use_integer: bool,
) -> Result<()> {
    debug!("{}: {} entries", name, table.snmp.len());
    for entry in &table.snmp {
        let mut kind = match entry.return_type.to_lowercase().as_str() {
            "str" => ValueKind::String,
            "int" => ValueKind::Integer,
            other => {
                warn!("Invalid return type '{}' in {} table", other, name);
                ValueKind::String
            }
        };
        let mut default = default_text(&entry.default);
        if use_integer && entry.integer {
            kind = ValueKind::Integer;
            default = "0".to_string();
        }

        let relative: Oid = entry.oid.parse().map_err(|_| {
            ExporterError::Config(format!("invalid OID '{}' in {} table", entry.oid, name))
        })?;
        let oid = match subtree {
            Some(id) => base.child(&[id]).child(relative.arcs()),
            None => base.child(relative.arcs()),
        };

        builder.add_oid(
            oid,
            kind,
            entry.description.clone(),
            &default,
            entry.keywords.clone(),
        );
    }
    Ok(())
}

/// Resolves the MIB tables for one exporter instance.
pub struct MibLayout {
    mib_dir: PathBuf,
    base: Oid,
    enterprise_id: u32,
    external_data_id: u32,
    use_integer: bool,
    custom_controller_file: Option<String>,
}

impl MibLayout {
    pub fn new(config: &SnmpConfig) -> Self {
        Self {
            mib_dir: PathBuf::from(&config.mib_dir),
            base: enterprise_base(config.enterprise_id),
            enterprise_id: config.enterprise_id,
            external_data_id: config.external_data_id,
            use_integer: config.use_integer,
            custom_controller_file: config.custom_controller_file.clone(),
        }
    }

    pub fn base(&self) -> &Oid {
        &self.base
    }

    /// Core system OIDs only.
    pub fn add_system(&self, builder: &mut MibBuilder) {
        builder
            .add_oid(
                Oid::from(SYS_DESCR),
                ValueKind::String,
                "SysDescr",
                SYS_DESCR_TEXT,
                Vec::new(),
            )
            .add_oid(
                Oid::from(SYS_OBJECT_ID),
                ValueKind::ObjectIdentifier,
                "OID",
                &format!(".1.3.6.1.4.1.{}", self.enterprise_id),
                Vec::new(),
            )
            .add_oid(
                Oid::from(SYS_UPTIME),
                ValueKind::TimeTicks,
                "Uptime",
                "",
                Vec::new(),
            );
    }

    fn controller_file(&self, controller: &ControllerKind) -> Result<PathBuf> {
        let name = match controller {
            ControllerKind::Custom => self.custom_controller_file.clone().ok_or_else(|| {
                ExporterError::Config("custom controller selected without a MIB file".into())
            })?,
            other => format!("{}.json", other.table_type()),
        };
        Ok(self.mib_dir.join(name))
    }

    /// Build the full registry for `controller`.
    pub fn build(&self, controller: &ControllerKind) -> Result<MibRegistry> {
        let mut builder = MibRegistry::builder();
        self.add_system(&mut builder);

        let genmon_path = self.mib_dir.join("genmon.json");
        let genmon = MibTable::load(&genmon_path)?;
        if genmon.controller_type != "genmon" {
            return Err(ExporterError::Config(format!(
                "invalid data (genmon) in {}",
                genmon_path.display()
            )));
        }
        add_table(&mut builder, &genmon, "genmon", &self.base, None, self.use_integer)?;

        let controller_path = self.controller_file(controller)?;
        let table = MibTable::load(&controller_path)?;
        if table.controller_type != controller.table_type() {
            return Err(ExporterError::Config(format!(
                "invalid data (controller) in {}",
                controller_path.display()
            )));
        }
        add_table(
            &mut builder,
            &table,
            "controller",
            &self.base,
            Some(controller.id()),
            self.use_integer,
        )?;

        let user_path = self.mib_dir.join("userdefined.json");
        if user_path.is_file() {
            let user = MibTable::load(&user_path)?;
            add_table(
                &mut builder,
                &user,
                "user defined",
                &self.base,
                Some(self.external_data_id),
                self.use_integer,
            )?;
        }

        let registry = builder.build()?;
        info!(
            "MIB loaded: {} entries for controller {} under {}",
            registry.len(),
            controller.table_type(),
            self.base
        );
        Ok(registry)
    }
}
