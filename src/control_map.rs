//! Control map built from the MP11 controller reference table
//!
//! Parses the `;`-separated cc_midi_reference.csv into control entries and
//! the lookups the decoder, translator and encoder share: SysEx template to
//! control, control number to template, section name to index.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use tracing::{debug, info};

use crate::error::ConfigError;

/// Section names in hardware order: two single sections then the sub section
pub const DEFAULT_SECTION_NAMES: [&str; 3] = ["PIANO", "E.PIANO", "SUB"];

/// Length of the SysEx prefix identifying a section control, data-size byte included
pub const PREFIX_LEN: usize = 29;

/// Name of the control whose SysEx selects a section and its tone
pub const TONE_CONTROL: &str = "tone";

/// Rows before the header line in the reference table
const HEADER_SKIP_ROWS: usize = 2;

/// How a control is recognised in SysEx
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysExKind {
    /// MMC transport command: one complete SysEx string
    Simple,
    /// Per-section parameter: one fixed-length prefix per section
    Prefix,
}

/// One mapped control from the reference table
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEntry {
    pub name: String,
    pub control_number: u8,
    pub scale: i32,
    pub sys_ex_templates: Vec<String>,
    pub is_reverse_mapped: bool,
    pub kind: SysExKind,
}

impl ControlEntry {
    /// Template addressed to a section (simple entries only have index 0)
    pub fn template(&self, section_index: usize) -> Option<&str> {
        self.sys_ex_templates.get(section_index).map(String::as_str)
    }

    /// Position of a template within this entry, i.e. its section index
    pub fn section_of(&self, template: &str) -> Option<usize> {
        self.sys_ex_templates.iter().position(|t| t == template)
    }
}

/// Read-only control lookups, built once at startup
#[derive(Debug, Clone)]
pub struct ControlMap {
    entries: Vec<ControlEntry>,
    by_name: HashMap<String, usize>,
    simple: HashMap<String, usize>,
    prefix: HashMap<String, (usize, usize)>,
    reverse: HashMap<u8, usize>,
    sections: Vec<String>,
    section_index: HashMap<String, usize>,
    tone: usize,
}

impl ControlMap {
    /// Build and validate the lookups
    pub fn new(entries: Vec<ControlEntry>, sections: Vec<String>) -> Result<Self, ConfigError> {
        if sections.len() < DEFAULT_SECTION_NAMES.len() {
            return Err(ConfigError::SectionCount(sections.len()));
        }

        let mut by_name = HashMap::new();
        let mut simple = HashMap::new();
        let mut prefix = HashMap::new();
        let mut reverse = HashMap::new();
        let mut numbers: HashMap<u8, &str> = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if let Some(first) = numbers.insert(entry.control_number, &entry.name) {
                return Err(ConfigError::DuplicateControlNumber {
                    number: entry.control_number,
                    first: first.to_string(),
                    second: entry.name.clone(),
                });
            }
            if by_name.insert(entry.name.clone(), idx).is_some() {
                return Err(invalid(&entry.name, "name appears twice"));
            }

            match entry.kind {
                SysExKind::Simple => {
                    if entry.sys_ex_templates.len() != 1 {
                        return Err(ConfigError::TemplateCount {
                            control: entry.name.clone(),
                            found: entry.sys_ex_templates.len(),
                            expected: 1,
                        });
                    }
                    if entry.is_reverse_mapped {
                        return Err(invalid(&entry.name, "MMC controls cannot be reverse mapped"));
                    }
                    if simple.insert(entry.sys_ex_templates[0].clone(), idx).is_some() {
                        return Err(invalid(&entry.name, "SysEx string already mapped"));
                    }
                }
                SysExKind::Prefix => {
                    if entry.sys_ex_templates.len() != sections.len() {
                        return Err(ConfigError::TemplateCount {
                            control: entry.name.clone(),
                            found: entry.sys_ex_templates.len(),
                            expected: sections.len(),
                        });
                    }
                    if entry.scale < 1 {
                        return Err(invalid(
                            &entry.name,
                            format!("scale must be positive, got {}", entry.scale),
                        ));
                    }
                    for (section, template) in entry.sys_ex_templates.iter().enumerate() {
                        validate_prefix(&entry.name, template)?;
                        if prefix.insert(template.clone(), (idx, section)).is_some() {
                            return Err(invalid(
                                &entry.name,
                                format!("prefix '{}' already mapped", template),
                            ));
                        }
                    }
                    if entry.is_reverse_mapped {
                        reverse.insert(entry.control_number, idx);
                    }
                }
            }
        }

        let tone = match by_name.get(TONE_CONTROL) {
            Some(&idx) if entries[idx].kind == SysExKind::Prefix => idx,
            Some(_) => return Err(invalid(TONE_CONTROL, "tone must be a section control")),
            None => return Err(ConfigError::MissingControl(TONE_CONTROL.to_string())),
        };

        let section_index = sections
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Ok(Self {
            entries,
            by_name,
            simple,
            prefix,
            reverse,
            sections,
            section_index,
            tone,
        })
    }

    /// Parse the reference table
    pub fn from_csv(csv_content: &str, sections: &[String]) -> Result<Self, ConfigError> {
        let body = skip_rows(csv_content, HEADER_SKIP_ROWS);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(body.as_bytes());

        let headers = reader.headers()?.clone();
        let column = |name: &str| -> Result<usize, ConfigError> {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| invalid(name, "column missing from control table"))
        };

        let mapping_col = column("mapping")?;
        let number_col = column("Decimal")?;
        let scale_col = column("scale")?;
        let reverse_col = column("reverse mapping")?;
        let type_col = column("SysEx type")?;
        let section_cols = sections
            .iter()
            .map(|name| column(&format!("SysEx {}", name)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |col: usize| record.get(col).map(str::trim).unwrap_or("");

            let name = field(mapping_col);
            if name.is_empty() {
                continue;
            }

            let control_number = field(number_col)
                .parse::<u8>()
                .ok()
                .filter(|n| *n <= 127)
                .ok_or_else(|| {
                    invalid(name, format!("bad control number '{}'", field(number_col)))
                })?;

            let scale = match field(scale_col) {
                "" => -1,
                s => s
                    .parse::<i32>()
                    .map_err(|_| invalid(name, format!("bad scale '{}'", s)))?,
            };

            let is_reverse_mapped = field(reverse_col) == "1";

            let (kind, sys_ex_templates) = match field(type_col) {
                "MMC" => (SysExKind::Simple, vec![field(section_cols[0]).to_string()]),
                "section" => (
                    SysExKind::Prefix,
                    section_cols.iter().map(|&c| field(c).to_string()).collect(),
                ),
                "" => {
                    debug!("Control '{}' has no SysEx binding", name);
                    continue;
                }
                other => return Err(invalid(name, format!("unknown SysEx type '{}'", other))),
            };

            entries.push(ControlEntry {
                name: name.to_string(),
                control_number,
                scale,
                sys_ex_templates,
                is_reverse_mapped,
                kind,
            });
        }

        let map = Self::new(entries, sections.to_vec())?;
        info!(
            "Loaded {} controls ({} MMC, {} section, {} reverse mapped)",
            map.entries.len(),
            map.simple.len(),
            map.prefix.len() / map.sections.len(),
            map.reverse.len()
        );
        Ok(map)
    }

    /// Load the reference table from disk
    pub fn load_from_path(
        path: impl AsRef<Path>,
        sections: &[String],
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_csv(&content, sections)
    }

    pub fn entries(&self) -> &[ControlEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&ControlEntry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    /// Control number assigned to a named control
    pub fn control_number(&self, name: &str) -> Option<u8> {
        self.get(name).map(|e| e.control_number)
    }

    /// Exact match against the MMC table
    pub fn lookup_simple(&self, sysex: &str) -> Option<&ControlEntry> {
        self.simple.get(sysex).map(|&idx| &self.entries[idx])
    }

    /// Match a SysEx prefix, yielding the control and the section it addresses
    pub fn lookup_prefix(&self, prefix: &str) -> Option<(&ControlEntry, usize)> {
        self.prefix
            .get(prefix)
            .map(|&(idx, section)| (&self.entries[idx], section))
    }

    /// Section control that DAW feedback on `control_number` writes back to
    pub fn reverse_entry(&self, control_number: u8) -> Option<&ControlEntry> {
        self.reverse.get(&control_number).map(|&idx| &self.entries[idx])
    }

    pub fn is_reverse_mapped(&self, control_number: u8) -> bool {
        self.reverse.contains_key(&control_number)
    }

    /// Control numbers whose DAW feedback is written back to the piano
    pub fn reverse_control_numbers(&self) -> HashSet<u8> {
        self.reverse.keys().copied().collect()
    }

    /// The section/tone select control
    pub fn tone_entry(&self) -> &ControlEntry {
        &self.entries[self.tone]
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }

    pub fn section_index(&self, name: &str) -> Option<usize> {
        self.section_index.get(name).copied()
    }
}

/// Default embedded reference table
pub const DEFAULT_CSV: &str = include_str!("../docs/cc_midi_reference.csv");

static DEFAULT_MAP: OnceLock<ControlMap> = OnceLock::new();

pub fn default_section_names() -> Vec<String> {
    DEFAULT_SECTION_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Load the embedded control map for the default section layout (cached after first parse)
pub fn load_default_map() -> Result<ControlMap, ConfigError> {
    if let Some(map) = DEFAULT_MAP.get() {
        return Ok(map.clone());
    }

    let map = ControlMap::from_csv(DEFAULT_CSV, &default_section_names())?;
    // Ignore error if another thread set it first
    let _ = DEFAULT_MAP.set(map.clone());
    Ok(map)
}

fn invalid(control: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidControl {
        control: control.to_string(),
        reason: reason.into(),
    }
}

fn validate_prefix(control: &str, template: &str) -> Result<(), ConfigError> {
    let well_formed = template.len() == PREFIX_LEN
        && template
            .split(' ')
            .all(|pair| pair.len() == 2 && pair.chars().all(|c| c.is_ascii_hexdigit()));
    if well_formed {
        Ok(())
    } else {
        Err(invalid(
            control,
            format!("prefix '{}' is not {} characters of hex pairs", template, PREFIX_LEN),
        ))
    }
}

fn skip_rows(content: &str, rows: usize) -> &str {
    let mut rest = content;
    for _ in 0..rows {
        rest = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => "",
        };
    }
    rest
}
