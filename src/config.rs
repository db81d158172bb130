use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories::BaseDirs;
use serde::Deserialize;

use crate::normalize::attendance::{AttendanceParser, DEFAULT_INACTIVE_MARKERS};
use crate::normalize::{ColumnMap, RowNormalizer};

const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "roster.db";
const APP_NAME: &str = "roster";

#[derive(Debug, Clone)]
pub struct Config {
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub import: ImportConfig,
    pub attendance: AttendanceConfig,
}

impl Config {
    pub fn row_normalizer(&self) -> Result<RowNormalizer> {
        Ok(RowNormalizer::new(
            self.import.columns.clone(),
            self.attendance.parser()?,
        ))
    }
}

// =============================================================================
// Import Configuration
// =============================================================================

/// Where roster fields live in the workbook
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Worksheet to read; the first sheet when unset
    pub sheet: Option<String>,
    /// Leading rows (headers) to skip
    pub header_rows: usize,
    pub columns: ColumnMap,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            header_rows: 1,
            columns: ColumnMap::default(),
        }
    }
}

// =============================================================================
// Attendance Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct AttendanceConfig {
    /// Case-insensitive substrings marking a member as inactive
    pub inactive_markers: Vec<String>,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            inactive_markers: DEFAULT_INACTIVE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl AttendanceConfig {
    pub fn parser(&self) -> Result<AttendanceParser> {
        AttendanceParser::new(self.inactive_markers.as_slice())
            .context("invalid attendance.inactive_markers")
    }
}

/// Convert a spreadsheet column letter (`A`, `M`, `AA`) to a zero-based index.
pub fn column_index(letters: &str) -> Result<usize> {
    let trimmed = letters.trim();
    if trimmed.is_empty() {
        bail!("empty column reference");
    }

    let mut index = 0usize;
    for c in trimmed.chars() {
        if !c.is_ascii_alphabetic() {
            bail!("invalid column reference '{}', expected letters like A or AB", trimmed);
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| anyhow!("column reference '{}' is too large", trimmed))?;
    }
    Ok(index - 1)
}

fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

// =============================================================================
// File Deserialization
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    db_path: Option<PathBuf>,
    import: ImportFile,
    attendance: AttendanceFile,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ImportFile {
    sheet: Option<String>,
    header_rows: usize,
    columns: ColumnsFile,
}

impl Default for ImportFile {
    fn default() -> Self {
        let defaults = ImportConfig::default();
        Self {
            sheet: defaults.sheet,
            header_rows: defaults.header_rows,
            columns: ColumnsFile::default(),
        }
    }
}

impl ImportFile {
    fn into_config(self) -> Result<ImportConfig> {
        let sheet = self
            .sheet
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(ImportConfig {
            sheet,
            header_rows: self.header_rows,
            columns: self.columns.into_map()?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ColumnsFile {
    first_name: String,
    last_name: String,
    phone: String,
    board_contact: String,
    outreach_notes: String,
    attendance: String,
    email: String,
    tickets_feb: String,
    tickets_apr: String,
}

impl Default for ColumnsFile {
    fn default() -> Self {
        let defaults = ColumnMap::default();
        Self {
            first_name: column_letters(defaults.first_name),
            last_name: column_letters(defaults.last_name),
            phone: column_letters(defaults.phone),
            board_contact: column_letters(defaults.board_contact),
            outreach_notes: column_letters(defaults.outreach_notes),
            attendance: column_letters(defaults.attendance),
            email: column_letters(defaults.email),
            tickets_feb: column_letters(defaults.tickets_feb),
            tickets_apr: column_letters(defaults.tickets_apr),
        }
    }
}

impl ColumnsFile {
    fn into_map(self) -> Result<ColumnMap> {
        let col = |name: &str, letters: &str| {
            column_index(letters).with_context(|| format!("invalid import.columns.{}", name))
        };
        Ok(ColumnMap {
            first_name: col("first_name", &self.first_name)?,
            last_name: col("last_name", &self.last_name)?,
            phone: col("phone", &self.phone)?,
            board_contact: col("board_contact", &self.board_contact)?,
            outreach_notes: col("outreach_notes", &self.outreach_notes)?,
            attendance: col("attendance", &self.attendance)?,
            email: col("email", &self.email)?,
            tickets_feb: col("tickets_feb", &self.tickets_feb)?,
            tickets_apr: col("tickets_apr", &self.tickets_apr)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct AttendanceFile {
    inactive_markers: Vec<String>,
}

impl Default for AttendanceFile {
    fn default() -> Self {
        Self {
            inactive_markers: AttendanceConfig::default().inactive_markers,
        }
    }
}

// =============================================================================
// Locations
// =============================================================================

/// Expand ~ to home directory in paths
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = home::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

fn config_root() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine base directories")?;
    Ok(base.config_dir().join(APP_NAME))
}

pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_root()?.join(CONFIG_FILE_NAME))
}

pub fn default_db_path() -> Result<PathBuf> {
    let base = BaseDirs::new().context("unable to determine data directories")?;
    Ok(base.data_dir().join(APP_NAME).join(DB_FILE_NAME))
}

// =============================================================================
// Loading
// =============================================================================

pub fn load(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => expand_tilde(p),
        None => default_config_path()?,
    };
    if !path.exists() {
        bail!(
            "configuration file not found at {}. Run 'roster init' to create one.",
            path.display()
        );
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration file at {}", path.display()))?;

    let config = parse_str(&raw, &path)?;
    log::info!("loaded configuration from {}", path.display());
    Ok(config)
}

/// Parse configuration text; `path` locates the file for relative paths and messages.
pub fn parse_str(raw: &str, path: &Path) -> Result<Config> {
    let value: toml::Value = toml::from_str(raw)
        .with_context(|| format!("failed to parse {} as TOML", path.display()))?;

    warn_unknown_keys(&value);

    let cfg_file: ConfigFile = value
        .try_into()
        .with_context(|| format!("failed to deserialize config from {}", path.display()))?;

    let import = cfg_file.import.into_config()?;

    let attendance = AttendanceConfig {
        inactive_markers: cfg_file.attendance.inactive_markers,
    };
    // validate markers now
    attendance.parser()?;

    let db_path = match cfg_file.db_path {
        Some(p) => {
            let expanded = expand_tilde(&p);
            if expanded.is_relative() {
                path.parent()
                    .map(|dir| dir.join(&expanded))
                    .unwrap_or(expanded)
            } else {
                expanded
            }
        }
        None => default_db_path()?,
    };

    Ok(Config {
        config_path: path.to_path_buf(),
        db_path,
        import,
        attendance,
    })
}

/// Default configuration file contents pointing at `db_path`.
pub fn render_default(db_path: &Path) -> String {
    let columns = ColumnsFile::default();
    let markers = AttendanceConfig::default()
        .inactive_markers
        .iter()
        .map(|m| toml::Value::String(m.clone()).to_string())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"db_path = {db_path}

[import]
# sheet = "Sheet1"
header_rows = 1

[import.columns]
first_name = "{first_name}"
last_name = "{last_name}"
phone = "{phone}"
board_contact = "{board_contact}"
outreach_notes = "{outreach_notes}"
attendance = "{attendance}"
email = "{email}"
tickets_feb = "{tickets_feb}"
tickets_apr = "{tickets_apr}"

[attendance]
inactive_markers = [{markers}]
"#,
        db_path = toml::Value::String(db_path.to_string_lossy().into_owned()),
        first_name = columns.first_name,
        last_name = columns.last_name,
        phone = columns.phone,
        board_contact = columns.board_contact,
        outreach_notes = columns.outreach_notes,
        attendance = columns.attendance,
        email = columns.email,
        tickets_feb = columns.tickets_feb,
        tickets_apr = columns.tickets_apr,
        markers = markers,
    )
}

pub fn write_default(path: &Path, db_path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Configuration already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create config dir: {}", dir.display()))?;
        }
    }
    fs::write(path, render_default(db_path))
        .with_context(|| format!("failed to write configuration to {}", path.display()))?;
    Ok(())
}

// =============================================================================
// Unknown key warnings
// =============================================================================

fn warn_unknown_keys(value: &toml::Value) {
    let Some(table) = value.as_table() else {
        return;
    };

    warn_unknown_in_context(value, "", &["db_path", "import", "attendance"]);

    if let Some(import_val) = table.get("import") {
        warn_unknown_in_context(import_val, "import", &["sheet", "header_rows", "columns"]);
        if let Some(columns_val) = import_val.get("columns") {
            warn_unknown_in_context(
                columns_val,
                "import.columns",
                &[
                    "first_name",
                    "last_name",
                    "phone",
                    "board_contact",
                    "outreach_notes",
                    "attendance",
                    "email",
                    "tickets_feb",
                    "tickets_apr",
                ],
            );
        }
    }

    if let Some(attendance_val) = table.get("attendance") {
        warn_unknown_in_context(attendance_val, "attendance", &["inactive_markers"]);
    }
}

fn warn_unknown_in_context(value: &toml::Value, context: &str, known: &[&str]) {
    let Some(table) = value.as_table() else {
        return;
    };
    let known: HashSet<&str> = known.iter().copied().collect();
    for key in table.keys() {
        if !known.contains(key.as_str()) {
            if context.is_empty() {
                log::warn!("unknown configuration key `{}`", key);
            } else {
                log::warn!("unknown {} entry `{}`", context, key);
            }
        }
    }
}
