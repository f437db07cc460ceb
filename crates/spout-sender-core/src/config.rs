use std::path::{Path, PathBuf};

use crate::error::SenderError;

/// Env var naming an explicit config file. Takes priority over discovery.
pub const CONFIG_ENV: &str = "SPOUT_SENDER_CONFIG";

/// File name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "spout_sender.json";

/// Spout stores sender names in a fixed 256-byte slot (including the terminator).
pub const MAX_CHANNEL_NAME_LEN: usize = 255;

/// How strictly to interpret/validate the config file.
///
/// - `Lenient` is forward-compatible: unknown fields are ignored and missing keys fall back to
///   the built-in constants.
/// - `Strict` is fail-fast: unknown fields and unsupported versions become errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Lenient,
    Strict,
}

/// Pixel format announced to the sharing subsystem with every published frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// Tone-mapped LDR color as produced by the renderer's `LdrColor` AOV.
    #[default]
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
}

impl PixelFormat {
    /// The matching `DXGI_FORMAT` value.
    pub fn dxgi_format(self) -> u32 {
        match self {
            PixelFormat::Rgba32Float => 2,
            PixelFormat::Rgba16Float => 10,
            PixelFormat::Rgba8Unorm => 28,
            PixelFormat::Bgra8Unorm => 87,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PixelFormat::Rgba8Unorm => "rgba8_unorm",
            PixelFormat::Bgra8Unorm => "bgra8_unorm",
            PixelFormat::Rgba16Float => "rgba16_float",
            PixelFormat::Rgba32Float => "rgba32_float",
        }
    }
}

/// Everything the export bridge needs to know up front.
///
/// The defaults are the values the plugin has always shipped with; a config file only
/// overrides them.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Name external receivers discover the channel by.
    #[serde(default = "default_channel_name")]
    pub channel_name: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Renderer attached to the active context when missing.
    #[serde(default = "default_engine_id")]
    pub engine_id: String,

    /// AOV forwarded to the channel.
    #[serde(default = "default_aov_name")]
    pub aov_name: String,

    /// Camera prim the shared texture renders from.
    #[serde(default = "default_viewpoint_path")]
    pub viewpoint_path: String,

    #[serde(default = "default_texture_name")]
    pub texture_name: String,

    #[serde(default)]
    pub pixel_format: PixelFormat,

    /// Update ticks between heartbeat log lines.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

/// Strict version of `ExportConfig` that fails on unknown fields.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ExportConfigStrict {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default = "default_channel_name")]
    channel_name: String,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default = "default_engine_id")]
    engine_id: String,
    #[serde(default = "default_aov_name")]
    aov_name: String,
    #[serde(default = "default_viewpoint_path")]
    viewpoint_path: String,
    #[serde(default = "default_texture_name")]
    texture_name: String,
    #[serde(default)]
    pixel_format: PixelFormat,
    #[serde(default = "default_heartbeat_interval")]
    heartbeat_interval: u64,
}

impl From<ExportConfigStrict> for ExportConfig {
    fn from(s: ExportConfigStrict) -> Self {
        Self {
            version: s.version,
            channel_name: s.channel_name,
            width: s.width,
            height: s.height,
            engine_id: s.engine_id,
            aov_name: s.aov_name,
            viewpoint_path: s.viewpoint_path,
            texture_name: s.texture_name,
            pixel_format: s.pixel_format,
            heartbeat_interval: s.heartbeat_interval,
        }
    }
}

fn default_version() -> u32 { 1 }
fn default_channel_name() -> String { "Omniverse".into() }
fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_engine_id() -> String { "rtx".into() }
fn default_aov_name() -> String { "LdrColor".into() }
fn default_viewpoint_path() -> String { "/OmniverseKit_Persp".into() }
fn default_texture_name() -> String { "spout_sender".into() }
fn default_heartbeat_interval() -> u64 { 1000 }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            channel_name: default_channel_name(),
            width: default_width(),
            height: default_height(),
            engine_id: default_engine_id(),
            aov_name: default_aov_name(),
            viewpoint_path: default_viewpoint_path(),
            texture_name: default_texture_name(),
            pixel_format: PixelFormat::default(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

impl ExportConfig {
    /// Semantic checks shared by both modes. `path` is only used for error reporting.
    pub fn validate(&self, path: &Path, mode: ConfigMode) -> Result<(), SenderError> {
        let invalid = |msg: String| SenderError::InvalidConfig {
            path: path.to_path_buf(),
            msg,
        };

        if mode == ConfigMode::Strict && self.version != 1 {
            return Err(invalid(format!(
                "unsupported version {} (expected 1)",
                self.version
            )));
        }
        if self.channel_name.trim().is_empty() {
            return Err(invalid("channel_name must not be empty".into()));
        }
        if self.channel_name.len() > MAX_CHANNEL_NAME_LEN {
            return Err(invalid(format!(
                "channel_name is {} bytes (max {MAX_CHANNEL_NAME_LEN})",
                self.channel_name.len()
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!(
                "resolution must be non-zero (got {}x{})",
                self.width, self.height
            )));
        }
        if self.heartbeat_interval == 0 {
            return Err(invalid("heartbeat_interval must be at least 1".into()));
        }
        if self.aov_name.is_empty() {
            return Err(invalid("aov_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Parse config text. `path` is only used for error reporting.
pub fn parse_export_config(
    src: &str,
    path: &Path,
    mode: ConfigMode,
) -> Result<ExportConfig, SenderError> {
    let json_err = |e| SenderError::Json {
        path: path.to_path_buf(),
        source: e,
    };
    let cfg: ExportConfig = match mode {
        ConfigMode::Lenient => serde_json::from_str(src).map_err(json_err)?,
        ConfigMode::Strict => serde_json::from_str::<ExportConfigStrict>(src)
            .map_err(json_err)?
            .into(),
    };
    cfg.validate(path, mode)?;
    Ok(cfg)
}

/// Read and parse a config file.
pub fn load_export_config(path: &Path, mode: ConfigMode) -> Result<ExportConfig, SenderError> {
    let src = std::fs::read_to_string(path).map_err(|e| SenderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_export_config(&src, path, mode)
}

/// Locate the config file.
///
/// Resolution order:
/// 1) `SPOUT_SENDER_CONFIG` env var (if set and the file exists)
/// 2) Search upward from `start_dir` for `spout_sender.json`
pub fn discover_config_path(start_dir: &Path) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        let pb = PathBuf::from(p);
        if pb.is_file() {
            return Some(pb);
        }
    }

    let mut cur = start_dir.to_path_buf();
    loop {
        let cand = cur.join(CONFIG_FILE_NAME);
        if cand.is_file() {
            return Some(cand);
        }
        if !cur.pop() {
            return None;
        }
    }
}

/// Discover and load the config, falling back to the built-in defaults when no file exists.
///
/// Returns the path the config came from, if any.
pub fn load_export_config_from(
    start_dir: &Path,
    mode: ConfigMode,
) -> Result<(ExportConfig, Option<PathBuf>), SenderError> {
    match discover_config_path(start_dir) {
        Some(path) => {
            let cfg = load_export_config(&path, mode)?;
            Ok((cfg, Some(path)))
        }
        None => Ok((ExportConfig::default(), None)),
    }
}
