//! Database acquisition: download, unpack, and install update packages.
//!
//! An update consists of two files:
//! - a control file: `"CZIP"` followed by five u32 LE fields
//!   `version, unknown1, size, unknown2, key` (`unknown1` is always 1)
//! - a payload of exactly `size` bytes: a zlib stream whose first 0x200
//!   bytes are XOR-scrambled with a key stream seeded by `key`
//!
//! The unpacked database is written next to a metadata file and can be
//! hot-reloaded into a [`GeoReader`].

use flate2::read::ZlibDecoder;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::binary::DatabaseImage;
use crate::error::{Result, UpdateError};
use crate::metadata::UpdateMetadata;
use crate::reader::GeoReader;

/// Default control file URL.
pub const DEFAULT_CONTROL_URL: &str = "http://update.cz88.net/ip/copywrite.rar";

/// Default payload URL.
pub const DEFAULT_PAYLOAD_URL: &str = "http://update.cz88.net/ip/qqwry.rar";

/// User agent sent with update requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; rv:38.0) Gecko/20100101 Firefox/38.0";

/// Default update interval (5 days).
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 24 * 60 * 60);

/// Magic bytes at the start of the control file.
pub const CONTROL_MAGIC: [u8; 4] = *b"CZIP";

/// Smallest acceptable control file.
const CONTROL_MIN_SIZE: usize = 25;

/// Number of leading payload bytes that are scrambled.
const SCRAMBLED_SIZE: usize = 0x200;

/// Fields of the update control file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHeader {
    /// Data version
    pub version: u32,
    /// Exact payload size in bytes
    pub size: u32,
    /// Seed of the scramble key stream
    pub key: u32,
}

/// A verified, unpacked database.
#[derive(Debug, Clone)]
pub struct DecodedPackage {
    /// Data version from the control file
    pub version: u32,
    /// Decompressed database image
    pub database: Vec<u8>,
}

fn le_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Parse the control file.
pub fn parse_control(data: &[u8]) -> std::result::Result<ControlHeader, UpdateError> {
    if data.len() < CONTROL_MIN_SIZE {
        return Err(UpdateError::BadControlHeader(format!(
            "{} bytes, expected at least {}",
            data.len(),
            CONTROL_MIN_SIZE
        )));
    }
    if data[..4] != CONTROL_MAGIC {
        return Err(UpdateError::BadControlHeader("missing CZIP magic".to_string()));
    }

    let version = le_u32(data, 4);
    let unknown1 = le_u32(data, 8);
    let size = le_u32(data, 12);
    let key = le_u32(data, 20);

    if unknown1 != 1 {
        return Err(UpdateError::BadControlHeader(format!(
            "unexpected field value {}",
            unknown1
        )));
    }

    Ok(ControlHeader { version, size, key })
}

/// XOR the scrambled head of a payload with the key stream, in place.
///
/// The operation is its own inverse.
pub fn unscramble(payload: &mut [u8], mut key: u32) {
    let len = payload.len().min(SCRAMBLED_SIZE);
    for byte in &mut payload[..len] {
        key = key.wrapping_mul(0x805).wrapping_add(1) & 0xff;
        *byte ^= key as u8;
    }
}

/// Inflate a zlib stream.
pub fn inflate(data: &[u8]) -> std::result::Result<Vec<u8>, UpdateError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(UpdateError::Decompress)?;
    Ok(out)
}

/// Verify and unpack a downloaded package.
pub fn decode_package(
    control: &[u8],
    payload: &[u8],
) -> std::result::Result<DecodedPackage, UpdateError> {
    let header = parse_control(control)?;

    if header.size as usize != payload.len() {
        return Err(UpdateError::SizeMismatch {
            expected: header.size as usize,
            actual: payload.len(),
        });
    }

    let mut data = payload.to_vec();
    unscramble(&mut data, header.key);
    let database = inflate(&data)?;

    DatabaseImage::validate(&database).map_err(UpdateError::Invalid)?;

    Ok(DecodedPackage {
        version: header.version,
        database,
    })
}

fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// Configuration for [`Updater`].
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Control file URL
    pub control_url: String,
    /// Payload URL
    pub payload_url: String,
    /// User agent header
    pub user_agent: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Minimum age of the installed database before `update_if_needed` fetches
    pub update_interval: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            control_url: DEFAULT_CONTROL_URL.to_string(),
            payload_url: DEFAULT_PAYLOAD_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(60),
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }
}

impl UpdateConfig {
    /// Use custom control and payload URLs.
    pub fn with_urls(mut self, control_url: &str, payload_url: &str) -> Self {
        self.control_url = control_url.to_string();
        self.payload_url = payload_url.to_string();
        self
    }

    /// Set a custom request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom update interval.
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }
}

/// Downloads update packages and installs them at a fixed path.
///
/// # Example
///
/// ```ignore
/// use k2geo::{GeoReader, update::Updater};
///
/// let reader = GeoReader::new();
/// let updater = Updater::new("/var/lib/k2geo/qqwry.dat");
///
/// if updater.needs_update() {
///     updater.update_into(&reader)?;
/// }
/// ```
pub struct Updater {
    config: UpdateConfig,
    output: PathBuf,
}

impl Updater {
    /// Create an updater with default configuration.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self::with_config(output, UpdateConfig::default())
    }

    /// Create an updater with custom configuration.
    pub fn with_config(output: impl AsRef<Path>, config: UpdateConfig) -> Self {
        Self {
            config,
            output: output.as_ref().to_path_buf(),
        }
    }

    /// Path the database is installed at.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.output.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    /// Get the path to the metadata file.
    pub fn metadata_path(&self) -> PathBuf {
        self.sibling(".meta")
    }

    /// Get the path for the temporary download file.
    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    /// Get the configuration.
    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    fn installed(&self) -> Option<UpdateMetadata> {
        match UpdateMetadata::read(self.metadata_path()) {
            Ok(meta) => meta,
            Err(e) => {
                log::warn!("Ignoring update metadata: {}", e);
                None
            }
        }
    }

    /// Get the last update time.
    pub fn last_updated(&self) -> Option<SystemTime> {
        self.installed().map(|m| m.installed_at())
    }

    /// Version of the installed database, if recorded.
    pub fn installed_version(&self) -> Option<u32> {
        self.installed().map(|m| m.version)
    }

    /// Check if an update is needed.
    ///
    /// True when the database or its metadata is missing, the file size no
    /// longer matches the recorded one, or the update interval has passed.
    pub fn needs_update(&self) -> bool {
        let Ok(file) = fs::metadata(&self.output) else {
            return true;
        };
        match self.installed() {
            Some(meta) => meta.size != file.len() || meta.is_stale(self.config.update_interval),
            None => true,
        }
    }

    fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, UpdateError> {
        let agent = ureq::AgentBuilder::new()
            .timeout(self.config.timeout)
            .user_agent(&self.config.user_agent)
            .build();

        let response = agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => UpdateError::Transport(format!("{}: HTTP {}", url, code)),
            ureq::Error::Transport(t) => UpdateError::Transport(format!("{}: {}", url, t)),
        })?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| UpdateError::Transport(format!("{}: {}", url, e)))?;

        log::debug!("Fetched {}: {} bytes", url, bytes.len());
        Ok(bytes)
    }

    /// Download and unpack the current package without installing it.
    pub fn download(&self) -> std::result::Result<DecodedPackage, UpdateError> {
        let control = self.fetch(&self.config.control_url)?;
        let header = parse_control(&control)?;
        log::info!(
            "Update control: version {}, payload {} bytes",
            header.version,
            header.size
        );

        let payload = self.fetch(&self.config.payload_url)?;
        decode_package(&control, &payload)
    }

    /// Atomically write a package to the output path and record metadata.
    ///
    /// The package is validated first; an invalid one leaves the installed
    /// database and its metadata untouched.
    pub fn install(&self, package: &DecodedPackage) -> std::result::Result<(), UpdateError> {
        DatabaseImage::validate(&package.database).map_err(UpdateError::Invalid)?;

        if let Some(parent) = self.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(UpdateError::Write)?;
            }
        }

        let temp_path = self.temp_path();
        if let Err(e) = write_synced(&temp_path, &package.database)
            .and_then(|()| fs::rename(&temp_path, &self.output))
        {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Failed to remove {:?}: {}", temp_path, cleanup);
                }
            }
            return Err(UpdateError::Write(e));
        }

        let meta = UpdateMetadata::describe(&package.database, package.version);
        if let Err(e) = meta.write(self.metadata_path()) {
            log::warn!("Failed to save update metadata: {}", e);
        }

        log::info!(
            "Installed database version {} at {:?}: {} bytes",
            package.version,
            self.output,
            package.database.len()
        );
        Ok(())
    }

    /// Download and install. Returns the size of the installed database.
    pub fn update(&self) -> std::result::Result<usize, UpdateError> {
        let package = self.download()?;
        self.install(&package)?;
        Ok(package.database.len())
    }

    /// Update only if the configured interval has elapsed.
    ///
    /// Returns `Some(size)` if an update was installed.
    pub fn update_if_needed(&self) -> std::result::Result<Option<usize>, UpdateError> {
        if self.needs_update() {
            self.update().map(Some)
        } else {
            log::debug!("Database is current, skipping update");
            Ok(None)
        }
    }

    /// Install a package and hot-reload it into `reader`.
    pub fn install_into(&self, package: &DecodedPackage, reader: &GeoReader) -> Result<()> {
        self.install(package)?;
        reader.load_file(&self.output)?;
        Ok(())
    }

    /// Download, install, and hot-reload into `reader`.
    pub fn update_into(&self, reader: &GeoReader) -> Result<usize> {
        let package = self.download()?;
        self.install_into(&package, reader)?;
        Ok(package.database.len())
    }
}
