//! Constants and configuration values for Revisit
//!
//! Centralizes the catalogs, weights and thresholds the engine is tuned with,
//! plus file locations and IPC limits. Other modules should not carry magic numbers.

use std::time::Duration;

/// File system locations
pub mod paths {
    use std::path::PathBuf;

    /// Name of the per-user config/data directory
    pub const APP_DIR: &str = "revisit";

    /// Settings file inside the config directory
    pub const SETTINGS_FILE: &str = "settings.json";

    /// Known-identity store file name
    pub const STORE_FILE: &str = "fp_data.csv";

    /// Directory holding named capture files
    pub const CAPTURE_DIR: &str = "captures";

    /// Default daemon socket
    pub const SOCKET_PATH: &str = "/run/revisit/revisit.sock";

    /// User configuration directory (`$XDG_CONFIG_HOME/revisit`)
    pub fn user_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR))
    }

    /// User data directory, where the store and captures live by default
    pub fn user_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

/// Attribute names used by the engine
pub mod attributes {
    pub const SCREEN_WIDTH: &str = "Screen Width";
    pub const SCREEN_HEIGHT: &str = "Screen Height";
    pub const CPU: &str = "CPU";
    pub const MEMORY: &str = "Memory";

    /// Sentinel the browser reports for an API it refuses to answer
    pub const UNDEFINED: &str = "undefined";

    /// A submission without these is rejected before matching
    pub const REQUIRED: [&str; 3] = [SCREEN_WIDTH, SCREEN_HEIGHT, CPU];

    /// Collection order of the browser client. Complex weights are positional,
    /// so every attribute map is rebuilt in this order at ingestion.
    pub const CANONICAL_ORDER: [&str; 28] = [
        "IP",
        CPU,
        MEMORY,
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        "Usable Screen Width",
        "Usable Screen Height",
        "Color Depth",
        "Touch Screen",
        "Browser name",
        "Browser core",
        "Navigator properties",
        "Browser permissions",
        "IndexedDB",
        "Open database",
        "Local storage",
        "Session storage",
        "Global Storage",
        "PDF Viewer",
        "Cookies Enabled",
        "Do not track",
        "AdBlock",
        "Navigator Vendor",
        "Vendor",
        "Unmasked Vendor",
        "Renderer",
        "Unmasked Renderer",
        "Shading Langueage Versions",
    ];
}

/// Farbling detector catalogs
pub mod farbling {
    /// Physical resolutions seen in real-world usage data
    pub const COMMON_RESOLUTIONS: [[u32; 2]; 33] = [
        [640, 480], [800, 600], [1024, 768], [1152, 864], [1176, 664],
        [1280, 720], [1280, 800], [1280, 960], [1360, 768], [1366, 768],
        [1440, 900], [1600, 900], [1600, 1024], [1600, 1200], [1680, 1050],
        [1920, 1080], [1920, 1200], [1920, 1440], [2048, 1080], [2160, 1440],
        [2400, 1600], [2560, 1080], [2560, 1440], [2560, 1600], [3000, 2000],
        [3024, 1964], [3240, 2160], [3440, 1440], [3840, 1600], [3840, 2160],
        [5120, 2160], [5120, 2880], [7680, 4320],
    ];

    /// 0.5 covers high-DPR devices reporting CSS pixels
    pub const RESOLUTION_SCALES: [f64; 2] = [1.0, 0.5];

    /// Both axis ratios must fall strictly inside this band
    pub const RATIO_MIN: f64 = 0.85;
    pub const RATIO_MAX: f64 = 1.15;

    /// Ratios this close to 1.0 count as an exact catalog hit
    pub const EXACT_EPSILON: f64 = 1e-5;

    pub const COMMON_CPU_COUNTS: [i64; 14] = [2, 4, 6, 8, 10, 11, 12, 14, 16, 20, 24, 32, 64, 96];

    /// navigator.deviceMemory buckets in GB
    pub const MEMORY_BUCKETS_GB: [f64; 6] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0];
}

/// Naive matcher thresholds
pub mod naive {
    /// Compared hash fields plus canonical attributes; an identical submission scores this
    pub const MAX_MATCH: u32 = 36;

    /// Scores strictly above this accept a match without an important-hash hit
    pub const THRESHOLD: u32 = 33;
}

/// Complex matcher weights
pub mod complex {
    pub const AUDIO_WEIGHT: u32 = 10;
    pub const GEOM_CANVAS_WEIGHT: u32 = 10;
    pub const TXT_CANVAS_WEIGHT: u32 = 10;
    pub const FONTS_WEIGHT: u32 = 2;
    pub const MEDIA_HASH_WEIGHT: u32 = 4;
    pub const PLUGINS_HASH_WEIGHT: u32 = 4;

    /// Per-position attribute weights, indexed by the record's attribute order
    pub const ATTRIBUTE_WEIGHTS: [u32; 30] = [
        2, 2, 3, 2, 2,
        2, 2, 2, 2, 5,
        5, 3, 3, 2, 2,
        1, 1, 1, 1, 1,
        1, 2, 1, 2, 2,
        2, 2, 2, 2, 2,
    ];

    /// Lowest acceptance threshold
    pub const THRESHOLD_FLOOR: f64 = 70.0;

    /// Added to the mean score before taking the floor
    pub const THRESHOLD_MARGIN: f64 = 5.0;
}

/// Store file limits
pub mod limits {
    /// Largest settings file accepted (1MB)
    pub const MAX_SETTINGS_SIZE: u64 = 1024 * 1024;
}

/// Daemon and client timing
pub mod daemon {
    use super::Duration;

    /// Client-side socket timeout
    pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Server-side wait for a complete request line
    pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

    /// Server-side limit for writing a response
    pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Concurrent client connections
    pub const MAX_CONNECTIONS: usize = 64;

    /// Socket file mode
    pub const SOCKET_PERMISSIONS: u32 = 0o660;
}
