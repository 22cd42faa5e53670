//! Cache occupancy reporting

use serde::Serialize;
use std::fmt;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Cache size status relative to configured limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSizeStatus {
    /// Under 80% of limit
    Ok,
    /// Between 80% and 100% of limit
    Warning,
    /// Over the limit, the next prune will evict files
    Exceeded,
}

impl CacheSizeStatus {
    /// Determine status based on current size and limit
    pub fn from_usage(current_bytes: u64, limit_bytes: u64) -> Self {
        if limit_bytes == 0 {
            return if current_bytes == 0 {
                Self::Ok
            } else {
                Self::Exceeded
            };
        }
        let percent = Self::percentage(current_bytes, limit_bytes);
        if current_bytes > limit_bytes {
            Self::Exceeded
        } else if percent >= 80.0 {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    /// Get percentage of limit used
    pub fn percentage(current_bytes: u64, limit_bytes: u64) -> f64 {
        if limit_bytes == 0 {
            return 0.0;
        }
        (current_bytes as f64 / limit_bytes as f64) * 100.0
    }
}

impl fmt::Display for CacheSizeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Exceeded => write!(f, "exceeded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(10 * 1024 * 1024), "10.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn size_status_thresholds() {
        assert_eq!(CacheSizeStatus::from_usage(10, 100), CacheSizeStatus::Ok);
        assert_eq!(CacheSizeStatus::from_usage(80, 100), CacheSizeStatus::Warning);
        assert_eq!(CacheSizeStatus::from_usage(100, 100), CacheSizeStatus::Warning);
        assert_eq!(CacheSizeStatus::from_usage(101, 100), CacheSizeStatus::Exceeded);
    }

    #[test]
    fn size_status_zero_limit() {
        assert_eq!(CacheSizeStatus::from_usage(0, 0), CacheSizeStatus::Ok);
        assert_eq!(CacheSizeStatus::from_usage(1, 0), CacheSizeStatus::Exceeded);
        assert_eq!(CacheSizeStatus::percentage(1, 0), 0.0);
    }
}
