//! Human-readable rendering for operator-facing output.

use std::time::Duration;

const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Render a byte count with a binary unit suffix.
///
/// # Arguments
/// * `size` - Size in bytes
/// * `precision` - Digits after the decimal point
///
/// # Returns
/// e.g. `"1.50MB"`; plain bytes are printed without decimals.
pub fn convert_file_size(size: u64, precision: usize) -> String {
    let mut value: f64 = size as f64;
    let mut unit: usize = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{}{}", size, UNITS[0])
    } else {
        format!("{:.*}{}", precision, value, UNITS[unit])
    }
}

/// Render a duration as `h:mm:ss`, or `m:ss` under an hour.
pub fn convert_time(duration: Duration) -> String {
    let total: u64 = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_file_size() {
        assert_eq!(convert_file_size(512, 2), "512B");
        assert_eq!(convert_file_size(1536, 2), "1.50KB");
        assert_eq!(convert_file_size(10 * 1024 * 1024, 1), "10.0MB");
    }

    #[test]
    fn test_convert_time() {
        assert_eq!(convert_time(Duration::from_secs(5)), "0:05");
        assert_eq!(convert_time(Duration::from_secs(125)), "2:05");
        assert_eq!(convert_time(Duration::from_secs(3725)), "1:02:05");
    }
}
