// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Formats a duration in seconds into a human-readable `MM:SS` string.
///
/// This is used for logging track durations.
///
/// # Arguments
///
/// * `total_seconds` - The duration to format, represented as a 64-bit integer.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_time(65), "01:05");
/// assert_eq!(format_time(3600), "60:00");
/// ```
pub(crate) fn format_time(total_seconds: u64) -> String {
    let mins = total_seconds / 60;
    let secs = total_seconds % 60;
    format!("{:02}:{:02}", mins, secs)
}

/// Formats a byte count using decimal (base 1000) units with two decimals.
///
/// Petabytes is the largest unit, larger values are never reduced further.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(999), "999.00 B");
/// assert_eq!(format_size(1_000_000), "1.00 MB");
/// ```
pub(crate) fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1000.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1000.0;
        unit += 1;
    }

    format!("{:.2} {}", size, SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_time_as_minutes_and_seconds() {
        assert_eq!(format_time(0), "00:00");
        assert_eq!(format_time(65), "01:05");
        assert_eq!(format_time(3600), "60:00");
    }

    #[test]
    fn formats_sizes_below_one_kilobyte_in_bytes() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(999), "999.00 B");
    }

    #[test]
    fn formats_sizes_in_decimal_units() {
        assert_eq!(format_size(1000), "1.00 KB");
        assert_eq!(format_size(1_500), "1.50 KB");
        assert_eq!(format_size(1_000_000), "1.00 MB");
        assert_eq!(format_size(3_210_000_000), "3.21 GB");
    }

    #[test]
    fn petabytes_is_the_largest_unit() {
        assert_eq!(format_size(1_000_000_000_000_000), "1.00 PB");
        assert_eq!(format_size(5_000_000_000_000_000_000), "5000.00 PB");
    }
}
