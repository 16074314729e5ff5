use anyhow::{Result, bail};

pub fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3600000f64) as u64;
    let minutes = ((ms % 3600000f64) / 60000f64) as u64;
    let seconds = ((ms % 60000f64) / 1000f64) as u64;
    let milliseconds = (ms % 1000f64) as u64;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Parses `SS[.fff]`, `MM:SS[.fff]` or `HH:MM:SS[.fff]` into seconds.
pub fn parse_time(s: &str) -> Result<f64> {
    let mut seconds = 0f64;
    let mut fields = 0;

    for part in s.trim().split(':') {
        fields += 1;
        if fields > 3 {
            bail!("Invalid time '{s}': too many fields");
        }

        let value: f64 = match part.parse() {
            Ok(v) if v >= 0.0 && f64::is_finite(v) => v,
            _ => bail!("Invalid time '{s}'"),
        };
        seconds = seconds * 60.0 + value;
    }

    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(time_str(0.0), "00:00:00.000");
        assert_eq!(time_str(3723.5), "01:02:03.500");
        assert_eq!(time_str(360_000.0), "100:00:00.000");
    }

    #[test]
    fn parses_clock_and_seconds() -> Result<()> {
        assert_eq!(parse_time("90")?, 90.0);
        assert_eq!(parse_time("1:30.5")?, 90.5);
        assert_eq!(parse_time("01:00:00")?, 3600.0);
        assert!(parse_time("").is_err());
        assert!(parse_time("-3").is_err());
        assert!(parse_time("1:2:3:4").is_err());
        Ok(())
    }
}
