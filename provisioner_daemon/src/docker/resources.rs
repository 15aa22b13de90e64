use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ResourceError {
    #[error("Invalid cpus value '{0}'.")]
    InvalidCpus(String),
    #[error("Invalid memory value '{0}'.")]
    InvalidMemory(String),
}

const NANO_CPUS_PER_CPU: f64 = 1_000_000_000.0;

/// `i64::MAX as f64` rounds up to 2^63, which is already out of range.
fn to_quantity(value: f64) -> Option<i64> {
    let rounded = value.round();
    (rounded.is_finite() && rounded < i64::MAX as f64).then_some(rounded as i64)
}

/// Fractional cores to a CPU quota in units of 1e-9 cores.
/// An empty value means no limit.
pub fn parse_cpus(cpus: &str) -> Result<Option<i64>, ResourceError> {
    let cpus = cpus.trim();
    if cpus.is_empty() {
        return Ok(None);
    }
    let value: f64 = cpus
        .parse()
        .map_err(|_| ResourceError::InvalidCpus(cpus.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ResourceError::InvalidCpus(cpus.to_string()));
    }
    to_quantity(value * NANO_CPUS_PER_CPU)
        .map(Some)
        .ok_or_else(|| ResourceError::InvalidCpus(cpus.to_string()))
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    match unit {
        "" | "b" => Some(1.0),
        "k" | "kb" => Some(1e3),
        "m" | "mb" => Some(1e6),
        "g" | "gb" => Some(1e9),
        "t" | "tb" => Some(1e12),
        _ => None,
    }
}

/// Human readable size with decimal units, e.g. "5gb" or "512 MB", to bytes.
/// An empty value means no limit.
pub fn parse_memory(memory: &str) -> Result<Option<i64>, ResourceError> {
    let memory = memory.trim();
    if memory.is_empty() {
        return Ok(None);
    }
    let invalid = || ResourceError::InvalidMemory(memory.to_string());

    let split = memory
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(memory.len());
    let (number, unit) = memory.split_at(split);
    let value: f64 = number.parse().map_err(|_| invalid())?;
    let multiplier = unit_multiplier(&unit.trim().to_ascii_lowercase()).ok_or_else(invalid)?;

    to_quantity(value * multiplier).map(Some).ok_or_else(invalid)
}

#[cfg(test)]
mod test {
    use super::*;
    use parameterized::parameterized;

    #[parameterized(cpus = {"2.5", "1", "0.25", " 4 "}, expected = {2_500_000_000, 1_000_000_000, 250_000_000, 4_000_000_000})]
    fn cpus(cpus: &str, expected: i64) {
        assert_eq!(parse_cpus(cpus), Ok(Some(expected)));
    }

    #[test]
    fn cpus_empty() {
        assert_eq!(parse_cpus(""), Ok(None));
    }

    #[parameterized(cpus = {"two", "-1", "NaN", "inf", "1e30", "9300000000"})]
    fn cpus_invalid(cpus: &str) {
        assert!(matches!(parse_cpus(cpus), Err(ResourceError::InvalidCpus(_))));
    }

    #[parameterized(memory = {"5gb", "5GB", "5g", "512 mb", "1.5k", "100", "2tb"},
                    expected = {5_000_000_000, 5_000_000_000, 5_000_000_000, 512_000_000, 1_500, 100, 2_000_000_000_000})]
    fn memory(memory: &str, expected: i64) {
        assert_eq!(parse_memory(memory), Ok(Some(expected)));
    }

    #[test]
    fn memory_empty() {
        assert_eq!(parse_memory("  "), Ok(None));
    }

    #[parameterized(memory = {"gb", "5pb", "-5gb", "5.5.5mb", "99999999999999tb", "9300000000000000000"})]
    fn memory_invalid(memory: &str) {
        assert!(matches!(
            parse_memory(memory),
            Err(ResourceError::InvalidMemory(_))
        ));
    }
}
