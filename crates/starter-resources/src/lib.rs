//! CPU and RAM resource string parsing/formatting.
//!
//! Kubernetes-style resource quantities (`"500m"`, `"4Gi"`, `"2"`) are parsed
//! into integer base units — millicpu for CPU, MiB for RAM — and back.
//! Units are modeled as closed enums rather than string-keyed lookup tables
//! so an unrecognized suffix is a parse error, not a silent `None`.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceParseError {
    #[error("invalid resource string: '{0}'")]
    InvalidFormat(String),
    #[error("invalid unit suffix: '{0}'")]
    InvalidUnit(String),
}

/// CPU unit suffix. `Whole` is the bare (no-suffix) quantity, one full cpu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuUnit {
    Whole,
    Milli,
    Nano,
}

impl CpuUnit {
    /// Fraction of one cpu represented by a single unit of this kind.
    const fn fraction_of_cpu(self) -> f64 {
        match self {
            CpuUnit::Whole => 1.0,
            CpuUnit::Milli => 1e-3,
            CpuUnit::Nano => 1e-9,
        }
    }

    fn from_suffix(suffix: Option<&str>) -> Result<Self, ResourceParseError> {
        match suffix {
            None => Ok(CpuUnit::Whole),
            Some("m") => Ok(CpuUnit::Milli),
            Some("n") => Ok(CpuUnit::Nano),
            Some(other) => Err(ResourceParseError::InvalidUnit(other.to_string())),
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            CpuUnit::Whole => "",
            CpuUnit::Milli => "m",
            CpuUnit::Nano => "n",
        }
    }
}

/// RAM unit suffix. `Bytes` is the bare (no-suffix) quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamUnit {
    Bytes,
    K,
    M,
    G,
    T,
    P,
    E,
    Ki,
    Mi,
    Gi,
    Ti,
    Pi,
    Ei,
}

impl RamUnit {
    const fn bytes_per_unit(self) -> f64 {
        match self {
            RamUnit::Bytes => 1.0,
            RamUnit::K => 1e3,
            RamUnit::M => 1e6,
            RamUnit::G => 1e9,
            RamUnit::T => 1e12,
            RamUnit::P => 1e15,
            RamUnit::E => 1e18,
            RamUnit::Ki => (1u64 << 10) as f64,
            RamUnit::Mi => (1u64 << 20) as f64,
            RamUnit::Gi => (1u64 << 30) as f64,
            RamUnit::Ti => (1u64 << 40) as f64,
            RamUnit::Pi => (1u64 << 50) as f64,
            RamUnit::Ei => (1u64 << 60) as f64,
        }
    }

    fn from_suffix(suffix: Option<&str>) -> Result<Self, ResourceParseError> {
        match suffix {
            None => Ok(RamUnit::Bytes),
            Some("K") => Ok(RamUnit::K),
            Some("M") => Ok(RamUnit::M),
            Some("G") => Ok(RamUnit::G),
            Some("T") => Ok(RamUnit::T),
            Some("P") => Ok(RamUnit::P),
            Some("E") => Ok(RamUnit::E),
            Some("Ki") => Ok(RamUnit::Ki),
            Some("Mi") => Ok(RamUnit::Mi),
            Some("Gi") => Ok(RamUnit::Gi),
            Some("Ti") => Ok(RamUnit::Ti),
            Some("Pi") => Ok(RamUnit::Pi),
            Some("Ei") => Ok(RamUnit::Ei),
            Some(other) => Err(ResourceParseError::InvalidUnit(other.to_string())),
        }
    }

    const fn suffix(self) -> &'static str {
        match self {
            RamUnit::Bytes => "",
            RamUnit::K => "K",
            RamUnit::M => "M",
            RamUnit::G => "G",
            RamUnit::T => "T",
            RamUnit::P => "P",
            RamUnit::E => "E",
            RamUnit::Ki => "Ki",
            RamUnit::Mi => "Mi",
            RamUnit::Gi => "Gi",
            RamUnit::Ti => "Ti",
            RamUnit::Pi => "Pi",
            RamUnit::Ei => "Ei",
        }
    }
}

static CPU_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+|\d+\.\d+)([mn])?$").unwrap());
static RAM_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+|\d+\.\d+)(K|M|G|T|P|E|Ki|Mi|Gi|Ti|Pi|Ei)?$").unwrap());

/// `int(round(x, 6))`: round to 6 decimal places to absorb float noise, then
/// truncate toward zero rather than to the nearest integer.
fn convert(value: f64, src_unit: f64, dst_unit: f64) -> i64 {
    if src_unit == dst_unit {
        return value as i64;
    }
    let scaled = value * src_unit / dst_unit;
    let rounded_to_6dp = (scaled * 1e6).round() / 1e6;
    rounded_to_6dp.trunc() as i64
}

/// Parse a CPU quantity string into millicpu.
pub fn cpu_from_str(value: &str) -> Result<i64, ResourceParseError> {
    cpu_from_str_as(value, CpuUnit::Milli)
}

pub fn cpu_from_str_as(value: &str, dst: CpuUnit) -> Result<i64, ResourceParseError> {
    let caps = CPU_REGEX
        .captures(value)
        .ok_or_else(|| ResourceParseError::InvalidFormat(value.to_string()))?;
    let number: f64 = caps[1].parse().expect("regex guarantees numeric");
    let src = CpuUnit::from_suffix(caps.get(2).map(|m| m.as_str()))?;
    Ok(convert(number, src.fraction_of_cpu(), dst.fraction_of_cpu()))
}

/// Format a millicpu quantity back into a CPU quantity string.
pub fn cpu_to_str(value: i64) -> String {
    cpu_to_str_from(value, CpuUnit::Milli, CpuUnit::Milli)
}

pub fn cpu_to_str_from(value: i64, src: CpuUnit, dst: CpuUnit) -> String {
    let converted = convert(value as f64, src.fraction_of_cpu(), dst.fraction_of_cpu());
    format!("{converted}{}", dst.suffix())
}

/// Parse a RAM quantity string into MiB.
pub fn ram_from_str(value: &str) -> Result<i64, ResourceParseError> {
    ram_from_str_as(value, RamUnit::Mi)
}

pub fn ram_from_str_as(value: &str, dst: RamUnit) -> Result<i64, ResourceParseError> {
    let caps = RAM_REGEX
        .captures(value)
        .ok_or_else(|| ResourceParseError::InvalidFormat(value.to_string()))?;
    let number: f64 = caps[1].parse().expect("regex guarantees numeric");
    let src = RamUnit::from_suffix(caps.get(2).map(|m| m.as_str()))?;
    Ok(convert(number, src.bytes_per_unit(), dst.bytes_per_unit()))
}

/// Format a MiB quantity back into a RAM quantity string, e.g. `"4096Mi"`.
pub fn ram_to_str(value: i64) -> String {
    ram_to_str_from(value, RamUnit::Mi, RamUnit::Mi)
}

pub fn ram_to_str_from(value: i64, src: RamUnit, dst: RamUnit) -> String {
    let converted = convert(value as f64, src.bytes_per_unit(), dst.bytes_per_unit());
    format!("{converted}{}", dst.suffix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cpu_bare_number_is_whole_cpus() {
        assert_eq!(cpu_from_str("2").unwrap(), 2000);
    }

    #[test]
    fn cpu_millicpu_passthrough() {
        assert_eq!(cpu_from_str("500m").unwrap(), 500);
    }

    #[test]
    fn cpu_nanocpu_truncates_toward_zero() {
        assert_eq!(cpu_from_str("500000n").unwrap(), 0);
        assert_eq!(cpu_from_str("1500000n").unwrap(), 1);
    }

    #[test]
    fn cpu_rejects_bad_unit() {
        assert_eq!(
            cpu_from_str("100x"),
            Err(ResourceParseError::InvalidFormat("100x".to_string()))
        );
    }

    #[test]
    fn ram_binary_passthrough() {
        assert_eq!(ram_from_str("4096Mi").unwrap(), 4096);
    }

    #[test]
    fn ram_decimal_converts_to_mebibytes() {
        assert_eq!(ram_from_str("4000M").unwrap(), 3814);
    }

    #[test]
    fn ram_gibibyte_to_mebibyte() {
        assert_eq!(ram_from_str("1Gi").unwrap(), 1024);
    }

    #[test]
    fn ram_bare_bytes() {
        assert_eq!(ram_from_str("1048576").unwrap(), 1);
    }

    #[test]
    fn cpu_round_trip() {
        for raw in ["0m", "1m", "500m", "2500m"] {
            let parsed = cpu_from_str(raw).unwrap();
            let formatted = cpu_to_str(parsed);
            assert_eq!(cpu_from_str(&formatted).unwrap(), parsed);
        }
    }

    #[test]
    fn ram_round_trip() {
        for raw in ["0Mi", "1Mi", "4096Mi", "200Mi"] {
            let parsed = ram_from_str(raw).unwrap();
            let formatted = ram_to_str(parsed);
            assert_eq!(ram_from_str(&formatted).unwrap(), parsed);
        }
    }

    #[test]
    fn ram_formats_with_mi_suffix() {
        assert_eq!(ram_to_str(200), "200Mi");
    }
}
