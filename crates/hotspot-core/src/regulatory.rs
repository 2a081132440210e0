//! Regulatory country code resolution.
//!
//! Order: the kernel regulatory domain (`iw reg get`), then the territory
//! of the process locale, then [`FALLBACK_COUNTRY`]. The locale step is an
//! inherited heuristic: a locale territory does not reliably name the
//! regulatory domain the radio operates under.

use std::env;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::exec::{CommandSpec, SystemOps};

pub const FALLBACK_COUNTRY: &str = "US";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountrySource {
    Regulatory,
    Locale,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCode {
    pub code: String,
    pub source: CountrySource,
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// Locale string from the environment (`LC_ALL`, then `LANG`).
pub fn env_locale() -> Option<String> {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}

pub fn detect_country(ops: &dyn SystemOps, locale: Option<&str>) -> CountryCode {
    let reg = ops.run_capturing(&CommandSpec::new("iw").args(["reg", "get"]));
    if reg.success() {
        if let Some(code) = parse_reg_country(&reg.stdout) {
            debug!("Regulatory domain reports country {code}");
            return CountryCode {
                code,
                source: CountrySource::Regulatory,
            };
        }
    }

    if let Some(code) = locale.and_then(locale_territory) {
        debug!("Country {code} taken from locale territory");
        return CountryCode {
            code,
            source: CountrySource::Locale,
        };
    }

    CountryCode {
        code: FALLBACK_COUNTRY.to_string(),
        source: CountrySource::Fallback,
    }
}

/// Applies the country to the kernel regulatory domain. Best effort.
pub fn apply_country(ops: &dyn SystemOps, country: &CountryCode) {
    let status = ops.run_silent(&CommandSpec::new("iw").args(["reg", "set", &country.code]));
    if status == 0 {
        info!("Regulatory domain set to {}", country.code);
    } else {
        warn!("iw reg set {} failed (exit {status})", country.code);
    }
}

/// First `country XX:` entry that is not the unset world domain `00`.
pub fn parse_reg_country(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("country ")?;
        let code = rest.split(':').next()?.trim();
        is_country_code(code)
            .then(|| code.to_ascii_uppercase())
            .filter(|code| code != "00")
    })
}

/// `en_GB.UTF-8` -> `GB`. `C` and `POSIX` carry no territory.
pub fn locale_territory(locale: &str) -> Option<String> {
    let base = locale.split(['.', '@']).next()?;
    let territory = base.split_once('_')?.1;
    is_country_code(territory).then(|| territory.to_ascii_uppercase())
}

fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::MockSystemOps;

    const REG_DE: &str = "global\ncountry DE: DFS-ETSI\n\t(2400 - 2483 @ 40), (N/A, 20), (N/A)\n";
    const REG_WORLD: &str = "global\ncountry 00: DFS-UNSET\n\t(2402 - 2472 @ 40), (6, 20), (N/A)\n";

    #[test]
    fn regulatory_domain_wins() {
        let ops = MockSystemOps::new();
        ops.respond("iw reg get", CommandOutput::ok(REG_DE));
        let country = detect_country(&ops, Some("en_GB.UTF-8"));
        assert_eq!(country.code, "DE");
        assert_eq!(country.source, CountrySource::Regulatory);
    }

    #[test]
    fn world_domain_falls_through_to_locale() {
        let ops = MockSystemOps::new();
        ops.respond("iw reg get", CommandOutput::ok(REG_WORLD));
        let country = detect_country(&ops, Some("en_GB.UTF-8"));
        assert_eq!(country.code, "GB");
        assert_eq!(country.source, CountrySource::Locale);
    }

    #[test]
    fn no_hint_uses_fallback() {
        let ops = MockSystemOps::new();
        ops.set_missing("iw");
        let country = detect_country(&ops, Some("C.UTF-8"));
        assert_eq!(country.code, FALLBACK_COUNTRY);
        assert_eq!(country.source, CountrySource::Fallback);
    }

    #[test]
    fn locale_parsing() {
        assert_eq!(locale_territory("de_AT.UTF-8@euro").as_deref(), Some("AT"));
        assert_eq!(locale_territory("pt_br").as_deref(), Some("BR"));
        assert_eq!(locale_territory("POSIX"), None);
    }

    #[test]
    fn apply_runs_reg_set() {
        let ops = MockSystemOps::new();
        apply_country(
            &ops,
            &CountryCode {
                code: "JP".into(),
                source: CountrySource::Regulatory,
            },
        );
        assert!(ops.ran("iw reg set JP"));
    }
}
