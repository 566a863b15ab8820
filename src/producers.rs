//! Value producers available to field specifications.
//!
//! The set of producers is closed: [`ProducerKind`] names every function a
//! pattern may invoke, and [`ProducerKind::bind`] checks and converts the
//! string arguments of a dispatch string into a ready-to-call [`Producer`].
//! Producers draw from the RNG they are handed and keep no state between calls.

use std::fmt;
use std::net::Ipv4Addr;

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use fake::faker::address::en::CountryCode;
use fake::faker::filesystem::en::FilePath;
use fake::faker::internet::en::{
    DomainSuffix, IPv4, IPv6, MACAddress, SafeEmail, UserAgent, Username,
};
use fake::faker::lorem::en::Word;
use fake::faker::name::en::Name;
use fake::Fake;
use rand::seq::SliceRandom;
use rand::Rng;
use uuid::Uuid;

use crate::error::GeneratorError;

/// Default output format of `format_date` when no argument is given.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Service names returned by `fake_process_name`.
pub const PROCESS_NAMES: &[&str] = &[
    "httpd", "nginx", "postgres", "mysql", "mongod", "redis-server", "sshd", "systemd", "bash",
    "python", "java", "node", "ruby", "php-fpm", "uwsgi", "gunicorn", "celery", "cron",
    "rsyslogd", "named", "ntpd", "dhcpd", "smbd", "vsftpd", "dovecot", "postfix",
];

/// Levels returned by `fake_log_level`.
pub const LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];

/// Methods returned by `fake_http_method`.
pub const HTTP_METHODS: &[&str] = &[
    "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "TRACE", "CONNECT",
];

/// Status codes returned by `fake_http_status_code`.
pub const HTTP_STATUS_CODES: &[i64] = &[
    100, 101, 200, 201, 202, 204, 206, 301, 302, 304, 307, 308, 400, 401, 403, 404, 405, 408,
    409, 410, 413, 415, 422, 429, 500, 501, 502, 503, 504,
];

const HOST_PREFIXES: &[&str] = &["db", "srv", "web", "email", "lt", "desktop", "laptop"];

/// A concrete value produced for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

/// Argument-less producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sampler {
    LegacyIp,
    Ip,
    Ipv6,
    Name,
    UserAgent,
    Uuid,
    Email,
    Url,
    Hostname,
    Mac,
    Port,
    UnixTime,
    FilePath,
    ProcessName,
    LogLevel,
    HttpMethod,
    HttpStatusCode,
    User,
    CountryCode,
}

impl Sampler {
    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Sampler::LegacyIp => {
                let raw: u32 = rng.gen_range(1..=u32::MAX);
                Value::Text(Ipv4Addr::from(raw).to_string())
            }
            Sampler::Ip => Value::Text(IPv4().fake_with_rng(rng)),
            Sampler::Ipv6 => Value::Text(IPv6().fake_with_rng(rng)),
            Sampler::Name => Value::Text(Name().fake_with_rng(rng)),
            Sampler::UserAgent => Value::Text(UserAgent().fake_with_rng(rng)),
            Sampler::Uuid => Value::Text(random_uuid(rng).to_string()),
            Sampler::Email => Value::Text(SafeEmail().fake_with_rng(rng)),
            Sampler::Url => {
                let word: String = Word().fake_with_rng(rng);
                let suffix: String = DomainSuffix().fake_with_rng(rng);
                Value::Text(format!("https://www.{}.{}/", word, suffix))
            }
            Sampler::Hostname => {
                let prefix = pick(HOST_PREFIXES, rng);
                let number: u32 = rng.gen_range(0..100);
                let word: String = Word().fake_with_rng(rng);
                let suffix: String = DomainSuffix().fake_with_rng(rng);
                Value::Text(format!("{}-{:02}.{}.{}", prefix, number, word, suffix))
            }
            Sampler::Mac => Value::Text(MACAddress().fake_with_rng(rng)),
            Sampler::Port => Value::Int(rng.gen_range(0..=65_535)),
            Sampler::UnixTime => {
                let now = Local::now().timestamp().max(0);
                Value::Int(rng.gen_range(0..=now))
            }
            Sampler::FilePath => Value::Text(FilePath().fake_with_rng(rng)),
            Sampler::ProcessName => Value::from(pick(PROCESS_NAMES, rng)),
            Sampler::LogLevel => Value::from(pick(LOG_LEVELS, rng)),
            Sampler::HttpMethod => Value::from(pick(HTTP_METHODS, rng)),
            Sampler::HttpStatusCode => {
                Value::Int(HTTP_STATUS_CODES.choose(rng).copied().unwrap_or(200))
            }
            Sampler::User => Value::Text(Username().fake_with_rng(rng)),
            Sampler::CountryCode => Value::Text(CountryCode().fake_with_rng(rng)),
        }
    }
}

/// Symbolic name of a producer, before its arguments are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerKind {
    RandInt,
    FormatDate,
    Sample(Sampler),
}

impl ProducerKind {
    /// Get all producer kinds.
    pub fn all() -> &'static [ProducerKind] {
        &[
            ProducerKind::RandInt,
            ProducerKind::Sample(Sampler::LegacyIp),
            ProducerKind::Sample(Sampler::Ip),
            ProducerKind::Sample(Sampler::Ipv6),
            ProducerKind::Sample(Sampler::Name),
            ProducerKind::Sample(Sampler::UserAgent),
            ProducerKind::Sample(Sampler::Uuid),
            ProducerKind::Sample(Sampler::Email),
            ProducerKind::Sample(Sampler::Url),
            ProducerKind::Sample(Sampler::Hostname),
            ProducerKind::Sample(Sampler::Mac),
            ProducerKind::Sample(Sampler::Port),
            ProducerKind::Sample(Sampler::UnixTime),
            ProducerKind::Sample(Sampler::FilePath),
            ProducerKind::Sample(Sampler::ProcessName),
            ProducerKind::Sample(Sampler::LogLevel),
            ProducerKind::Sample(Sampler::HttpMethod),
            ProducerKind::Sample(Sampler::HttpStatusCode),
            ProducerKind::Sample(Sampler::User),
            ProducerKind::Sample(Sampler::CountryCode),
            ProducerKind::FormatDate,
        ]
    }

    /// Canonical function name.
    pub fn name(&self) -> &'static str {
        match self {
            ProducerKind::RandInt => "randint",
            ProducerKind::FormatDate => "format_date",
            ProducerKind::Sample(sampler) => match sampler {
                Sampler::LegacyIp => "randip",
                Sampler::Ip => "fake_ip",
                Sampler::Ipv6 => "fake_ipv6",
                Sampler::Name => "fake_name",
                Sampler::UserAgent => "fake_user_agent",
                Sampler::Uuid => "fake_uuid",
                Sampler::Email => "fake_email",
                Sampler::Url => "fake_url",
                Sampler::Hostname => "fake_hostname",
                Sampler::Mac => "fake_mac",
                Sampler::Port => "fake_port",
                Sampler::UnixTime => "fake_unix_time",
                Sampler::FilePath => "fake_file_path",
                Sampler::ProcessName => "fake_process_name",
                Sampler::LogLevel => "fake_log_level",
                Sampler::HttpMethod => "fake_http_method",
                Sampler::HttpStatusCode => "fake_http_status_code",
                Sampler::User => "fake_user",
                Sampler::CountryCode => "fake_country_code",
            },
        }
    }

    /// Secondary `faker_*` spelling accepted for every `fake_*` producer.
    pub fn alias(&self) -> Option<&'static str> {
        let alias = match self.name() {
            "fake_ip" => "faker_ip",
            "fake_ipv6" => "faker_ipv6",
            "fake_name" => "faker_name",
            "fake_user_agent" => "faker_user_agent",
            "fake_uuid" => "faker_uuid",
            "fake_email" => "faker_email",
            "fake_url" => "faker_url",
            "fake_hostname" => "faker_hostname",
            "fake_mac" => "faker_mac",
            "fake_port" => "faker_port",
            "fake_unix_time" => "faker_unix_time",
            "fake_file_path" => "faker_file_path",
            "fake_process_name" => "faker_process_name",
            "fake_log_level" => "faker_log_level",
            "fake_http_method" => "faker_http_method",
            "fake_http_status_code" => "faker_http_status_code",
            "fake_user" => "faker_user",
            "fake_country_code" => "faker_country_code",
            _ => return None,
        };
        Some(alias)
    }

    /// Look up a kind by exact canonical name or alias.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.name() == name || kind.alias() == Some(name))
    }

    /// Every name (canonical and alias) a dispatch string may use.
    pub fn known_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Self::all()
            .iter()
            .flat_map(|kind| std::iter::once(kind.name()).chain(kind.alias()))
            .collect();
        names.sort_unstable();
        names
    }

    /// Bind positional string arguments, converting and checking them.
    pub fn bind(self, args: &[String]) -> Result<Producer, GeneratorError> {
        let invalid = |reason: String| GeneratorError::InvalidArguments {
            function: self.name().to_string(),
            reason,
        };

        match self {
            ProducerKind::RandInt => {
                if args.len() != 2 {
                    return Err(invalid(format!(
                        "expected 2 arguments (min max), got {}",
                        args.len()
                    )));
                }
                let parse = |raw: &str| {
                    raw.parse::<i64>()
                        .map_err(|_| invalid(format!("'{}' is not a valid integer", raw)))
                };
                let low = parse(&args[0])?;
                let high = parse(&args[1])?;
                if low > high {
                    return Err(invalid(format!("empty range {}..={}", low, high)));
                }
                Ok(Producer::RandInt { low, high })
            }
            ProducerKind::FormatDate => {
                // Only the first argument is used as the format string
                let format = args
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
                validate_strftime(&format).map_err(invalid)?;
                Ok(Producer::FormatDate { format })
            }
            ProducerKind::Sample(sampler) => {
                if !args.is_empty() {
                    return Err(invalid(format!("takes no arguments, got {}", args.len())));
                }
                Ok(Producer::Sample(sampler))
            }
        }
    }
}

impl fmt::Display for ProducerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A producer with its arguments bound, ready to generate values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Producer {
    /// Uniform integer in `low..=high`.
    RandInt { low: i64, high: i64 },
    /// Current local time formatted with a strftime string.
    FormatDate { format: String },
    /// Any argument-less producer.
    Sample(Sampler),
}

impl Producer {
    /// Generate one value.
    pub fn produce<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Producer::RandInt { low, high } => Value::Int(rng.gen_range(*low..=*high)),
            Producer::FormatDate { format } => {
                Value::Text(Local::now().format(format).to_string())
            }
            Producer::Sample(sampler) => sampler.sample(rng),
        }
    }
}

fn pick<R: Rng + ?Sized>(catalog: &[&'static str], rng: &mut R) -> &'static str {
    catalog.choose(rng).copied().unwrap_or_default()
}

/// Random version 4 UUID drawn from the given RNG.
fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);

    bytes[6] = (bytes[6] & 0x0f) | 0x40; // Version 4
    bytes[8] = (bytes[8] & 0x3f) | 0x80; // Variant RFC 4122

    Uuid::from_bytes(bytes)
}

/// Check that a strftime string only contains specifiers chrono understands.
///
/// Formatting with an unknown specifier fails at render time, so this runs
/// when a pattern is validated.
pub fn validate_strftime(format: &str) -> Result<(), String> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        Err(format!("'{}' is not a valid date format", format))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_names_and_aliases_resolve() {
        for kind in ProducerKind::all() {
            assert_eq!(ProducerKind::from_name(kind.name()), Some(*kind));
            if let Some(alias) = kind.alias() {
                assert!(alias.starts_with("faker_"));
                assert_eq!(ProducerKind::from_name(alias), Some(*kind));
            }
        }
        assert_eq!(ProducerKind::RandInt.alias(), None);
        assert_eq!(ProducerKind::Sample(Sampler::LegacyIp).alias(), None);
        assert_eq!(ProducerKind::FormatDate.alias(), None);
        assert_eq!(ProducerKind::from_name("nope"), None);
    }

    #[test]
    fn test_known_names_contains_aliases() {
        let names = ProducerKind::known_names();
        assert!(names.contains(&"randint"));
        assert!(names.contains(&"fake_ip"));
        assert!(names.contains(&"faker_ip"));
        assert_eq!(names.len(), ProducerKind::all().len() * 2 - 3);
    }

    #[test]
    fn test_randint_bounds() {
        let producer = ProducerKind::RandInt.bind(&args(&["3", "7"])).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            match producer.produce(&mut rng) {
                Value::Int(n) => assert!((3..=7).contains(&n)),
                other => panic!("Expected Int, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_randint_rejects_bad_arguments() {
        assert!(ProducerKind::RandInt.bind(&args(&["1"])).is_err());
        assert!(ProducerKind::RandInt.bind(&args(&["a", "2"])).is_err());
        let err = ProducerKind::RandInt.bind(&args(&["9", "2"])).unwrap_err();
        assert!(err.to_string().contains("randint"));
    }

    #[test]
    fn test_plain_producer_rejects_arguments() {
        let err = ProducerKind::Sample(Sampler::Ip)
            .bind(&args(&["extra"]))
            .unwrap_err();
        assert!(matches!(err, GeneratorError::InvalidArguments { .. }));
    }

    #[test]
    fn test_randip_is_dotted_quad() {
        let producer = ProducerKind::Sample(Sampler::LegacyIp).bind(&[]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let value = producer.produce(&mut rng).to_string();
        assert!(value.parse::<Ipv4Addr>().is_ok());
        assert_ne!(value, "0.0.0.0");
    }

    #[test]
    fn test_fake_producers_yield_values() {
        let mut rng = StdRng::seed_from_u64(1);
        for kind in ProducerKind::all() {
            if let ProducerKind::Sample(sampler) = kind {
                let value = sampler.sample(&mut rng);
                assert!(!value.to_string().is_empty(), "{} produced empty value", kind);
            }
        }
    }

    #[test]
    fn test_catalog_producers_stay_in_catalog() {
        let mut rng = StdRng::seed_from_u64(3);
        let process = Producer::Sample(Sampler::ProcessName);
        let level = Producer::Sample(Sampler::LogLevel);
        for _ in 0..100 {
            let p = process.produce(&mut rng).to_string();
            assert!(PROCESS_NAMES.contains(&p.as_str()));
            let l = level.produce(&mut rng).to_string();
            assert!(LOG_LEVELS.contains(&l.as_str()));
        }
    }

    #[test]
    fn test_uuid_is_v4_and_deterministic() {
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);
        let a = random_uuid(&mut rng1);
        let b = random_uuid(&mut rng2);
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }

    #[test]
    fn test_port_and_status_are_ints() {
        let mut rng = StdRng::seed_from_u64(5);
        let port = Sampler::Port.sample(&mut rng);
        assert!(matches!(port, Value::Int(p) if (0..=65_535).contains(&p)));
        let status = Sampler::HttpStatusCode.sample(&mut rng);
        assert!(matches!(status, Value::Int(s) if HTTP_STATUS_CODES.contains(&s)));
    }

    #[test]
    fn test_format_date_default_and_custom() {
        let mut rng = StdRng::seed_from_u64(0);
        let default = ProducerKind::FormatDate.bind(&[]).unwrap();
        assert_eq!(
            default,
            Producer::FormatDate {
                format: DEFAULT_DATE_FORMAT.to_string()
            }
        );
        let year_only = ProducerKind::FormatDate
            .bind(&args(&["%Y", "ignored"]))
            .unwrap();
        let value = year_only.produce(&mut rng).to_string();
        assert_eq!(value.len(), 4);
        assert!(value.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_format_date_rejects_bad_format() {
        assert!(validate_strftime("%Y-%m-%d").is_ok());
        assert!(validate_strftime("%Q").is_err());
        assert!(ProducerKind::FormatDate.bind(&args(&["%Q"])).is_err());
    }
}
