//! Generators for well-known OpenAPI string formats and for `pattern`
//! constraints.

use super::heuristics::word;
use chrono::{Duration, TimeZone, Utc};
use rand::Rng;

/// Generate a value for a recognized `format`; `None` for unknown formats so
/// the caller can fall through to the next strategy.
pub fn generate<R: Rng + ?Sized>(format: &str, rng: &mut R) -> Option<String> {
    match format {
        "email" => Some(email(rng)),
        "uuid" => Some(uuid(rng)),
        "uri" | "url" => Some(uri(rng)),
        "hostname" => Some(hostname(rng)),
        "ipv4" => Some(ipv4(rng)),
        "ipv6" => Some(ipv6(rng)),
        "date" => Some(date(rng)),
        "date-time" => Some(date_time(rng)),
        _ => None,
    }
}

/// Sample a string matching `pattern`. Anchors are stripped before
/// compilation (the sampler rejects them); `None` when the pattern cannot be
/// compiled, letting the caller fall back.
pub fn from_pattern<R: Rng + ?Sized>(pattern: &str, rng: &mut R) -> Option<String> {
    let unanchored = pattern.strip_prefix('^').unwrap_or(pattern);
    let unanchored = unanchored.strip_suffix('$').unwrap_or(unanchored);
    let sampler = rand_regex::Regex::compile(unanchored, 8).ok()?;
    Some(rng.sample(&sampler))
}

fn email<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}.{}@example.com", word(rng), word(rng))
}

fn uuid<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes[..]);
    // RFC 4122 version 4, variant 1
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;
    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    )
}

fn uri<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("https://{}/{}", hostname(rng), word(rng))
}

fn hostname<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{}.example.com", word(rng))
}

fn ipv4<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..=254u8),
        rng.gen_range(0..=255u8),
        rng.gen_range(0..=255u8),
        rng.gen_range(1..=254u8),
    )
}

fn ipv6<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "2001:db8:{:x}:{:x}:{:x}:{:x}:{:x}:{:x}",
        rng.gen_range(0..=0xffffu16),
        rng.gen_range(0..=0xffffu16),
        rng.gen_range(0..=0xffffu16),
        rng.gen_range(0..=0xffffu16),
        rng.gen_range(0..=0xffffu16),
        rng.gen_range(0..=0xffffu16),
    )
}

fn date<R: Rng + ?Sized>(rng: &mut R) -> String {
    let base = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let moment = base + Duration::days(rng.gen_range(0..30 * 365));
    moment.format("%Y-%m-%d").to_string()
}

fn date_time<R: Rng + ?Sized>(rng: &mut R) -> String {
    let base = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
    let moment =
        base + Duration::days(rng.gen_range(0..30 * 365)) + Duration::seconds(rng.gen_range(0..86_400));
    moment.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_uuid_shape() {
        let mut rng = rng();
        let re = Regex::new(
            r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$",
        )
        .unwrap();
        for _ in 0..16 {
            assert!(re.is_match(&uuid(&mut rng)));
        }
    }

    #[test]
    fn test_ipv4_shape() {
        let mut rng = rng();
        let re = Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}$").unwrap();
        assert!(re.is_match(&ipv4(&mut rng)));
    }

    #[test]
    fn test_dates_parse() {
        let mut rng = rng();
        assert!(chrono::NaiveDate::parse_from_str(&date(&mut rng), "%Y-%m-%d").is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&date_time(&mut rng)).is_ok());
    }

    #[test]
    fn test_pattern_with_anchors() {
        let mut rng = rng();
        let re = Regex::new(r"^[A-Z]{2}\d{4}$").unwrap();
        for _ in 0..32 {
            let value = from_pattern(r"^[A-Z]{2}\d{4}$", &mut rng).unwrap();
            assert!(re.is_match(&value), "{value:?} does not match");
        }
    }

    #[test]
    fn test_unknown_format_is_none() {
        let mut rng = rng();
        assert!(generate("isbn", &mut rng).is_none());
    }
}
