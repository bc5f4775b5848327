//! Field-name heuristics for string generation.
//!
//! Opt-in: when enabled, a property named `email` gets an address-shaped
//! value instead of a random word. Heuristics never run when the schema
//! declares an explicit format, pattern or enum — the caller orders that.

use rand::Rng;

pub(crate) const WORDS: &[&str] = &[
    "amber", "basalt", "cedar", "delta", "ember", "fjord", "garnet", "harbor",
    "indigo", "juniper", "krypton", "lumen", "meadow", "nimbus", "onyx",
    "pasture", "quartz", "raven", "sierra", "tundra", "umber", "vortex",
    "willow", "zephyr",
];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bruno", "Carla", "Dmitri", "Elena", "Felix", "Greta", "Hugo",
    "Iris", "Jonas", "Kara", "Liam", "Mona", "Nils", "Olga", "Pavel",
];

const LAST_NAMES: &[&str] = &[
    "Alvarez", "Bergstrom", "Castillo", "Dubois", "Eriksen", "Fontaine",
    "Grimaldi", "Hoffman", "Ivanov", "Jansen", "Kowalski", "Lindqvist",
];

const COMPANIES: &[&str] = &[
    "Acme Logistics", "Borealis Labs", "Cobalt Systems", "Driftwood Media",
    "Eastgate Partners", "Foxglove Industries", "Granite Peak Co",
];

const STREETS: &[&str] = &[
    "Maple Street", "Oak Avenue", "Harbor Road", "Mill Lane", "Summit Drive",
    "Birch Boulevard", "Foundry Way",
];

fn choose<'a, R: Rng + ?Sized>(items: &'a [&'a str], rng: &mut R) -> &'a str {
    items[rng.gen_range(0..items.len())]
}

/// A generic lowercase word.
pub fn word<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    WORDS[rng.gen_range(0..WORDS.len())]
}

/// Value shaped by the property name, or `None` when the name suggests
/// nothing in particular.
pub fn for_field<R: Rng + ?Sized>(field: &str, rng: &mut R) -> Option<String> {
    let field = field.to_ascii_lowercase();
    if field.contains("first_name") || field == "firstname" || field == "givenname" {
        return Some(choose(FIRST_NAMES, rng).to_string());
    }
    if field.contains("last_name") || field.contains("surname") || field == "lastname" {
        return Some(choose(LAST_NAMES, rng).to_string());
    }
    if field.contains("email") {
        let first = choose(FIRST_NAMES, rng).to_ascii_lowercase();
        let last = choose(LAST_NAMES, rng).to_ascii_lowercase();
        return Some(format!("{first}.{last}@example.com"));
    }
    if field.contains("phone") {
        return Some(format!("+1-555-{:04}", rng.gen_range(0..10_000)));
    }
    if field.contains("address") {
        return Some(format!(
            "{} {}",
            rng.gen_range(1..1000),
            choose(STREETS, rng)
        ));
    }
    if field.contains("company") {
        return Some(choose(COMPANIES, rng).to_string());
    }
    if field.contains("username") {
        return Some(format!("{}{}", word(rng), rng.gen_range(10..100)));
    }
    if field == "name" || field.ends_with("_name") {
        return Some(format!(
            "{} {}",
            choose(FIRST_NAMES, rng),
            choose(LAST_NAMES, rng)
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_email_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let value = for_field("contact_email", &mut rng).unwrap();
        assert!(value.contains('@'));
        assert!(value.ends_with("example.com"));
    }

    #[test]
    fn test_unknown_field_yields_none() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(for_field("widget_count", &mut rng).is_none());
    }

    #[test]
    fn test_first_name_beats_generic_name_suffix() {
        let mut rng = StdRng::seed_from_u64(7);
        let value = for_field("first_name", &mut rng).unwrap();
        assert!(FIRST_NAMES.contains(&value.as_str()));
    }
}
