//! External source clients, one per catalog or pricing service.
//!
//! Every client terminates its fallback chain in a sentinel quote with a
//! diagnostic note instead of propagating errors to the aggregator.

pub mod ebay;
pub mod justtcg;
pub mod pokemontcg;
pub mod tcgdex;

pub use ebay::EbayClient;
pub use justtcg::JustTcgClient;
pub use pokemontcg::PokemonTcgClient;
pub use tcgdex::TcgdexClient;

use crate::models::CardDescriptor;
use crate::normalize::{clean_name, normalize_card_number};

/// A search hit reduced to the fields candidate ranking needs.
pub(crate) trait Candidate {
    fn name(&self) -> &str;
    fn number(&self) -> Option<&str>;
}

/// Pick the best candidate for a descriptor: exact card-number match
/// first, then exact cleaned-name match, then name containment, then the
/// first hit as last resort.
pub(crate) fn pick_candidate<'a, C: Candidate>(
    candidates: &'a [C],
    descriptor: &CardDescriptor,
) -> Option<&'a C> {
    if candidates.is_empty() {
        return None;
    }
    let wanted_name = clean_name(&descriptor.name).to_lowercase();

    if let Some(number) = descriptor.number.as_deref() {
        let wanted = normalize_card_number(number);
        if let Some(hit) = candidates.iter().find(|c| {
            c.number().map(normalize_card_number).as_deref() == Some(wanted.as_str())
        }) {
            return Some(hit);
        }
    }
    if let Some(hit) = candidates
        .iter()
        .find(|c| clean_name(c.name()).to_lowercase() == wanted_name)
    {
        return Some(hit);
    }
    if let Some(hit) = candidates
        .iter()
        .find(|c| clean_name(c.name()).to_lowercase().contains(&wanted_name))
    {
        return Some(hit);
    }
    candidates.first()
}

/// Name-containment filter applied to unrestricted (global) search
/// results.
pub(crate) fn name_contains(candidate_name: &str, wanted_cleaned_lower: &str) -> bool {
    clean_name(candidate_name)
        .to_lowercase()
        .contains(wanted_cleaned_lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hit {
        name: &'static str,
        number: Option<&'static str>,
    }

    impl Candidate for Hit {
        fn name(&self) -> &str {
            self.name
        }
        fn number(&self) -> Option<&str> {
            self.number
        }
    }

    fn descriptor(name: &str, number: Option<&str>) -> CardDescriptor {
        CardDescriptor {
            name: name.to_string(),
            number: number.map(|n| n.to_string()),
            set_name: None,
            language: "en".to_string(),
        }
    }

    #[test]
    fn number_match_beats_name_match() {
        let hits = [
            Hit { name: "Pikachu", number: Some("24/185") },
            Hit { name: "Pikachu VMAX", number: Some("044/185") },
        ];
        let chosen = pick_candidate(&hits, &descriptor("Pikachu", Some("44"))).unwrap();
        assert_eq!(chosen.name, "Pikachu VMAX");
    }

    #[test]
    fn exact_name_beats_containment() {
        let hits = [
            Hit { name: "Flying Pikachu", number: None },
            Hit { name: "Pikachu", number: None },
        ];
        let chosen = pick_candidate(&hits, &descriptor("Pikachu", None)).unwrap();
        assert_eq!(chosen.name, "Pikachu");
    }

    #[test]
    fn containment_beats_first_available() {
        let hits = [
            Hit { name: "Eevee", number: None },
            Hit { name: "Surfing Pikachu", number: None },
        ];
        let chosen = pick_candidate(&hits, &descriptor("Pikachu", None)).unwrap();
        assert_eq!(chosen.name, "Surfing Pikachu");
    }

    #[test]
    fn first_available_as_last_resort() {
        let hits = [Hit { name: "Eevee", number: None }];
        let chosen = pick_candidate(&hits, &descriptor("Pikachu", None)).unwrap();
        assert_eq!(chosen.name, "Eevee");
        assert!(pick_candidate::<Hit>(&[], &descriptor("Pikachu", None)).is_none());
    }
}
