//! Generated stack names.
//!
//! Stacks submitted without an explicit name get a readable
//! `adjective-animal` name instead of an opaque id.

use rand::seq::IndexedRandom;

const ADJECTIVES: &[&str] = &[
    "agile", "amber", "ancient", "bold", "brave", "bright", "calm", "clever", "crimson", "daring",
    "eager", "fierce", "gentle", "golden", "humble", "keen", "lively", "lucid", "mellow", "mighty",
    "nimble", "noble", "quiet", "rapid", "rustic", "silent", "sleek", "stout", "swift", "vivid",
    "wild", "witty",
];

const ANIMALS: &[&str] = &[
    "badger", "bison", "crane", "dingo", "falcon", "ferret", "gecko", "heron", "ibis", "jackal",
    "koala", "lemur", "lynx", "magpie", "marmot", "mole", "newt", "ocelot", "osprey", "otter",
    "owl", "panther", "plover", "puffin", "quail", "raven", "seal", "shrew", "stoat", "tapir",
    "vole", "wombat",
];

/// Generate a readable `adjective-animal` stack name.
pub fn generate_name() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).unwrap_or(&"swift");
    let animal = ANIMALS.choose(&mut rng).unwrap_or(&"otter");
    format!("{}-{}", adjective, animal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_name_shape() {
        let name = generate_name();
        let (adjective, animal) = name.split_once('-').expect("name should be hyphenated");
        assert!(ADJECTIVES.contains(&adjective));
        assert!(ANIMALS.contains(&animal));
    }
}
