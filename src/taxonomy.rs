//! The closed type taxonomy shared by every pipeline stage.
//!
//! Entity types follow the WordNet noun hierarchy (without `noun.relation`,
//! with groups split into animate/organization/object, an extra `instrument`
//! category for objects that act, and quantity split from numeral). Relation
//! types follow FrameNet preposition frames.

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity Types
// ============================================================================

/// The semantic type of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Human,
    Plant,
    Action,
    Feeling,
    Location,
    Object,
    Instrument,
    BodyPart,
    Possession,
    AnimateGroup,
    Organization,
    ObjectGroup,
    Goal,
    Event,
    Animal,
    Food,
    NaturalProcess,
    Cognitive,
    Time,
    NaturalObject,
    Substance,
    Quantity,
    Numeral,
    NaturalPhenomenon,
    Shape,
    Communication,
    Attribute,
}

impl EntityType {
    /// Every entity type, in listing order.
    pub const ALL: [EntityType; 27] = [
        EntityType::Human,
        EntityType::Plant,
        EntityType::Action,
        EntityType::Feeling,
        EntityType::Location,
        EntityType::Object,
        EntityType::Instrument,
        EntityType::BodyPart,
        EntityType::Possession,
        EntityType::AnimateGroup,
        EntityType::Organization,
        EntityType::ObjectGroup,
        EntityType::Goal,
        EntityType::Event,
        EntityType::Animal,
        EntityType::Food,
        EntityType::NaturalProcess,
        EntityType::Cognitive,
        EntityType::Time,
        EntityType::NaturalObject,
        EntityType::Substance,
        EntityType::Quantity,
        EntityType::Numeral,
        EntityType::NaturalPhenomenon,
        EntityType::Shape,
        EntityType::Communication,
        EntityType::Attribute,
    ];

    /// Canonical label, as written inside `( )` annotations.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Human => "human",
            EntityType::Plant => "plant",
            EntityType::Action => "action",
            EntityType::Feeling => "feeling",
            EntityType::Location => "location",
            EntityType::Object => "object",
            EntityType::Instrument => "instrument",
            EntityType::BodyPart => "body-part",
            EntityType::Possession => "possession",
            EntityType::AnimateGroup => "animate-group",
            EntityType::Organization => "organization",
            EntityType::ObjectGroup => "object-group",
            EntityType::Goal => "goal",
            EntityType::Event => "event",
            EntityType::Animal => "animal",
            EntityType::Food => "food",
            EntityType::NaturalProcess => "natural-process",
            EntityType::Cognitive => "cognitive",
            EntityType::Time => "time",
            EntityType::NaturalObject => "natural-object",
            EntityType::Substance => "substance",
            EntityType::Quantity => "quantity",
            EntityType::Numeral => "numeral",
            EntityType::NaturalPhenomenon => "natural-phenomenon",
            EntityType::Shape => "shape",
            EntityType::Communication => "communication",
            EntityType::Attribute => "attribute",
        }
    }

    /// Example terms illustrating the most common usage of this type.
    pub fn examples(&self) -> &'static [&'static str] {
        match self {
            EntityType::Human => &["person", "child", "teacher", "Barack Obama"],
            EntityType::Plant => &["tree", "flower", "grass"],
            EntityType::Action => &["swimming", "teaching"],
            EntityType::Feeling => &["joy", "anger"],
            EntityType::Location => &["area", "country", "venue"],
            EntityType::Object => &["book", "table", "bag"],
            EntityType::Instrument => &["robot", "conveyor belt", "plane"],
            EntityType::BodyPart => &["hand", "leg", "eye"],
            EntityType::Possession => &["property", "assets"],
            EntityType::AnimateGroup => &["family", "team", "crowd"],
            EntityType::Organization => &["company", "school", "government"],
            EntityType::ObjectGroup => &["collection", "books", "chairs"],
            EntityType::Goal => &["purpose", "objective"],
            EntityType::Event => &["party", "meeting", "concert"],
            EntityType::Animal => &["dog", "cat", "lion"],
            EntityType::Food => &["pizza", "apple", "water"],
            EntityType::NaturalProcess => &["weather", "growth", "life"],
            EntityType::Cognitive => &["belief", "intention", "dream"],
            EntityType::Time => &["day", "year", "moment"],
            EntityType::NaturalObject => &["rock", "river", "mountain"],
            EntityType::Substance => &["water", "air", "metal"],
            EntityType::Quantity => &["gallon", "liter", "mile"],
            EntityType::Numeral => &["one", "two", "three"],
            EntityType::NaturalPhenomenon => &["earthquake", "thunder", "rainbow"],
            EntityType::Shape => &["circle", "square", "triangle"],
            EntityType::Communication => &["logo", "sentence", "conversation", "the symbol `1`"],
            EntityType::Attribute => &["red", "tall", "beautiful"],
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_label(s);
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown entity type: '{}'", s))
    }
}

// ============================================================================
// Relation Types
// ============================================================================

/// The semantic type of a relation-bearing preposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    Spatial,
    Directional,
    Temporal,
    Comparative,
    Causal,
    Instrumental,
}

impl RelationType {
    /// Every relation type, in listing order.
    pub const ALL: [RelationType; 6] = [
        RelationType::Spatial,
        RelationType::Directional,
        RelationType::Temporal,
        RelationType::Comparative,
        RelationType::Causal,
        RelationType::Instrumental,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Spatial => "spatial",
            RelationType::Directional => "directional",
            RelationType::Temporal => "temporal",
            RelationType::Comparative => "comparative",
            RelationType::Causal => "causal",
            RelationType::Instrumental => "instrumental",
        }
    }

    pub fn examples(&self) -> &'static [&'static str] {
        match self {
            RelationType::Spatial => &["in", "on", "at"],
            RelationType::Directional => &["to", "from", "towards"],
            RelationType::Temporal => &["before", "after", "during"],
            RelationType::Comparative => &["than", "like"],
            RelationType::Causal => &["because of", "due to"],
            RelationType::Instrumental => &["with", "by"],
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize_label(s);
        RelationType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown relation type: '{}'", s))
    }
}

// ============================================================================
// Labels
// ============================================================================

/// Any taxonomy label. Entity and relation labels never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Entity(EntityType),
    Relation(RelationType),
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Entity(t) => t.as_str(),
            Label::Relation(t) => t.as_str(),
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(t) = s.parse::<EntityType>() {
            return Ok(Label::Entity(t));
        }
        if let Ok(t) = s.parse::<RelationType>() {
            return Ok(Label::Relation(t));
        }
        Err(format!("Label '{}' is not in the taxonomy", s))
    }
}

impl From<EntityType> for Label {
    fn from(t: EntityType) -> Self {
        Label::Entity(t)
    }
}

impl From<RelationType> for Label {
    fn from(t: RelationType) -> Self {
        Label::Relation(t)
    }
}

/// Lower-case a label and turn space/underscore separators into hyphens.
fn normalize_label(s: &str) -> String {
    s.trim()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

// ============================================================================
// Prompt Listings
// ============================================================================

fn listing_line(label: &str, examples: &[&str]) -> String {
    format!("{} (e.g., {})\n", label, examples.join(", "))
}

/// The entity listing interpolated into every stage prompt.
pub fn render_entity_listing() -> String {
    let mut listing =
        String::from("For entities, use the following type system (based on the WordNet hierarchy):\n");
    for t in EntityType::ALL {
        listing.push_str(&listing_line(t.as_str(), t.examples()));
    }
    listing.push('\n');
    listing
}

/// The preposition listing interpolated into every stage prompt.
pub fn render_relation_listing() -> String {
    let mut listing =
        String::from("For prepositions, use the following type system (based on FrameNet):\n");
    for t in RelationType::ALL {
        listing.push_str(&listing_line(t.as_str(), t.examples()));
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_sizes() {
        assert_eq!(EntityType::ALL.len(), 27);
        assert_eq!(RelationType::ALL.len(), 6);
    }

    #[test]
    fn test_sets_are_disjoint() {
        for e in EntityType::ALL {
            assert!(e.as_str().parse::<RelationType>().is_err());
        }
        for r in RelationType::ALL {
            assert!(r.as_str().parse::<EntityType>().is_err());
        }
    }

    #[test]
    fn test_label_roundtrip() {
        for e in EntityType::ALL {
            assert_eq!(e.as_str().parse::<Label>().unwrap(), Label::Entity(e));
        }
        for r in RelationType::ALL {
            assert_eq!(r.as_str().parse::<Label>().unwrap(), Label::Relation(r));
        }
    }

    #[test]
    fn test_spaced_spelling_accepted() {
        assert_eq!("body part".parse::<EntityType>().unwrap(), EntityType::BodyPart);
        assert_eq!("Natural_Object".parse::<EntityType>().unwrap(), EntityType::NaturalObject);
        assert_eq!(" Spatial ".parse::<RelationType>().unwrap(), RelationType::Spatial);
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!("vehicle".parse::<Label>().is_err());
        assert!("natural".parse::<Label>().is_err());
        assert!("".parse::<Label>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_label() {
        let json = serde_json::to_string(&EntityType::AnimateGroup).unwrap();
        assert_eq!(json, "\"animate-group\"");
        let label: Label = serde_json::from_str("\"temporal\"").unwrap();
        assert_eq!(label, Label::Relation(RelationType::Temporal));
    }

    #[test]
    fn test_listing_covers_every_type() {
        let entities = render_entity_listing();
        for e in EntityType::ALL {
            assert!(entities.contains(&format!("{} (e.g., ", e.as_str())));
        }
        let relations = render_relation_listing();
        assert!(relations.contains("causal (e.g., because of, due to)"));
    }
}
