use serde::{Deserialize, Serialize};

use crate::types::{PromptCard, WILDCARD_TEXT};

/// Wildcards are roughly 5% of the response pool, but never fewer than
/// this many.
const MIN_WILDCARDS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackPrompt {
    pub text: String,
    #[serde(default = "default_pick")]
    pub pick: u32,
}

fn default_pick() -> u32 {
    1
}

/// One content pack: a themed set of prompt and response cards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardPack {
    pub id: String,
    pub name: String,
    pub prompts: Vec<PackPrompt>,
    pub responses: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("failed to read pack file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse pack file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Read-only card content loaded once at startup. Rooms take snapshots;
/// the persistent card store behind the pack file is somebody else's
/// problem.
#[derive(Debug, Clone)]
pub struct CardLibrary {
    packs: Vec<CardPack>,
}

impl CardLibrary {
    /// Load packs from the file named by `CARDROOM_PACKS`, falling back to
    /// the built-in set.
    pub fn from_env() -> Self {
        match std::env::var("CARDROOM_PACKS") {
            Ok(path) => match Self::load(&path) {
                Ok(lib) => {
                    tracing::info!("Loaded {} card packs from {}", lib.packs.len(), path);
                    lib
                }
                Err(e) => {
                    tracing::warn!("Failed to load card packs from {}: {}. Using built-in packs.", path, e);
                    Self::builtin()
                }
            },
            Err(_) => Self::builtin(),
        }
    }

    pub fn load(path: &str) -> Result<Self, LibraryError> {
        let data = std::fs::read_to_string(path)?;
        let packs: Vec<CardPack> = serde_json::from_str(&data)?;
        Ok(Self { packs })
    }

    pub fn builtin() -> Self {
        Self {
            packs: builtin_packs(),
        }
    }

    pub fn pack_ids(&self) -> Vec<String> {
        self.packs.iter().map(|p| p.id.clone()).collect()
    }

    pub fn has_pack(&self, id: &str) -> bool {
        self.packs.iter().any(|p| p.id == id)
    }

    /// Build a room's private master pools, filtered by active pack ids
    /// (empty = all packs). The response pool gets its computed share of
    /// wildcard entries pre-merged.
    pub fn snapshot(&self, active_packs: &[String]) -> (Vec<PromptCard>, Vec<String>) {
        let selected: Vec<&CardPack> = self
            .packs
            .iter()
            .filter(|p| active_packs.is_empty() || active_packs.iter().any(|id| *id == p.id))
            .collect();

        let prompts: Vec<PromptCard> = selected
            .iter()
            .flat_map(|p| &p.prompts)
            .map(|p| PromptCard {
                text: p.text.clone(),
                pick: p.pick.max(1),
            })
            .collect();

        let mut responses: Vec<String> = selected
            .iter()
            .flat_map(|p| &p.responses)
            .cloned()
            .collect();

        if !responses.is_empty() {
            let wildcards = (responses.len() / 20).max(MIN_WILDCARDS);
            responses.extend(std::iter::repeat_n(WILDCARD_TEXT.to_string(), wildcards));
        }

        (prompts, responses)
    }
}

fn builtin_packs() -> Vec<CardPack> {
    let prompt = |text: &str, pick: u32| PackPrompt {
        text: text.to_string(),
        pick,
    };

    vec![
        CardPack {
            id: "base".to_string(),
            name: "Base Deck".to_string(),
            prompts: vec![
                prompt("I lost my keys in ____.", 1),
                prompt("The secret ingredient is always ____.", 1),
                prompt("My therapist says I should stop thinking about ____.", 1),
                prompt("Nothing ruins a road trip faster than ____.", 1),
                prompt("The museum's newest exhibit: a tribute to ____.", 1),
                prompt("Step 1: ____. Step 2: ____. Step 3: profit.", 2),
                prompt("My autobiography will be titled '____'.", 1),
                prompt("The real reason the meeting ran long: ____.", 1),
                prompt("Grandma's attic turned out to be full of ____.", 1),
                prompt("This year's office party was ruined by ____.", 1),
                prompt("I can't sleep without ____.", 1),
                prompt("First ____, then ____, and suddenly everyone was cheering.", 2),
            ],
            responses: vec![
                "a raccoon in a tiny hat".to_string(),
                "aggressively mediocre karaoke".to_string(),
                "an unsolicited slideshow".to_string(),
                "the neighbor's interpretive dance phase".to_string(),
                "a suspiciously confident pigeon".to_string(),
                "lukewarm fondue".to_string(),
                "forty-seven unread voicemails".to_string(),
                "a motivational poster about synergy".to_string(),
                "the world's loudest wind chimes".to_string(),
                "an expired coupon for free hugs".to_string(),
                "a garden gnome with trust issues".to_string(),
                "decaf coffee, unannounced".to_string(),
                "my uncle's conspiracy corkboard".to_string(),
                "a sock full of nickels".to_string(),
                "the office printer's opinion".to_string(),
                "a dramatic reading of the terms and conditions".to_string(),
                "three ferrets in a trench coat".to_string(),
                "the last slice, taken without asking".to_string(),
                "an apology written in wet cement".to_string(),
                "a suspicious amount of glitter".to_string(),
            ],
        },
        CardPack {
            id: "party".to_string(),
            name: "Party Pack".to_string(),
            prompts: vec![
                prompt("The DJ refused to play anything except ____.", 1),
                prompt("Rule one of the house party: never mention ____.", 1),
                prompt("The piñata was full of ____.", 1),
                prompt("We ran out of ice, so we used ____.", 1),
                prompt("Combine ____ with ____ and you get my weekend.", 2),
                prompt("The party ended abruptly when ____ showed up.", 1),
            ],
            responses: vec![
                "a kazoo solo".to_string(),
                "the landlord's famous chili".to_string(),
                "an inflatable flamingo named Gerald".to_string(),
                "someone's entire tax return".to_string(),
                "a chandelier made of spoons".to_string(),
                "the neighbor's wifi password".to_string(),
                "a polite mosh pit".to_string(),
                "an extremely long toast to nobody in particular".to_string(),
                "glow sticks from 2009".to_string(),
                "the good scissors".to_string(),
                "a commemorative plate collection".to_string(),
                "one enormous crouton".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_packs_have_content() {
        let lib = CardLibrary::builtin();
        assert_eq!(lib.pack_ids(), vec!["base", "party"]);
        let (prompts, responses) = lib.snapshot(&[]);
        assert!(!prompts.is_empty());
        assert!(!responses.is_empty());
    }

    #[test]
    fn snapshot_filters_by_pack_id() {
        let lib = CardLibrary::builtin();
        let (all_prompts, _) = lib.snapshot(&[]);
        let (base_prompts, _) = lib.snapshot(&["base".to_string()]);
        assert!(base_prompts.len() < all_prompts.len());
        assert!(base_prompts.iter().all(|p| p.pick >= 1));
    }

    #[test]
    fn snapshot_merges_wildcards() {
        let lib = CardLibrary::builtin();
        let (_, responses) = lib.snapshot(&[]);
        let wildcards = responses.iter().filter(|r| *r == WILDCARD_TEXT).count();
        let plain = responses.len() - wildcards;
        assert_eq!(wildcards, (plain / 20).max(5));
    }

    #[test]
    fn unknown_pack_id_yields_empty_snapshot() {
        let lib = CardLibrary::builtin();
        let (prompts, responses) = lib.snapshot(&["no-such-pack".to_string()]);
        assert!(prompts.is_empty());
        assert!(responses.is_empty());
    }

    #[test]
    fn pack_prompt_pick_defaults_to_one() {
        let json = r#"{"text": "____ forever."}"#;
        let p: PackPrompt = serde_json::from_str(json).unwrap();
        assert_eq!(p.pick, 1);
    }
}
