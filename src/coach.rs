//! Coaching tips for a workout day
//!
//! Advisory text only: nothing here is stored or fed back into progression.

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::model::{format_weight, WorkoutDay};
use crate::settings::Language;

/// Tips returned per analysis
const TIPS_PER_DAY: usize = 3;

/// Weights below this count as light isolation work
const LIGHT_WEIGHT_KG: f64 = 20.0;

/// Text service asked for advice about one day
#[async_trait]
pub trait CoachingService: Send + Sync {
    async fn analyze(&self, day: &WorkoutDay, language: Language) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TipCategory {
    Tempo,
    Rest,     // between sets
    Order,    // exercise order within the day
    Isolation,
    Recovery,
}

impl TipCategory {
    pub fn emoji(&self) -> &'static str {
        match self {
            TipCategory::Tempo => "⏱",
            TipCategory::Rest => "😮‍💨",
            TipCategory::Order => "📋",
            TipCategory::Isolation => "🎯",
            TipCategory::Recovery => "😴",
        }
    }
}

pub struct Tip {
    pub category: TipCategory,
    pub en: &'static str,
    pub fi: &'static str,
}

impl Tip {
    pub fn text(&self, language: Language) -> &'static str {
        match language {
            Language::En => self.en,
            Language::Fi => self.fi,
        }
    }
}

pub const TIPS: &[Tip] = &[
    // === TEMPO ===
    Tip {
        category: TipCategory::Tempo,
        en: "Lower the weight over 2-3 seconds; a controlled eccentric builds more muscle than dropping it.",
        fi: "Laske paino 2-3 sekunnin aikana; hallittu jarrutusvaihe kasvattaa lihasta enemmän kuin pudottaminen.",
    },
    Tip {
        category: TipCategory::Tempo,
        en: "Pause for one second at the hardest point of each rep on your last set.",
        fi: "Pidä sekunnin tauko liikkeen raskaimmassa kohdassa viimeisellä sarjalla.",
    },
    Tip {
        category: TipCategory::Tempo,
        en: "Drive the weight up with intent but keep the bar path the same every rep.",
        fi: "Nosta paino räjähtävästi, mutta pidä liikerata samana joka toistossa.",
    },
    // === REST ===
    Tip {
        category: TipCategory::Rest,
        en: "Rest 2-3 minutes between sets of heavy compound lifts so strength carries over to every set.",
        fi: "Lepää 2-3 minuuttia raskaiden moninivelliikkeiden sarjojen välissä, jotta voima riittää joka sarjaan.",
    },
    Tip {
        category: TipCategory::Rest,
        en: "60-90 seconds of rest is enough for accessory work in the 10-15 rep range.",
        fi: "60-90 sekunnin lepo riittää apuliikkeille 10-15 toiston alueella.",
    },
    Tip {
        category: TipCategory::Rest,
        en: "Time your rests instead of guessing; consistent rest makes sessions comparable.",
        fi: "Ota lepoajat kellolla arvaamisen sijaan; tasainen lepo tekee treeneistä vertailukelpoisia.",
    },
    // === ORDER ===
    Tip {
        category: TipCategory::Order,
        en: "Do the heaviest compound movement first while you are fresh.",
        fi: "Tee raskain moninivelliike ensimmäisenä, kun olet vielä levännyt.",
    },
    Tip {
        category: TipCategory::Order,
        en: "Warm up with two lighter ramp-up sets before your first working set.",
        fi: "Lämmittele kahdella kevyemmällä nousevalla sarjalla ennen ensimmäistä työsarjaa.",
    },
    Tip {
        category: TipCategory::Order,
        en: "Keep the exercise order the same between sessions so progress is easy to compare.",
        fi: "Pidä liikkeiden järjestys samana treenistä toiseen, niin kehitystä on helppo verrata.",
    },
    // === ISOLATION ===
    Tip {
        category: TipCategory::Isolation,
        en: "On light isolation work chase a full stretch and squeeze rather than more weight.",
        fi: "Kevyissä eristävissä liikkeissä tavoittele täyttä venytystä ja puristusta painon sijaan.",
    },
    Tip {
        category: TipCategory::Isolation,
        en: "Small muscles progress slowly; adding a rep is progress when the weight cannot go up.",
        fi: "Pienet lihakset kehittyvät hitaasti; yksi lisätoisto on kehitystä, kun paino ei vielä nouse.",
    },
    // === RECOVERY ===
    Tip {
        category: TipCategory::Recovery,
        en: "Sleep 7-9 hours; most of the adaptation from this session happens overnight.",
        fi: "Nuku 7-9 tuntia; suurin osa tämän treenin kehityksestä tapahtuu yöllä.",
    },
    Tip {
        category: TipCategory::Recovery,
        en: "Eat a protein-rich meal within a few hours after training.",
        fi: "Syö proteiinipitoinen ateria muutaman tunnin sisällä treenistä.",
    },
];

/// Coach that works without a network: picks tips from the built-in pool
#[derive(Debug, Default, Clone)]
pub struct OfflineCoach;

impl OfflineCoach {
    pub fn new() -> Self {
        Self
    }

    /// Categories worth advising on for this day
    fn categories_for(day: &WorkoutDay) -> Vec<TipCategory> {
        let mut categories = vec![TipCategory::Tempo, TipCategory::Rest, TipCategory::Order];
        if day.exercises.iter().any(|e| e.weight < LIGHT_WEIGHT_KG) {
            categories.push(TipCategory::Isolation);
        }
        categories.push(TipCategory::Recovery);
        categories
    }

    pub fn pick_tips(day: &WorkoutDay) -> Vec<&'static Tip> {
        let categories = Self::categories_for(day);
        let pool: Vec<&Tip> = TIPS
            .iter()
            .filter(|t| categories.contains(&t.category))
            .collect();
        pool.choose_multiple(&mut rand::thread_rng(), TIPS_PER_DAY)
            .copied()
            .collect()
    }
}

#[async_trait]
impl CoachingService for OfflineCoach {
    async fn analyze(&self, day: &WorkoutDay, language: Language) -> String {
        if day.exercises.is_empty() {
            return match language {
                Language::En => format!("{}: add exercises to get coaching tips.", day.name),
                Language::Fi => format!("{}: lisää liikkeitä saadaksesi vinkkejä.", day.name),
            };
        }

        format_analysis(day, &Self::pick_tips(day), language)
    }
}

/// Day header, the exercises, then one bullet per tip
pub fn format_analysis(day: &WorkoutDay, tips: &[&Tip], language: Language) -> String {
    let mut text = format!("{}\n", day.name);
    for ex in &day.exercises {
        text.push_str(&format!("  {}: {} @ {}\n", ex.name, ex.target_reps, format_weight(ex.weight)));
    }
    text.push('\n');

    for tip in tips {
        text.push_str(&format!("{} {}\n", tip.category.emoji(), tip.text(language)));
    }
    text
}
