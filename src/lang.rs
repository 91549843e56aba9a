use clap::ValueEnum;
use serde::Deserialize;

/// Share of letters that must already be in the target script for a text to count as translated.
const SCRIPT_MAJORITY: f64 = 0.5;

/// Translation target language.
#[derive(Debug, Deserialize, ValueEnum, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Lang::Zh => "zh",
            Lang::En => "en",
        }
    }

    /// Whether `text` is mostly written in this language's script already.
    /// Text without any letters has nothing to translate and counts as done.
    pub fn is_predominant_in(self, text: &str) -> bool {
        let mut letters = 0usize;
        let mut matching = 0usize;
        for c in text.chars().filter(|c| c.is_alphabetic()) {
            letters += 1;
            let hit = match self {
                Lang::Zh => is_cjk(c),
                Lang::En => c.is_ascii_alphabetic(),
            };
            if hit {
                matching += 1;
            }
        }
        letters == 0 || matching as f64 / letters as f64 >= SCRIPT_MAJORITY
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{3040}'..='\u{309F}' |
        '\u{30A0}'..='\u{30FF}' |
        '\u{3400}'..='\u{4DBF}' |
        '\u{4E00}'..='\u{9FFF}' |
        '\u{F900}'..='\u{FAFF}'
    )
}
