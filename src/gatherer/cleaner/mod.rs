#[cfg(test)]
mod tests;

use fancy_regex::Regex;
use std::sync::LazyLock;

const UNWANTED_H2_SECTIONS: [&str; 13] = [
    "Data values",
    "Sounds",
    "Video",
    "History",
    "Issues",
    "Gallery",
    "See also",
    "Screenshots",
    "References",
    "External links",
    "Navigation",
    "Changed recipes",
    "Complete recipe list",
];

const UNWANTED_H3_SECTIONS: [&str; 9] = [
    "Unused mobs",
    "Education mobs",
    "Removed mobs",
    "Joke mobs",
    "Unimplemented mobs",
    "Mentioned mobs",
    "Education blocks",
    "Removed blocks",
    "Joke blocks",
];

/// Banner of category links repeated on every minecraftcrafting.info page
const CRAFTING_BANNER: &str = "BasicBlocksToolsDefenceMechanismFoodOtherDyeWoolBrewing";

static CONTENTS_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)H2: Contents.*?(?=H2: |$)").expect("valid regex"));
static UNWANTED_SECTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let h2 = UNWANTED_H2_SECTIONS
        .iter()
        .map(|section| format!(r"(?is)H2: {}.*?(?=H2: |$)", section));
    let h3 = UNWANTED_H3_SECTIONS
        .iter()
        .map(|section| format!(r"(?is)H3: {}.*?(?=H3: |H2: |$)", section));
    h2.chain(h3)
        .map(|pattern| Regex::new(&pattern).expect("valid regex"))
        .collect()
});
static FOOTNOTE_LETTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"↑[a-z]+(?=[^a-z])").expect("valid regex"));
static BLANK_LINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*){2,}").expect("valid regex"));

/// Strip navigation, boilerplate sections and footnote markers from scraped
/// page text
#[inline]
pub fn clean_scraped_text(text: &str) -> String {
    let mut cleaned = CONTENTS_SECTION.replace_all(text, "").into_owned();

    for section in UNWANTED_SECTIONS.iter() {
        cleaned = section.replace_all(&cleaned, "").into_owned();
    }

    cleaned = FOOTNOTE_LETTERS.replace_all(&cleaned, "↑").into_owned();

    if cleaned.contains(CRAFTING_BANNER) {
        cleaned = cleaned
            .replace(CRAFTING_BANNER, "")
            .replace(" | Image", "")
            .replace("[Back to top]", "");
    }

    BLANK_LINE_RUNS
        .replace_all(&cleaned, "\n\n")
        .trim()
        .to_string()
}
