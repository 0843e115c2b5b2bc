use super::*;

#[test]
fn removes_contents_and_unwanted_sections() {
    let text = "Intro text.\nH2: Contents\n1 Spawning\n2 History\nH2: Spawning\nCreepers spawn.\n\
                H2: History\nAdded in Beta.\nH2: Behavior\nThey hiss.\nH3: Joke mobs\nSilly.\n\
                H2: Trivia\nFun.";

    assert_eq!(
        clean_scraped_text(text),
        "Intro text.\nH2: Spawning\nCreepers spawn.\nH2: Behavior\nThey hiss.\nH2: Trivia\nFun."
    );
}

#[test]
fn unwanted_section_at_end_is_removed() {
    let text = "H2: Usage\nUsed for crafting.\nH2: Gallery\nScreenshot one\nScreenshot two";
    assert_eq!(clean_scraped_text(text), "H2: Usage\nUsed for crafting.");
}

#[test]
fn section_matching_ignores_case() {
    let text = "H2: Overview\nText.\nH2: SEE ALSO\nOther pages";
    assert_eq!(clean_scraped_text(text), "H2: Overview\nText.");
}

#[test]
fn strips_footnote_letters() {
    assert_eq!(
        clean_scraped_text("Drops gunpowder.↑ab Only in Java Edition.↑c\nNext"),
        "Drops gunpowder.↑ Only in Java Edition.↑\nNext"
    );
}

#[test]
fn removes_crafting_banner_artefacts() {
    let text = "BasicBlocksToolsDefenceMechanismFoodOtherDyeWoolBrewing\n\
                Stone | Image\n[Back to top]\nCrafting is easy.";
    assert_eq!(clean_scraped_text(text), "Stone\n\nCrafting is easy.");
}

#[test]
fn image_suffix_kept_without_banner() {
    assert_eq!(clean_scraped_text("Stone | Image"), "Stone | Image");
}

#[test]
fn collapses_blank_line_runs() {
    assert_eq!(clean_scraped_text("\n\na\n\n\n\n  \nb\n\n"), "a\n\nb");
}
